//! Tree Transplant Copier.
//!
//! Copies a template's body, substitutes the field map into the copy, and
//! appends the copy's top-level nodes to a target document in order. The
//! template is never modified. Nodes the classifier does not recognise are
//! skipped and reported.

use crate::error::MergeResult;
use crate::store::{edit_document, EditableDocumentStore, FileInfo};
use docmerge_model::{classify, Body, ContentElement, ElementKind, FieldMap};
use docmerge_types::{DocumentId, FolderId};
use tracing::{debug, info, warn};

/// A top-level node that was not appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedElement {
    /// Position in the template body.
    pub index: usize,
    pub type_name: String,
}

/// What a transplant appended and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransplantReport {
    /// Kinds of the appended nodes, in append order.
    pub appended: Vec<ElementKind>,
    pub skipped: Vec<SkippedElement>,
    /// Field code occurrences replaced in the copy.
    pub replaced: usize,
}

/// Appends a substituted copy of `template` to `target`.
pub fn transplant_body(template: &Body, fields: &FieldMap, target: &mut Body) -> TransplantReport {
    let mut copy = template.clone();
    let replaced = fields.apply_to(&mut copy);

    let mut report = TransplantReport {
        replaced,
        ..Default::default()
    };
    for (index, element) in copy.content.into_iter().enumerate() {
        let kind = classify(&element);
        match element {
            ContentElement::HorizontalRule(rule) => target.append_horizontal_rule(rule),
            ContentElement::InlineImage(image) => target.append_image(image),
            ContentElement::ListItem(item) => target.append_list_item(item),
            ContentElement::PageBreak(page_break) => target.append_page_break(page_break),
            ContentElement::Paragraph(paragraph) => target.append_paragraph(paragraph),
            ContentElement::Table(table) => target.append_table(table),
            ContentElement::Unsupported(unknown) => {
                warn!(
                    "Unknown element type {:?} at index {}, skipping",
                    unknown.type_name, index
                );
                report.skipped.push(SkippedElement {
                    index,
                    type_name: unknown.type_name,
                });
                continue;
            }
        }
        report.appended.push(kind);
    }
    report
}

/// Appends a substituted copy of the template's body to `target_id`.
///
/// The target is opened for edit and always saved and closed afterwards.
pub async fn transplant_into<S>(
    store: &S,
    template_id: &DocumentId,
    target_id: &DocumentId,
    fields: &FieldMap,
) -> MergeResult<TransplantReport>
where
    S: EditableDocumentStore + ?Sized,
{
    let template = store.get_document(template_id).await?;
    let report = edit_document(store, target_id, |body| {
        transplant_body(&template.body, fields, body)
    })
    .await?;
    info!(
        "Appended {} elements of {} to {} ({} skipped)",
        report.appended.len(),
        template_id,
        target_id,
        report.skipped.len()
    );
    Ok(report)
}

/// Copies the template into `folder` and empties the copy's body.
///
/// The result is the accumulator document of a consolidated merge: it keeps
/// the template's page setup and styles but none of its content.
pub async fn create_cleared_merge_document<S>(
    store: &S,
    template_id: &DocumentId,
    name: &str,
    folder: &FolderId,
) -> MergeResult<FileInfo>
where
    S: EditableDocumentStore + ?Sized,
{
    let copy = store.copy_file(template_id, name, folder).await?;
    edit_document(store, &copy.id, Body::clear).await?;
    debug!("Cleared merge document {} ({})", copy.name, copy.id);
    Ok(copy)
}
