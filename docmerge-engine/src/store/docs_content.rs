//! Conversion of Docs API v1 document JSON into the content tree.
//!
//! The Docs REST structure is paragraph-centric: bullets, page breaks,
//! horizontal rules and inline images all live inside paragraphs. A
//! paragraph whose only content is one of those maps to the matching node;
//! a bulleted paragraph maps to a list item. Inline elements that share a
//! paragraph with text are kept raw under the `inlineElements` attribute.
//! Structural elements without a
//! counterpart (section breaks, tables of contents) become unsupported nodes
//! carrying the raw JSON.

use crate::error::{MergeError, MergeResult};
use docmerge_model::{
    Attributes, Body, ContentElement, Document, HorizontalRule, InlineImage, ListItem, PageBreak,
    Paragraph, Table, TableCell, TableRow, TextRun, UnsupportedElement,
};
use docmerge_types::{DocumentId, RevisionId};
use serde_json::Value;

/// Builds a [`Document`] from a `documents.get` response.
pub fn document_from_json(raw: &Value) -> MergeResult<Document> {
    let document_id = raw
        .get("documentId")
        .and_then(Value::as_str)
        .ok_or_else(|| MergeError::Api {
            status: 200,
            message: "document response has no documentId".to_string(),
        })?;
    let revision_id = raw
        .get("revisionId")
        .and_then(Value::as_str)
        .ok_or_else(|| MergeError::Api {
            status: 200,
            message: format!("document {document_id} has no revisionId"),
        })?;
    let title = raw
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let content = raw
        .pointer("/body/content")
        .and_then(Value::as_array)
        .map(|elements| elements.iter().map(structural_element).collect())
        .unwrap_or_default();

    Ok(Document {
        document_id: DocumentId::from(document_id),
        title,
        revision_id: RevisionId::new(revision_id),
        body: Body::new(content),
    })
}

/// Attribute key holding inline elements that have no node of their own.
const INLINE_ELEMENTS: &str = "inlineElements";

fn object(value: Option<&Value>) -> Attributes {
    value
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn structural_element(value: &Value) -> ContentElement {
    if let Some(paragraph) = value.get("paragraph") {
        return paragraph_element(paragraph);
    }
    if let Some(table) = value.get("table") {
        return ContentElement::Table(table_element(table));
    }

    let type_name = value
        .as_object()
        .and_then(|map| {
            map.keys()
                .find(|k| !matches!(k.as_str(), "startIndex" | "endIndex"))
        })
        .map(|k| screaming_snake(k))
        .unwrap_or_default();
    ContentElement::Unsupported(UnsupportedElement {
        type_name,
        payload: value.clone(),
    })
}

fn paragraph_element(paragraph: &Value) -> ContentElement {
    let elements: &[Value] = paragraph
        .get("elements")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut attributes = object(paragraph.get("paragraphStyle"));

    let mut runs: Vec<TextRun> = Vec::new();
    let mut others: Vec<&Value> = Vec::new();
    for element in elements {
        if let Some(run) = element.get("textRun") {
            let text = run.get("content").and_then(Value::as_str).unwrap_or_default();
            runs.push(TextRun::styled(text, object(run.get("textStyle"))));
        } else {
            others.push(element);
        }
    }
    strip_paragraph_end(&mut runs);

    if let Some(bullet) = paragraph.get("bullet") {
        let nesting_level = bullet
            .get("nestingLevel")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);
        if let Some(list_id) = bullet.get("listId") {
            attributes.insert("listId".to_string(), list_id.clone());
        }
        keep_inline_elements(&mut attributes, &others);
        return ContentElement::ListItem(ListItem {
            runs,
            nesting_level,
            glyph: None,
            attributes,
        });
    }

    if runs.iter().all(|r| r.text.is_empty()) && others.len() == 1 {
        let only = others[0];
        if let Some(page_break) = only.get("pageBreak") {
            return ContentElement::PageBreak(PageBreak {
                attributes: object(page_break.get("textStyle")),
            });
        }
        if let Some(rule) = only.get("horizontalRule") {
            return ContentElement::HorizontalRule(HorizontalRule {
                attributes: object(rule.get("textStyle")),
            });
        }
        if let Some(image) = only.get("inlineObjectElement") {
            return ContentElement::InlineImage(InlineImage {
                source: image
                    .get("inlineObjectId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                width: None,
                height: None,
                attributes: object(image.get("textStyle")),
            });
        }
    }

    keep_inline_elements(&mut attributes, &others);
    ContentElement::Paragraph(Paragraph { runs, attributes })
}

fn keep_inline_elements(attributes: &mut Attributes, others: &[&Value]) {
    if others.is_empty() {
        return;
    }
    let raw = others.iter().map(|v| (*v).clone()).collect();
    attributes.insert(INLINE_ELEMENTS.to_string(), Value::Array(raw));
}

/// Docs paragraphs end with a newline run; the model has no such marker.
fn strip_paragraph_end(runs: &mut Vec<TextRun>) {
    if let Some(last) = runs.last_mut() {
        if last.text.ends_with('\n') {
            last.text.pop();
        }
        if last.text.is_empty() && runs.len() > 1 {
            runs.pop();
        }
    }
}

fn table_element(table: &Value) -> Table {
    let rows = table
        .get("tableRows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| TableRow {
                    cells: row
                        .get("tableCells")
                        .and_then(Value::as_array)
                        .map(|cells| cells.iter().map(table_cell).collect())
                        .unwrap_or_default(),
                    attributes: object(row.get("tableRowStyle")),
                })
                .collect()
        })
        .unwrap_or_default();

    Table {
        rows,
        attributes: object(table.get("tableStyle")),
    }
}

fn table_cell(cell: &Value) -> TableCell {
    TableCell {
        content: cell
            .get("content")
            .and_then(Value::as_array)
            .map(|c| c.iter().map(structural_element).collect())
            .unwrap_or_default(),
        attributes: object(cell.get("tableCellStyle")),
    }
}

fn screaming_snake(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for (i, ch) in camel.chars().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmerge_model::{classify, ElementKind};
    use serde_json::json;

    fn doc(content: Value) -> Document {
        document_from_json(&json!({
            "documentId": "d1",
            "title": "Template",
            "revisionId": "rev-9",
            "body": {"content": content}
        }))
        .unwrap()
    }

    #[test]
    fn maps_paragraph_runs_and_strips_newline() {
        let d = doc(json!([{
            "startIndex": 1, "endIndex": 14,
            "paragraph": {"elements": [
                {"textRun": {"content": "Hello ", "textStyle": {}}},
                {"textRun": {"content": "{{name}}\n", "textStyle": {"bold": true}}}
            ]}
        }]));
        assert_eq!(d.revision_id.as_str(), "rev-9");
        match &d.body.content[0] {
            ContentElement::Paragraph(p) => {
                assert_eq!(p.text(), "Hello {{name}}");
                assert_eq!(p.runs[1].attributes["bold"], true);
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn maps_bullets_breaks_and_tables() {
        let d = doc(json!([
            {"sectionBreak": {"sectionStyle": {}}},
            {"paragraph": {"elements": [{"textRun": {"content": "item\n"}}], "bullet": {"listId": "kix.1", "nestingLevel": 2}}},
            {"paragraph": {"elements": [{"pageBreak": {}}, {"textRun": {"content": "\n"}}]}},
            {"paragraph": {"elements": [{"horizontalRule": {}}, {"textRun": {"content": "\n"}}]}},
            {"paragraph": {"elements": [{"inlineObjectElement": {"inlineObjectId": "kix.img"}}, {"textRun": {"content": "\n"}}]}},
            {"table": {"tableRows": [{"tableCells": [{"content": [{"paragraph": {"elements": [{"textRun": {"content": "c\n"}}]}}]}]}]}}
        ]));
        let kinds: Vec<ElementKind> = d.body.children().map(classify).collect();
        assert_eq!(
            kinds,
            vec![
                ElementKind::Unsupported,
                ElementKind::ListItem,
                ElementKind::PageBreak,
                ElementKind::HorizontalRule,
                ElementKind::InlineImage,
                ElementKind::Table,
            ]
        );
        match &d.body.content[0] {
            ContentElement::Unsupported(u) => assert_eq!(u.type_name, "SECTION_BREAK"),
            other => panic!("expected unsupported, got {other:?}"),
        }
        match &d.body.content[1] {
            ContentElement::ListItem(li) => {
                assert_eq!(li.nesting_level, 2);
                assert_eq!(li.text(), "item");
            }
            other => panic!("expected list item, got {other:?}"),
        }
        assert_eq!(d.body.text(), "item\nc");
    }

    #[test]
    fn inline_image_beside_text_is_kept() {
        let image = json!({"startIndex": 7, "inlineObjectElement": {"inlineObjectId": "kix.logo"}});
        let d = doc(json!([{
            "paragraph": {"elements": [
                {"textRun": {"content": "Logo: "}},
                image.clone(),
                {"textRun": {"content": " {{name}}\n"}}
            ]}
        }]));
        match &d.body.content[0] {
            ContentElement::Paragraph(p) => {
                assert_eq!(p.text(), "Logo:  {{name}}");
                assert_eq!(p.attributes[INLINE_ELEMENTS], json!([image]));
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn text_only_paragraph_has_no_inline_elements() {
        let d = doc(json!([{"paragraph": {"elements": [{"textRun": {"content": "plain\n"}}]}}]));
        match &d.body.content[0] {
            ContentElement::Paragraph(p) => assert!(!p.attributes.contains_key(INLINE_ELEMENTS)),
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn missing_revision_is_an_error() {
        let result = document_from_json(&json!({"documentId": "d1"}));
        assert!(result.is_err());
    }
}
