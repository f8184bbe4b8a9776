//! Content tree nodes and the element classifier.
//!
//! Each node carries its formatting as an opaque attribute map. The engine
//! copies attributes verbatim and never looks inside them.
//!
//! Deserialization is total: an object whose `type` tag is not one of the
//! known variants, or whose payload does not match the known shape, becomes
//! [`ContentElement::Unsupported`] with the raw JSON kept intact.

use crate::text::{self, TextRun};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque formatting payload attached to a node.
pub type Attributes = Map<String, Value>;

/// Structural variant tag of a content node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementKind {
    HorizontalRule,
    InlineImage,
    ListItem,
    PageBreak,
    Paragraph,
    Table,
    Unsupported,
}

impl ElementKind {
    /// Wire name of the variant, as used in the `type` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HorizontalRule => "HORIZONTAL_RULE",
            Self::InlineImage => "INLINE_IMAGE",
            Self::ListItem => "LIST_ITEM",
            Self::PageBreak => "PAGE_BREAK",
            Self::Paragraph => "PARAGRAPH",
            Self::Table => "TABLE",
            Self::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A horizontal rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizontalRule {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

/// A page break.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBreak {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

/// An image placed inline with the text flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineImage {
    /// Where the image bytes live (content URI or blob reference).
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

/// A paragraph of styled text runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub runs: Vec<TextRun>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

impl Paragraph {
    /// Creates an unstyled paragraph holding a single run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun::new(text)],
            attributes: Attributes::new(),
        }
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        text::concat(&self.runs)
    }
}

/// A paragraph that belongs to a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    #[serde(default)]
    pub runs: Vec<TextRun>,
    #[serde(default)]
    pub nesting_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

impl ListItem {
    /// Creates a top-level list item holding a single run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun::new(text)],
            ..Default::default()
        }
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        text::concat(&self.runs)
    }
}

/// A table cell; cells hold their own nested content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub content: Vec<ContentElement>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

impl TableCell {
    /// Creates a cell holding one paragraph.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentElement::Paragraph(Paragraph::new(text))],
            attributes: Attributes::new(),
        }
    }
}

/// A table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub cells: Vec<TableCell>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

/// A table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<TableRow>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

impl Table {
    /// Builds a table from a grid of cell texts.
    pub fn from_text_grid<R, C>(grid: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = grid
            .into_iter()
            .map(|row| TableRow {
                cells: row.into_iter().map(TableCell::with_text).collect(),
                attributes: Attributes::new(),
            })
            .collect();
        Self {
            rows,
            attributes: Attributes::new(),
        }
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Cell at the given position, if present.
    pub fn cell(&self, row: usize, column: usize) -> Option<&TableCell> {
        self.rows.get(row).and_then(|r| r.cells.get(column))
    }
}

/// A host element type this crate does not model.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedElement {
    /// The `type` tag as found in the source, empty if absent.
    pub type_name: String,
    /// The raw node, preserved so it survives a load/save cycle.
    pub payload: Value,
}

/// A node in a document's content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ContentElement {
    HorizontalRule(HorizontalRule),
    InlineImage(InlineImage),
    ListItem(ListItem),
    PageBreak(PageBreak),
    Paragraph(Paragraph),
    Table(Table),
    Unsupported(UnsupportedElement),
}

/// Wire form of the known variants.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum KnownElement {
    HorizontalRule(HorizontalRule),
    InlineImage(InlineImage),
    ListItem(ListItem),
    PageBreak(PageBreak),
    Paragraph(Paragraph),
    Table(Table),
}

impl From<Value> for ContentElement {
    fn from(value: Value) -> Self {
        match serde_json::from_value::<KnownElement>(value.clone()) {
            Ok(KnownElement::HorizontalRule(e)) => Self::HorizontalRule(e),
            Ok(KnownElement::InlineImage(e)) => Self::InlineImage(e),
            Ok(KnownElement::ListItem(e)) => Self::ListItem(e),
            Ok(KnownElement::PageBreak(e)) => Self::PageBreak(e),
            Ok(KnownElement::Paragraph(e)) => Self::Paragraph(e),
            Ok(KnownElement::Table(e)) => Self::Table(e),
            Err(_) => {
                let type_name = value
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Self::Unsupported(UnsupportedElement {
                    type_name,
                    payload: value,
                })
            }
        }
    }
}

impl From<ContentElement> for Value {
    fn from(element: ContentElement) -> Self {
        let known = match element {
            ContentElement::HorizontalRule(e) => KnownElement::HorizontalRule(e),
            ContentElement::InlineImage(e) => KnownElement::InlineImage(e),
            ContentElement::ListItem(e) => KnownElement::ListItem(e),
            ContentElement::PageBreak(e) => KnownElement::PageBreak(e),
            ContentElement::Paragraph(e) => KnownElement::Paragraph(e),
            ContentElement::Table(e) => KnownElement::Table(e),
            ContentElement::Unsupported(u) => return u.payload,
        };
        serde_json::to_value(known).unwrap_or(Value::Null)
    }
}

/// Returns the structural variant of a node. Total and side-effect free.
pub fn classify(element: &ContentElement) -> ElementKind {
    match element {
        ContentElement::HorizontalRule(_) => ElementKind::HorizontalRule,
        ContentElement::InlineImage(_) => ElementKind::InlineImage,
        ContentElement::ListItem(_) => ElementKind::ListItem,
        ContentElement::PageBreak(_) => ElementKind::PageBreak,
        ContentElement::Paragraph(_) => ElementKind::Paragraph,
        ContentElement::Table(_) => ElementKind::Table,
        ContentElement::Unsupported(_) => ElementKind::Unsupported,
    }
}

impl ContentElement {
    /// Shorthand for [`classify`].
    pub fn kind(&self) -> ElementKind {
        classify(self)
    }

    /// Replaces every occurrence of `code` in this node's text, recursing
    /// into table cells. Returns the number of replaced occurrences.
    ///
    /// Unsupported nodes are opaque and never modified.
    pub fn replace_text(&mut self, code: &str, value: &str, match_case: bool) -> usize {
        match self {
            Self::Paragraph(p) => text::replace_in_runs(&mut p.runs, code, value, match_case),
            Self::ListItem(li) => text::replace_in_runs(&mut li.runs, code, value, match_case),
            Self::Table(table) => table
                .rows
                .iter_mut()
                .flat_map(|row| row.cells.iter_mut())
                .flat_map(|cell| cell.content.iter_mut())
                .map(|child| child.replace_text(code, value, match_case))
                .sum(),
            Self::HorizontalRule(_)
            | Self::InlineImage(_)
            | Self::PageBreak(_)
            | Self::Unsupported(_) => 0,
        }
    }

    /// Appends this node's plain text to `out`, one line per paragraph.
    pub(crate) fn collect_text(&self, out: &mut Vec<String>) {
        match self {
            Self::Paragraph(p) => out.push(p.text()),
            Self::ListItem(li) => out.push(li.text()),
            Self::Table(table) => {
                for cell in table.rows.iter().flat_map(|row| row.cells.iter()) {
                    for child in &cell.content {
                        child.collect_text(out);
                    }
                }
            }
            Self::HorizontalRule(_)
            | Self::InlineImage(_)
            | Self::PageBreak(_)
            | Self::Unsupported(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_type_degrades_to_unsupported() {
        let el: ContentElement =
            serde_json::from_value(json!({"type": "EQUATION", "latex": "x^2"})).unwrap();
        assert_eq!(classify(&el), ElementKind::Unsupported);
        match el {
            ContentElement::Unsupported(u) => {
                assert_eq!(u.type_name, "EQUATION");
                assert_eq!(u.payload["latex"], "x^2");
            }
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[test]
    fn malformed_known_type_degrades_to_unsupported() {
        let el: ContentElement =
            serde_json::from_value(json!({"type": "PARAGRAPH", "runs": 5})).unwrap();
        assert_eq!(el.kind(), ElementKind::Unsupported);
    }

    #[test]
    fn non_object_degrades_to_unsupported() {
        let el: ContentElement = serde_json::from_value(json!("stray")).unwrap();
        match el {
            ContentElement::Unsupported(u) => assert!(u.type_name.is_empty()),
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_payload_survives_reserialization() {
        let raw = json!({"type": "TABLE_OF_CONTENTS", "entries": [1, 2]});
        let el: ContentElement = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&el).unwrap(), raw);
    }

    #[test]
    fn known_type_tag_is_written() {
        let el = ContentElement::PageBreak(PageBreak::default());
        assert_eq!(serde_json::to_value(&el).unwrap(), json!({"type": "PAGE_BREAK"}));
    }
}
