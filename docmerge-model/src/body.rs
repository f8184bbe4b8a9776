//! Document body: the ordered list of top-level content nodes.

use crate::element::{
    ContentElement, HorizontalRule, InlineImage, ListItem, PageBreak, Paragraph, Table,
};
use serde::{Deserialize, Serialize};

/// The top-level content of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub content: Vec<ContentElement>,
}

impl Body {
    /// Creates a body from a list of nodes.
    pub fn new(content: Vec<ContentElement>) -> Self {
        Self { content }
    }

    /// Number of top-level children.
    pub fn num_children(&self) -> usize {
        self.content.len()
    }

    /// Top-level child at `index`.
    pub fn child(&self, index: usize) -> Option<&ContentElement> {
        self.content.get(index)
    }

    /// Iterates over top-level children in document order.
    pub fn children(&self) -> impl Iterator<Item = &ContentElement> {
        self.content.iter()
    }

    /// Removes all content.
    pub fn clear(&mut self) {
        self.content.clear();
    }

    pub fn append_horizontal_rule(&mut self, rule: HorizontalRule) {
        self.content.push(ContentElement::HorizontalRule(rule));
    }

    pub fn append_image(&mut self, image: InlineImage) {
        self.content.push(ContentElement::InlineImage(image));
    }

    pub fn append_list_item(&mut self, item: ListItem) {
        self.content.push(ContentElement::ListItem(item));
    }

    pub fn append_page_break(&mut self, page_break: PageBreak) {
        self.content.push(ContentElement::PageBreak(page_break));
    }

    pub fn append_paragraph(&mut self, paragraph: Paragraph) {
        self.content.push(ContentElement::Paragraph(paragraph));
    }

    pub fn append_table(&mut self, table: Table) {
        self.content.push(ContentElement::Table(table));
    }

    /// Replaces every occurrence of `code` with `value` throughout the body,
    /// including inside tables and list items. Returns the occurrence count.
    pub fn replace_text(&mut self, code: &str, value: &str, match_case: bool) -> usize {
        self.content
            .iter_mut()
            .map(|el| el.replace_text(code, value, match_case))
            .sum()
    }

    /// Plain text of the body, one line per paragraph or list item.
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        for el in &self.content {
            el.collect_text(&mut lines);
        }
        lines.join("\n")
    }

    /// Counts occurrences of `needle` across paragraphs, list items and table
    /// cells. Matches do not span paragraph boundaries.
    pub fn count_occurrences(&self, needle: &str) -> usize {
        let mut lines = Vec::new();
        for el in &self.content {
            el.collect_text(&mut lines);
        }
        lines
            .iter()
            .map(|line| crate::text::find_matches(line, needle, true).len())
            .sum()
    }
}

impl From<Vec<ContentElement>> for Body {
    fn from(content: Vec<ContentElement>) -> Self {
        Self { content }
    }
}
