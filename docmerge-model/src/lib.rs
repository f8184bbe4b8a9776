//! Document model for docmerge.
//!
//! Defines the structured content that merge jobs operate on:
//! - [`Body`] and [`ContentElement`]: the document tree, with opaque formatting payloads
//! - [`classify`]: the total element classifier
//! - [`FieldMap`]: field code → value for one record, with a fixed substitution order
//! - [`BatchUpdateRequest`] / [`BatchUpdateResponse`]: the revision-guarded patch wire shape
//!
//! Nothing here performs I/O; stores and merge strategies live in `docmerge-engine`.

mod body;
mod document;
mod element;
mod error;
mod field_map;
mod request;
pub mod text;

pub use body::Body;
pub use document::Document;
pub use element::{
    classify, Attributes, ContentElement, ElementKind, HorizontalRule, InlineImage, ListItem,
    PageBreak, Paragraph, Table, TableCell, TableRow, UnsupportedElement,
};
pub use error::{ModelError, ModelResult};
pub use field_map::{FieldMap, FieldOverlap};
pub use request::{
    BatchUpdateRequest, BatchUpdateResponse, ReplaceAllTextRequest, ReplaceAllTextResponse,
    Reply, Request, SubstringMatchCriteria, WriteControl,
};
pub use text::TextRun;
