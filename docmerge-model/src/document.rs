use crate::body::Body;
use docmerge_types::{DocumentId, RevisionId};
use serde::{Deserialize, Serialize};

/// A document as returned by a store: content plus its live revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub document_id: DocumentId,
    pub title: String,
    pub revision_id: RevisionId,
    #[serde(default)]
    pub body: Body,
}
