//! Batch patch wire types.
//!
//! Field names and nesting follow the Google Docs `documents.batchUpdate`
//! request and response bodies, so the same values serialize for the HTTP
//! backend and drive the in-memory store.

use docmerge_types::{DocumentId, RevisionId};
use serde::{Deserialize, Serialize};

/// A set of requests applied to one document as a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    pub requests: Vec<Request>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_control: Option<WriteControl>,
}

impl BatchUpdateRequest {
    /// A batch applied only if the document is still at `revision`.
    pub fn guarded(revision: RevisionId, requests: Vec<Request>) -> Self {
        Self {
            requests,
            write_control: Some(WriteControl {
                required_revision_id: Some(revision),
            }),
        }
    }

    /// The revision the batch requires, if any.
    pub fn required_revision(&self) -> Option<&RevisionId> {
        self.write_control
            .as_ref()
            .and_then(|wc| wc.required_revision_id.as_ref())
    }
}

/// Precondition attached to a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_revision_id: Option<RevisionId>,
}

/// A single patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    ReplaceAllText(ReplaceAllTextRequest),
}

impl Request {
    /// Replace every case-sensitive occurrence of `code` with `value`.
    pub fn replace_all_text(code: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ReplaceAllText(ReplaceAllTextRequest {
            contains_text: SubstringMatchCriteria {
                text: code.into(),
                match_case: true,
            },
            replace_text: value.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceAllTextRequest {
    pub contains_text: SubstringMatchCriteria,
    pub replace_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstringMatchCriteria {
    pub text: String,
    #[serde(default)]
    pub match_case: bool,
}

/// Result of an accepted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    pub document_id: DocumentId,
    #[serde(default)]
    pub replies: Vec<Reply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_control: Option<WriteControl>,
}

impl BatchUpdateResponse {
    /// Revision of the document after the batch.
    pub fn new_revision_id(&self) -> Option<&RevisionId> {
        self.write_control
            .as_ref()
            .and_then(|wc| wc.required_revision_id.as_ref())
    }

    /// Total occurrences changed by all replies.
    pub fn applied_count(&self) -> u64 {
        self.replies
            .iter()
            .filter_map(|r| r.replace_all_text.as_ref())
            .map(|r| u64::from(r.occurrences_changed))
            .sum()
    }
}

/// Reply to one request, positionally matched to the request list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_all_text: Option<ReplaceAllTextResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceAllTextResponse {
    #[serde(default)]
    pub occurrences_changed: u32,
}
