//! Per-record mapping from field code to substitution value.

use crate::body::Body;
use crate::error::{ModelError, ModelResult};
use crate::request::Request;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Field code → value for one data record.
///
/// Substitution order is fixed: longest code first, ties broken
/// lexicographically. A code that contains another code is therefore
/// always replaced before the shorter one can match inside it.
///
/// Deserializing rejects empty and repeated codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "BTreeMap<String, String>")]
pub struct FieldMap {
    entries: BTreeMap<String, String>,
}

/// How two entries of a field map interfere with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOverlap {
    /// `outer` contains `inner` as a substring.
    CodeContainsCode { outer: String, inner: String },
    /// The value substituted for `code` contains `other_code`.
    ValueContainsCode { code: String, other_code: String },
}

impl FieldMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mapping, returning the previous value for the code.
    pub fn insert(
        &mut self,
        code: impl Into<String>,
        value: impl Into<String>,
    ) -> ModelResult<Option<String>> {
        let code = code.into();
        if code.is_empty() {
            return Err(ModelError::InvalidFieldMap(
                "field code must not be empty".to_string(),
            ));
        }
        Ok(self.entries.insert(code, value.into()))
    }

    /// Builder-style insert.
    pub fn with(mut self, code: impl Into<String>, value: impl Into<String>) -> ModelResult<Self> {
        self.insert(code, value)?;
        Ok(self)
    }

    /// Value mapped to `code`.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in substitution order.
    pub fn ordered(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        // BTreeMap iteration is already lexicographic; a stable sort keeps that as the tiebreak.
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        pairs
    }

    /// Pairs of entries whose substitution could interfere.
    pub fn overlaps(&self) -> Vec<FieldOverlap> {
        let mut found = Vec::new();
        for (code, value) in &self.entries {
            for other in self.entries.keys() {
                if other == code {
                    continue;
                }
                if code.contains(other.as_str()) {
                    found.push(FieldOverlap::CodeContainsCode {
                        outer: code.clone(),
                        inner: other.clone(),
                    });
                }
                if value.contains(other.as_str()) {
                    found.push(FieldOverlap::ValueContainsCode {
                        code: code.clone(),
                        other_code: other.clone(),
                    });
                }
            }
        }
        found
    }

    /// One replace-all request per entry, in substitution order.
    pub fn to_requests(&self) -> Vec<Request> {
        self.ordered()
            .into_iter()
            .map(|(code, value)| Request::replace_all_text(code, value))
            .collect()
    }

    /// Substitutes every entry into `body`, in substitution order.
    /// Returns the total number of replaced occurrences.
    pub fn apply_to(&self, body: &mut Body) -> usize {
        self.ordered()
            .into_iter()
            .map(|(code, value)| body.replace_text(code, value, true))
            .sum()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldMapVisitor)
    }
}

struct FieldMapVisitor;

impl<'de> Visitor<'de> for FieldMapVisitor {
    type Value = FieldMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field codes to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
        let mut map = FieldMap::new();
        while let Some((code, value)) = access.next_entry::<String, String>()? {
            if map.entries.contains_key(&code) {
                return Err(de::Error::custom(ModelError::InvalidFieldMap(format!(
                    "duplicate field code {code:?}"
                ))));
            }
            map.insert(code, value).map_err(de::Error::custom)?;
        }
        Ok(map)
    }
}

impl TryFrom<BTreeMap<String, String>> for FieldMap {
    type Error = ModelError;

    fn try_from(entries: BTreeMap<String, String>) -> ModelResult<Self> {
        if entries.contains_key("") {
            return Err(ModelError::InvalidFieldMap(
                "field code must not be empty".to_string(),
            ));
        }
        Ok(Self { entries })
    }
}

impl TryFrom<HashMap<String, String>> for FieldMap {
    type Error = ModelError;

    fn try_from(entries: HashMap<String, String>) -> ModelResult<Self> {
        Self::try_from(entries.into_iter().collect::<BTreeMap<_, _>>())
    }
}

impl From<FieldMap> for BTreeMap<String, String> {
    fn from(map: FieldMap) -> Self {
        map.entries
    }
}
