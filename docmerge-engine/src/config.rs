//! Merge job configuration.

use serde::{Deserialize, Serialize};

/// Name prefix of the folder a merge job writes into.
pub const DEFAULT_FOLDER_PREFIX: &str = "[差し込み文書]";

/// Configuration for the merge engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Prepended to the template name to form the merge folder name.
    pub folder_prefix: String,
    /// How many times a substitution is resubmitted after a revision conflict.
    pub conflict_retries: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
            conflict_retries: 0,
        }
    }
}

impl MergeConfig {
    /// Merge folder name for a template.
    pub fn folder_name(&self, template_name: &str) -> String {
        format!("{}{}", self.folder_prefix, template_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_and_no_retries() {
        let config = MergeConfig::default();
        assert_eq!(config.folder_name("Invoice"), "[差し込み文書]Invoice");
        assert_eq!(config.conflict_retries, 0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: MergeConfig = serde_json::from_str(r#"{"conflict_retries": 3}"#).unwrap();
        assert_eq!(config.folder_prefix, DEFAULT_FOLDER_PREFIX);
        assert_eq!(config.conflict_retries, 3);
    }
}
