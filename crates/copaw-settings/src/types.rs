//! Settings types.
//!
//! Configuration for the transcript compaction engine. All types deserialize
//! from camelCase JSON with per-field defaults, so a partial settings file
//! only overrides what it names.

use serde::{Deserialize, Serialize};

/// Container for all CoPaw engine settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CopawSettings {
    /// Transcript compaction settings.
    pub compaction: CompactionSettings,
}

/// Transcript compaction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompactionSettings {
    /// Number of recent messages retained verbatim during compaction.
    pub keep_recent: usize,
    /// Token budget for the compactable middle; folding triggers above it.
    pub token_threshold: u64,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            keep_recent: 20,
            token_threshold: 20_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compaction_defaults() {
        let c = CompactionSettings::default();
        assert_eq!(c.keep_recent, 20);
        assert_eq!(c.token_threshold, 20_000);
    }

    #[test]
    fn serde_camel_case() {
        let c = CompactionSettings::default();
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("keepRecent").is_some());
        assert!(json.get("tokenThreshold").is_some());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = serde_json::json!({
            "compaction": { "keepRecent": 5 }
        });
        let settings: CopawSettings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.compaction.keep_recent, 5);
        assert_eq!(settings.compaction.token_threshold, 20_000);
    }

    #[test]
    fn empty_json_is_all_defaults() {
        let settings: CopawSettings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(settings.compaction.keep_recent, 20);
    }
}
