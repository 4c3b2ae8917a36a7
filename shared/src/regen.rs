use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mode::MapMode;

/// Raw or compiled regeneration queue as persisted: mode name -> color keys.
/// Mode names stay strings here so an unknown mode in a hand-edited file is
/// skipped instead of rejecting the whole document.
pub type QueueDocument = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegenKind {
    /// Regenerate only entities named by the compiled queue.
    Queued,
    /// Wipe the mode's region directory and regenerate everything.
    #[serde(rename = "fullregen")]
    Full,
    /// Recompile nation data without touching any image.
    #[serde(rename = "textonly")]
    DataOnly,
}

impl RegenKind {
    /// Unknown type strings fall back to a queued run.
    pub fn from_request(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fullregen" => RegenKind::Full,
            "textonly" => RegenKind::DataOnly,
            _ => RegenKind::Queued,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RegenKind::Queued => "queued",
            RegenKind::Full => "fullregen",
            RegenKind::DataOnly => "textonly",
        }
    }
}

impl fmt::Display for RegenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned immediately when a regeneration is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenAccepted {
    pub success: bool,
    pub mode: MapMode,
    pub regen_type: RegenKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegenOutcome {
    Completed,
    Failed,
}

/// Summary of the most recent finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenReport {
    pub mode: MapMode,
    pub kind: RegenKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RegenOutcome,
    pub updated_regions: usize,
    pub failed_saves: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `province_id` is 0 when nothing is mapped and -1 when already claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub province_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvinceLookup {
    pub x: u32,
    pub y: u32,
    pub province_id: u32,
}
