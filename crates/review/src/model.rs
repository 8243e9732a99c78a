use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub type Timestamp = DateTime<Utc>;

// ---------------------------------------------------------------------------
// Records (as decoded from the record store)
// ---------------------------------------------------------------------------

/// A flat attribute, either top-level on a record or nested in an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub id: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    /// Relation key inside an object (`object_relation`); `None` for top-level attributes.
    pub relation: Option<String>,
    pub timestamp: Timestamp,
    pub tags: BTreeSet<String>,
}

/// A nested object: a templated group of attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordObject {
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub timestamp: Timestamp,
    pub attributes: Vec<Attribute>,
}

/// One record (event) in the remote store. Primary reports and their
/// sub-records share this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub uuid: String,
    pub title: String,
    pub org_id: String,
    pub org_name: String,
    pub published_at: Timestamp,
    /// The record's own modification timestamp.
    pub timestamp: Timestamp,
    pub tags: BTreeSet<String>,
    pub attributes: Vec<Attribute>,
    pub objects: Vec<RecordObject>,
    /// uuid of the primary record this one extends.
    pub extends: Option<String>,
    /// ids of the sub-records extending this one (only populated on extended fetches).
    pub extensions: Vec<String>,
}

impl Record {
    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tags.contains(tag_id)
    }
}

/// Classification of a sub-record by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubRecordKind {
    InfoRequest,
    ScoreSubmission,
    Unclassified,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    New,
    InfoRequested,
    Updated,
    Approved,
}

impl Status {
    pub const ALL: [Status; 4] = [Self::New, Self::InfoRequested, Self::Updated, Self::Approved];

    /// Rank used when several signals apply; the highest rank wins.
    pub fn precedence(self) -> u8 {
        match self {
            Self::New => 0,
            Self::InfoRequested | Self::Updated => 2,
            Self::Approved => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InfoRequested => "info_requested",
            Self::Updated => "updated",
            Self::Approved => "approved",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "new" => Ok(Self::New),
            "info_requested" | "requested" => Ok(Self::InfoRequested),
            "updated" => Ok(Self::Updated),
            "approved" => Ok(Self::Approved),
            other => Err(format!(
                "unknown status '{other}' (expected new, info_requested, updated or approved)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived report
// ---------------------------------------------------------------------------

/// Publish/update bounds of a report. `updated_at` never precedes `published_at`:
/// moving either bound past the other clamps it to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportTimes {
    published_at: Timestamp,
    updated_at: Timestamp,
}

impl ReportTimes {
    pub fn new(published_at: Timestamp, updated_at: Timestamp) -> Self {
        Self {
            published_at,
            updated_at: updated_at.max(published_at),
        }
    }

    pub fn published_at(&self) -> Timestamp {
        self.published_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn set_updated_at(&mut self, updated_at: Timestamp) {
        self.updated_at = updated_at.max(self.published_at);
    }

    pub fn set_published_at(&mut self, published_at: Timestamp) {
        self.published_at = published_at.min(self.updated_at);
    }
}

/// One dated score entry from a scoring object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub timestamp: Timestamp,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// The latest information request attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoRequest {
    pub id: String,
    pub requested_at: Timestamp,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEvent {
    pub id: String,
    pub title: String,
}

/// A flagged indicator, deduplicated by (type, value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Monitor {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// A reconciled report. Rebuilt on every query, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: String,
    pub uuid: String,
    pub title: String,
    pub org_id: String,
    pub org_name: String,
    #[serde(flatten)]
    pub times: ReportTimes,
    pub status: Status,
    pub overall_score: Option<f64>,
    /// Ascending by timestamp.
    pub scores: Vec<ScoreEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_request: Option<InfoRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_event: Option<KeyEvent>,
    pub details: BTreeMap<String, String>,
    pub monitors: BTreeSet<Monitor>,
}

impl Report {
    pub fn published_at(&self) -> Timestamp {
        self.times.published_at()
    }

    pub fn updated_at(&self) -> Timestamp {
        self.times.updated_at()
    }

    pub fn is_scored(&self) -> bool {
        !self.scores.is_empty()
    }

    /// Score comments, oldest first.
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.scores.iter().filter_map(|s| s.comment.as_deref())
    }
}
