//! The record store seam.
//!
//! The engine never speaks HTTP; it reads and writes records through this
//! trait. The MISP client crate provides the production implementation.

use crate::error::ReviewError;
use crate::model::Record;

/// Search parameters for primary records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub orgs: Vec<String>,
    pub tags: Vec<String>,
    pub include_context: bool,
}

/// Whether a tag stays on this instance or travels with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScope {
    Local,
    Global,
}

/// Who may see a newly created record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Only the creating organization.
    OrganisationOnly,
    /// A specific visibility scope (sharing group).
    Scope(String),
}

/// A record to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub title: String,
    /// uuid of the primary record the new record extends.
    pub extends: Option<String>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDraft {
    pub category: String,
    pub kind: String,
    pub value: String,
}

impl AttributeDraft {
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            category: "Other".into(),
            kind: "comment".into(),
            value: text.into(),
        }
    }
}

/// A templated object to be appended; attributes are `(relation, type, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDraft {
    pub template_id: String,
    pub name: String,
    pub attributes: Vec<(String, String, String)>,
}

/// Operations the engine consumes from the remote record store.
///
/// `get` returns [`ReviewError::NotFound`] when the id does not resolve; the
/// read path treats that as "relation absent". No method retries.
pub trait RecordStore {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, ReviewError>;

    /// Fetch one record. `extended` asks the store to list sub-records in
    /// [`Record::extensions`].
    fn get(&self, id: &str, extended: bool) -> Result<Record, ReviewError>;

    fn tag(&self, record_id: &str, tag_id: &str, scope: TagScope) -> Result<(), ReviewError>;

    fn create(&self, draft: &RecordDraft) -> Result<Record, ReviewError>;

    fn add_attribute(&self, record_id: &str, attribute: &AttributeDraft) -> Result<(), ReviewError>;

    fn add_object(&self, record_id: &str, object: &ObjectDraft) -> Result<(), ReviewError>;

    fn publish(&self, record_id: &str) -> Result<(), ReviewError>;
}
