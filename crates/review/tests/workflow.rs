use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use serde_json::Value;

use misp_review_engine::model::{Attribute, RecordObject, Timestamp};
use misp_review_engine::store::{AttributeDraft, ObjectDraft, RecordDraft, SearchQuery, TagScope};
use misp_review_engine::wire::record_from_json;
use misp_review_engine::{
    load_report, workflow, Record, RecordStore, ReportFilter, ReportPipeline, ReviewConfig,
    ReviewError, ReviewIds, Status,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn ids() -> ReviewIds {
    let toml = std::fs::read_to_string(fixtures_dir().join("review.toml")).unwrap();
    ReviewConfig::from_toml(&toml).unwrap().validate().unwrap()
}

// -------------------------------------------------------------------------
// In-memory record store
// -------------------------------------------------------------------------

/// Acts as the reviewing organization; every mutation advances a fake clock.
struct MemoryStore {
    records: RefCell<BTreeMap<String, Record>>,
    acting_org: String,
    clock: Cell<i64>,
    next_id: Cell<u64>,
    log: RefCell<Vec<String>>,
}

impl MemoryStore {
    fn from_fixtures() -> Self {
        let raw = std::fs::read_to_string(fixtures_dir().join("events.json")).unwrap();
        let events: Value = serde_json::from_str(&raw).unwrap();
        let records = events
            .as_array()
            .unwrap()
            .iter()
            .map(record_from_json)
            .map(|r| (r.id.clone(), r))
            .collect();

        Self {
            records: RefCell::new(records),
            acting_org: "1".into(),
            clock: Cell::new(1_700_001_000),
            next_id: Cell::new(1000),
            log: RefCell::new(Vec::new()),
        }
    }

    fn tick(&self) -> Timestamp {
        self.clock.set(self.clock.get() + 10);
        ts(self.clock.get())
    }

    fn with_record<T>(&self, id: &str, f: impl FnOnce(&mut Record) -> T) -> Result<T, ReviewError> {
        let mut records = self.records.borrow_mut();
        let record = records
            .get_mut(id)
            .ok_or_else(|| ReviewError::NotFound { id: id.to_string() })?;
        Ok(f(record))
    }

    fn record(&self, id: &str) -> Record {
        self.records.borrow()[id].clone()
    }

    fn tagged(&self, tag_id: &str) -> Vec<Record> {
        self.records
            .borrow()
            .values()
            .filter(|r| r.has_tag(tag_id))
            .cloned()
            .collect()
    }
}

impl RecordStore for MemoryStore {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, ReviewError> {
        Ok(self
            .records
            .borrow()
            .values()
            .filter(|r| query.tags.iter().all(|t| r.has_tag(t)))
            .filter(|r| query.orgs.is_empty() || query.orgs.contains(&r.org_id))
            .cloned()
            .collect())
    }

    fn get(&self, id: &str, _extended: bool) -> Result<Record, ReviewError> {
        self.records
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| ReviewError::NotFound { id: id.to_string() })
    }

    fn tag(&self, record_id: &str, tag_id: &str, scope: TagScope) -> Result<(), ReviewError> {
        self.log
            .borrow_mut()
            .push(format!("tag {record_id} {tag_id} {scope:?}"));
        self.with_record(record_id, |r| {
            r.tags.insert(tag_id.to_string());
        })
    }

    fn create(&self, draft: &RecordDraft) -> Result<Record, ReviewError> {
        let id = self.next_id.get().to_string();
        self.next_id.set(self.next_id.get() + 1);
        let now = self.tick();
        let uuid = format!("memory-{id}");

        if let Some(ref parent) = draft.extends {
            let mut records = self.records.borrow_mut();
            let primary = records
                .values_mut()
                .find(|r| &r.uuid == parent)
                .ok_or_else(|| ReviewError::NotFound { id: parent.clone() })?;
            primary.extensions.push(id.clone());
        }

        let record = Record {
            id: id.clone(),
            uuid,
            title: draft.title.clone(),
            org_id: self.acting_org.clone(),
            org_name: "Review Team".into(),
            published_at: now,
            timestamp: now,
            tags: BTreeSet::new(),
            attributes: Vec::new(),
            objects: Vec::new(),
            extends: draft.extends.clone(),
            extensions: Vec::new(),
        };
        self.log
            .borrow_mut()
            .push(format!("create {id} {:?}", draft.visibility));
        self.records.borrow_mut().insert(id, record.clone());
        Ok(record)
    }

    fn add_attribute(&self, record_id: &str, attribute: &AttributeDraft) -> Result<(), ReviewError> {
        let now = self.tick();
        self.with_record(record_id, |r| {
            r.attributes.push(Attribute {
                id: String::new(),
                category: attribute.category.clone(),
                kind: attribute.kind.clone(),
                value: attribute.value.clone(),
                relation: None,
                timestamp: now,
                tags: BTreeSet::new(),
            });
        })
    }

    fn add_object(&self, record_id: &str, object: &ObjectDraft) -> Result<(), ReviewError> {
        let now = self.tick();
        self.with_record(record_id, |r| {
            r.objects.push(RecordObject {
                id: String::new(),
                template_id: object.template_id.clone(),
                name: object.name.clone(),
                timestamp: now,
                attributes: object
                    .attributes
                    .iter()
                    .map(|(relation, kind, value)| Attribute {
                        id: String::new(),
                        category: "Other".into(),
                        kind: kind.clone(),
                        value: value.clone(),
                        relation: Some(relation.clone()),
                        timestamp: now,
                        tags: BTreeSet::new(),
                    })
                    .collect(),
            });
        })
    }

    fn publish(&self, record_id: &str) -> Result<(), ReviewError> {
        let now = self.tick();
        self.log.borrow_mut().push(format!("publish {record_id}"));
        self.with_record(record_id, |r| {
            r.published_at = now;
            r.timestamp = now;
        })
    }
}

// -------------------------------------------------------------------------
// Read path
// -------------------------------------------------------------------------

#[test]
fn fixture_report_reconciles() {
    let store = MemoryStore::from_fixtures();
    let report = load_report(&store, &ids(), "100").unwrap();

    assert_eq!(report.title, "Ransomware intrusion at regional hospital");
    assert_eq!(report.org_name, "CERT-North");
    assert_eq!(report.status, Status::InfoRequested);
    assert_eq!(report.published_at(), ts(1_700_000_000));
    assert_eq!(report.updated_at(), ts(1_700_000_000));
    assert_eq!(report.overall_score, None);

    let info = report.info_request.as_ref().unwrap();
    assert_eq!(info.id, "101");
    assert_eq!(info.comments, vec!["Which VPN firmware version was exploited?".to_string()]);

    let key = report.key_event.as_ref().unwrap();
    assert_eq!(key.id, "7");
    assert_eq!(key.title, "Mass exploitation of VPN appliances");

    assert_eq!(report.details["sector"], "Health");
    assert_eq!(report.monitors.len(), 1);
    assert_eq!(report.monitors.iter().next().unwrap().value, "update-check.example");
}

#[test]
fn pipeline_hides_approved_by_default() {
    let store = MemoryStore::from_fixtures();
    let ids = ids();

    let pipeline = ReportPipeline::new(&store, &ids, vec!["20".into()], ReportFilter::default());
    let listed: Vec<String> = pipeline.run().unwrap().map(|r| r.unwrap().id).collect();
    assert_eq!(listed, vec!["100".to_string()]);

    let pipeline = ReportPipeline::new(&store, &ids, vec!["20".into()], ReportFilter::everything());
    let listed: Vec<(String, Status)> = pipeline
        .run()
        .unwrap()
        .map(|r| r.map(|r| (r.id, r.status)).unwrap())
        .collect();
    assert_eq!(
        listed,
        vec![("100".to_string(), Status::InfoRequested), ("200".to_string(), Status::Approved)]
    );
}

// -------------------------------------------------------------------------
// Scoring
// -------------------------------------------------------------------------

#[test]
fn scoring_twice_reuses_one_container() {
    let store = MemoryStore::from_fixtures();
    let ids = ids();

    let first = workflow::score(&store, &ids, "100", 6.0, Some("solid")).unwrap();
    assert!(first.created);
    let second = workflow::score(&store, &ids, "100", 9.0, None).unwrap();
    assert!(!second.created);
    assert_eq!(first.container_id, second.container_id);

    let containers = store.tagged(&ids.score_tag_id);
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].org_id, ids.reviewing_org_id);
    assert_eq!(containers[0].objects.len(), 2);

    let log = store.log.borrow();
    assert!(log.contains(&format!("create {} OrganisationOnly", first.container_id)));
    assert!(log.contains(&format!("tag {} 30 Local", first.container_id)));
    drop(log);

    let report = load_report(&store, &ids, "100").unwrap();
    assert_eq!(report.scores.len(), 2);
    assert_eq!(report.comments().collect::<Vec<_>>(), vec!["solid"]);
    let overall = report.overall_score.unwrap();
    assert!((overall - (6.0 + 2.0 * 9.0) / 3.0).abs() < 1e-9);
}

#[test]
fn scoring_requires_threat_report() {
    let store = MemoryStore::from_fixtures();
    let err = workflow::score(&store, &ids(), "7", 5.0, None).unwrap_err();
    assert!(matches!(err, ReviewError::PreconditionFailed(_)));
    assert!(store.tagged("30").is_empty());
}

#[test]
fn scoring_rejects_non_finite_values() {
    let store = MemoryStore::from_fixtures();
    for value in [f64::NAN, f64::INFINITY] {
        let err = workflow::score(&store, &ids(), "100", value, None).unwrap_err();
        assert!(matches!(err, ReviewError::PreconditionFailed(_)));
    }
}

// -------------------------------------------------------------------------
// Approval
// -------------------------------------------------------------------------

#[test]
fn approve_then_reapprove_fails() {
    let store = MemoryStore::from_fixtures();
    let ids = ids();

    workflow::approve(&store, &ids, "100").unwrap();
    assert!(store.log.borrow().contains(&"tag 100 31 Local".to_string()));
    assert_eq!(load_report(&store, &ids, "100").unwrap().status, Status::Approved);

    let err = workflow::approve(&store, &ids, "100").unwrap_err();
    assert!(matches!(err, ReviewError::PreconditionFailed(_)));
}

#[test]
fn approve_unknown_report_is_not_found() {
    let store = MemoryStore::from_fixtures();
    let err = workflow::approve(&store, &ids(), "999").unwrap_err();
    assert!(matches!(err, ReviewError::NotFound { ref id } if id == "999"));
}

// -------------------------------------------------------------------------
// Feedback
// -------------------------------------------------------------------------

#[test]
fn feedback_creates_scoped_reply() {
    let store = MemoryStore::from_fixtures();
    let ids = ids();

    let reply_id = workflow::request_info(&store, &ids, "100", "Please share the firewall logs").unwrap();
    let reply = store.record(&reply_id);
    assert!(reply.has_tag(&ids.info_request_tag_id));
    assert_eq!(reply.attributes[0].kind, "comment");
    assert_eq!(reply.attributes[0].value, "Please share the firewall logs");
    assert!(store
        .log
        .borrow()
        .contains(&format!("create {reply_id} Scope(\"4\")")));
    assert!(store.log.borrow().contains(&format!("tag {reply_id} 29 Global")));

    let report = load_report(&store, &ids, "100").unwrap();
    assert_eq!(report.status, Status::InfoRequested);
    assert_eq!(report.info_request.as_ref().map(|i| i.id.as_str()), Some(reply_id.as_str()));

    // The submitter republishes after the request.
    store.publish("100").unwrap();
    assert_eq!(load_report(&store, &ids, "100").unwrap().status, Status::Updated);
}

#[test]
fn feedback_on_approved_report_fails() {
    let store = MemoryStore::from_fixtures();
    let err = workflow::request_info(&store, &ids(), "200", "more please").unwrap_err();
    assert!(matches!(err, ReviewError::PreconditionFailed(_)));
}

#[test]
fn feedback_without_visibility_scope_is_missing_configuration() {
    let store = MemoryStore::from_fixtures();
    store
        .with_record("100", |r| r.org_id = "11".into())
        .unwrap();

    let err = workflow::request_info(&store, &ids(), "100", "more please").unwrap_err();
    assert!(matches!(err, ReviewError::MissingConfiguration(_)));
    assert!(store.log.borrow().is_empty());
}
