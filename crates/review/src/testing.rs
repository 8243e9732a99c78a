//! Builders shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{TimeZone, Utc};

use crate::config::ReviewIds;
use crate::model::{Attribute, Record, RecordObject, Report, ReportTimes, Status, Timestamp};

pub(crate) fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub(crate) fn record(id: &str, secs: i64) -> Record {
    Record {
        id: id.to_string(),
        uuid: format!("uuid-{id}"),
        title: format!("Record {id}"),
        org_id: "20".into(),
        org_name: "CERT-A".into(),
        published_at: ts(secs),
        timestamp: ts(secs),
        tags: BTreeSet::new(),
        attributes: Vec::new(),
        objects: Vec::new(),
        extends: None,
        extensions: Vec::new(),
    }
}

pub(crate) fn attr(kind: &str, value: &str, secs: i64) -> Attribute {
    Attribute {
        id: String::new(),
        category: "Other".into(),
        kind: kind.to_string(),
        value: value.to_string(),
        relation: None,
        timestamp: ts(secs),
        tags: BTreeSet::new(),
    }
}

pub(crate) fn tagged_attr(kind: &str, value: &str, secs: i64, tag: &str) -> Attribute {
    let mut a = attr(kind, value, secs);
    a.tags.insert(tag.to_string());
    a
}

pub(crate) fn related(relation: &str, value: &str, secs: i64) -> Attribute {
    let mut a = attr("text", value, secs);
    a.relation = Some(relation.to_string());
    a
}

pub(crate) fn object(template: &str, secs: i64, attributes: Vec<Attribute>) -> RecordObject {
    RecordObject {
        id: String::new(),
        template_id: template.to_string(),
        name: template.to_string(),
        timestamp: ts(secs),
        attributes,
    }
}

pub(crate) fn ids() -> ReviewIds {
    ReviewIds {
        approved_tag_id: "31".into(),
        threat_report_tag_id: "28".into(),
        info_request_tag_id: "29".into(),
        score_tag_id: "30".into(),
        monitor_tag_id: "32".into(),
        key_event_object_template_id: "tpl-key-event".into(),
        threat_report_object_template_id: "tpl-threat-report".into(),
        scoring_object_template_id: "tpl-scoring".into(),
        reviewing_org_id: "1".into(),
        visibility: BTreeMap::from([("20".to_string(), "4".to_string())]),
    }
}

pub(crate) fn report(id: &str, status: Status, published_secs: i64, updated_secs: i64) -> Report {
    Report {
        id: id.to_string(),
        uuid: format!("uuid-{id}"),
        title: format!("Report {id}"),
        org_id: "20".into(),
        org_name: "CERT-A".into(),
        times: ReportTimes::new(ts(published_secs), ts(updated_secs)),
        status,
        overall_score: None,
        scores: Vec::new(),
        info_request: None,
        key_event: None,
        details: BTreeMap::new(),
        monitors: BTreeSet::new(),
    }
}
