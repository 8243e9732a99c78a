//! Report reconciliation: a pure function from an in-memory record graph to a
//! [`Report`]. Fetching the graph is the pipeline's job.

use std::collections::BTreeSet;

use crate::config::ReviewIds;
use crate::flatten::{attributes_by_relation, latest_timestamp, values_of_type};
use crate::model::{
    InfoRequest, KeyEvent, Record, Report, ReportTimes, Status, SubRecordKind, Timestamp,
};
use crate::monitor::monitors;
use crate::score::{collect_scores, weighted_score};

/// A primary record with its resolved sub-records and key event.
#[derive(Debug, Clone)]
pub struct ReportGraph {
    pub primary: Record,
    pub sub_records: Vec<Record>,
    pub key_event: Option<Record>,
}

/// Classify a sub-record by its tags. A record carrying both workflow tags
/// counts as a score submission.
pub fn classify(record: &Record, ids: &ReviewIds) -> SubRecordKind {
    if record.has_tag(&ids.score_tag_id) {
        SubRecordKind::ScoreSubmission
    } else if record.has_tag(&ids.info_request_tag_id) {
        SubRecordKind::InfoRequest
    } else {
        SubRecordKind::Unclassified
    }
}

/// Result of status reconciliation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusOutcome<'a> {
    pub status: Status,
    /// The latest information request, if any (kept even when approved).
    pub info_request: Option<&'a Record>,
}

/// Derive the workflow status.
///
/// Candidate statuses are collected from each signal and the highest
/// [`Status::precedence`] wins:
/// - `New` always;
/// - `InfoRequested` for the latest information request, or `Updated` if the
///   report was published strictly after that request;
/// - `Approved` if the approved tag is present.
pub fn reconcile_status<'a>(
    tags: &BTreeSet<String>,
    info_requests: &[&'a Record],
    approved_tag_id: &str,
    published_at: Timestamp,
) -> StatusOutcome<'a> {
    // Later input wins ties on timestamp.
    let latest = info_requests
        .iter()
        .copied()
        .fold(None::<&Record>, |best, r| match best {
            Some(b) if b.timestamp > r.timestamp => Some(b),
            _ => Some(r),
        });

    let request_signal = latest.map(|r| {
        if published_at > r.timestamp {
            Status::Updated
        } else {
            Status::InfoRequested
        }
    });
    let approved_signal = tags.contains(approved_tag_id).then_some(Status::Approved);

    let status = [Some(Status::New), request_signal, approved_signal]
        .into_iter()
        .flatten()
        .max_by_key(|s| s.precedence())
        .unwrap_or(Status::New);

    StatusOutcome {
        status,
        info_request: latest,
    }
}

/// Build the report for one graph.
pub fn build_report(graph: &ReportGraph, ids: &ReviewIds) -> Report {
    let primary = &graph.primary;

    let mut info_requests = Vec::new();
    let mut submissions = Vec::new();
    for sub in &graph.sub_records {
        match classify(sub, ids) {
            SubRecordKind::InfoRequest => info_requests.push(sub),
            SubRecordKind::ScoreSubmission => submissions.push(sub),
            SubRecordKind::Unclassified => {}
        }
    }

    let outcome = reconcile_status(
        &primary.tags,
        &info_requests,
        &ids.approved_tag_id,
        primary.published_at,
    );

    let scores = collect_scores(submissions, &ids.scoring_object_template_id);
    let overall_score = weighted_score(&scores);

    Report {
        id: primary.id.clone(),
        uuid: primary.uuid.clone(),
        title: primary.title.clone(),
        org_id: primary.org_id.clone(),
        org_name: primary.org_name.clone(),
        times: ReportTimes::new(primary.published_at, latest_timestamp(primary)),
        status: outcome.status,
        overall_score,
        scores,
        info_request: outcome.info_request.map(|r| InfoRequest {
            id: r.id.clone(),
            requested_at: r.timestamp,
            comments: values_of_type(r, "comment").map(str::to_string).collect(),
        }),
        key_event: graph.key_event.as_ref().map(|k| KeyEvent {
            id: k.id.clone(),
            title: k.title.clone(),
        }),
        details: attributes_by_relation(primary, &ids.threat_report_object_template_id),
        monitors: monitors(primary, &ids.monitor_tag_id).collect(),
    }
}

/// Id of the key event named by the primary record's key-event object, if any.
pub fn key_event_id(primary: &Record, ids: &ReviewIds) -> Option<String> {
    attributes_by_relation(primary, &ids.key_event_object_template_id)
        .remove("event")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}
