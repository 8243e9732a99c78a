//! Review mutations. Each one checks the report's reconciled state first and
//! only ever appends to or tags remote records.

use log::info;

use crate::config::ReviewIds;
use crate::error::ReviewError;
use crate::model::Status;
use crate::pipeline::load_graph;
use crate::reconcile::build_report;
use crate::score::{upsert_score, ScoreUpsert};
use crate::store::{AttributeDraft, RecordDraft, RecordStore, TagScope, Visibility};

/// Mark a report approved.
pub fn approve<S: RecordStore + ?Sized>(store: &S, ids: &ReviewIds, id: &str) -> Result<(), ReviewError> {
    let graph = load_graph(store, ids, id)?;
    let report = build_report(&graph, ids);
    if report.status == Status::Approved {
        return Err(ReviewError::PreconditionFailed(format!(
            "report {id} is already approved"
        )));
    }

    store.tag(id, &ids.approved_tag_id, TagScope::Local)?;
    info!("approved report {id}");
    Ok(())
}

/// Ask the submitting organization for more information.
///
/// Creates a reply record extending the report, visible through the owning
/// organization's configured scope, carrying `message` as a comment. Returns
/// the new record's id.
pub fn request_info<S: RecordStore + ?Sized>(
    store: &S,
    ids: &ReviewIds,
    id: &str,
    message: &str,
) -> Result<String, ReviewError> {
    if message.trim().is_empty() {
        return Err(ReviewError::PreconditionFailed("feedback message is empty".into()));
    }

    let graph = load_graph(store, ids, id)?;
    let report = build_report(&graph, ids);
    if report.status == Status::Approved {
        return Err(ReviewError::PreconditionFailed(format!(
            "report {id} is already approved"
        )));
    }
    let scope = ids.visibility_scope(&report.org_id)?;

    let draft = RecordDraft {
        title: format!("Information request: {}", report.title),
        extends: Some(report.uuid.clone()),
        visibility: Visibility::Scope(scope.to_string()),
    };
    let reply = store.create(&draft)?;
    store.tag(&reply.id, &ids.info_request_tag_id, TagScope::Global)?;
    store.add_attribute(&reply.id, &AttributeDraft::comment(message))?;
    store.publish(&reply.id)?;

    info!("requested information on report {id} (reply {})", reply.id);
    Ok(reply.id)
}

/// Record a score for a threat report in the reviewing team's container.
pub fn score<S: RecordStore + ?Sized>(
    store: &S,
    ids: &ReviewIds,
    id: &str,
    value: f64,
    comment: Option<&str>,
) -> Result<ScoreUpsert, ReviewError> {
    if !value.is_finite() {
        return Err(ReviewError::PreconditionFailed(format!(
            "score must be a finite number, got {value}"
        )));
    }

    let graph = load_graph(store, ids, id)?;
    if !graph.primary.has_tag(&ids.threat_report_tag_id) {
        return Err(ReviewError::PreconditionFailed(format!(
            "record {id} is not classified as a threat report"
        )));
    }

    let outcome = upsert_score(store, ids, &graph.primary, &graph.sub_records, value, comment)?;
    info!(
        "scored report {id} with {value} (container {}{})",
        outcome.container_id,
        if outcome.created { ", new" } else { "" }
    );
    Ok(outcome)
}
