use log::{debug, warn};

use crate::config::ReviewIds;
use crate::error::ReviewError;
use crate::flatten::object_relations;
use crate::model::{Record, ScoreEntry};
use crate::store::{ObjectDraft, RecordDraft, RecordStore, TagScope, Visibility};

/// Relation holding the numeric score inside a scoring object.
pub const SCORE_RELATION: &str = "score";
/// Relation holding the reviewer's free-text comment.
pub const COMMENT_RELATION: &str = "comment";

/// Pool every score entry from the scoring objects of the given submissions,
/// sorted ascending by timestamp (stable for equal timestamps).
///
/// Objects whose score is missing or not a finite number are skipped.
pub fn collect_scores<'a, I>(submissions: I, scoring_template_id: &str) -> Vec<ScoreEntry>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut entries = Vec::new();

    for record in submissions {
        for object in record.objects.iter().filter(|o| o.template_id == scoring_template_id) {
            let relations = object_relations(object);
            let raw = relations.get(SCORE_RELATION).map(String::as_str).unwrap_or("");
            let score = match raw.trim().parse::<f64>() {
                Ok(score) if score.is_finite() => score,
                _ => {
                    warn!(
                        "record {}: skipping scoring object {} with unusable score '{raw}'",
                        record.id, object.id
                    );
                    continue;
                }
            };
            let comment = relations
                .get(COMMENT_RELATION)
                .filter(|c| !c.trim().is_empty())
                .cloned();

            entries.push(ScoreEntry {
                timestamp: object.timestamp,
                score,
                comment,
            });
        }
    }

    entries.sort_by_key(|e| e.timestamp);
    entries
}

/// Linearly recency-weighted mean: the i-th oldest entry (1-based) has weight i.
///
/// `None` when there are no entries. Entries are ordered by timestamp before
/// weighting regardless of input order.
pub fn weighted_score(entries: &[ScoreEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }

    let mut ordered: Vec<&ScoreEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let (weighted_sum, weight_total) = ordered
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (i, entry)| {
            let weight = (i + 1) as f64;
            (sum + weight * entry.score, total + weight)
        });

    Some(weighted_sum / weight_total)
}

/// The reviewing organization's scoring container among the sub-records, if any.
pub fn find_container<'a>(sub_records: &'a [Record], ids: &ReviewIds) -> Option<&'a Record> {
    sub_records
        .iter()
        .find(|r| r.has_tag(&ids.score_tag_id) && r.org_id == ids.reviewing_org_id)
}

/// Outcome of a scoring upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreUpsert {
    pub container_id: String,
    /// Whether a new container had to be created.
    pub created: bool,
}

/// Append a score to the team's scoring container, creating the container
/// first if the team has none.
///
/// A new container extends `primary`, is visible to the reviewing organization
/// only, and is tagged as a score submission before the entry is appended.
/// Repeated calls reuse the same container.
pub fn upsert_score<S: RecordStore + ?Sized>(
    store: &S,
    ids: &ReviewIds,
    primary: &Record,
    sub_records: &[Record],
    score: f64,
    comment: Option<&str>,
) -> Result<ScoreUpsert, ReviewError> {
    let (container_id, created) = match find_container(sub_records, ids) {
        Some(existing) => {
            debug!("report {}: reusing scoring container {}", primary.id, existing.id);
            (existing.id.clone(), false)
        }
        None => {
            let draft = RecordDraft {
                title: format!("Review scores: {}", primary.title),
                extends: Some(primary.uuid.clone()),
                visibility: Visibility::OrganisationOnly,
            };
            let created = store.create(&draft)?;
            store.tag(&created.id, &ids.score_tag_id, TagScope::Local)?;
            debug!("report {}: created scoring container {}", primary.id, created.id);
            (created.id, true)
        }
    };

    let mut attributes = vec![(SCORE_RELATION.to_string(), "float".to_string(), score.to_string())];
    if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
        attributes.push((COMMENT_RELATION.to_string(), "text".to_string(), comment.to_string()));
    }

    store.add_object(
        &container_id,
        &ObjectDraft {
            template_id: ids.scoring_object_template_id.clone(),
            name: "review-score".into(),
            attributes,
        },
    )?;
    store.publish(&container_id)?;

    Ok(ScoreUpsert { container_id, created })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ids, object, record, related, ts};

    fn scoring(secs: i64, score: &str, comment: Option<&str>) -> crate::model::RecordObject {
        let mut attrs = vec![related(SCORE_RELATION, score, secs)];
        if let Some(c) = comment {
            attrs.push(related(COMMENT_RELATION, c, secs));
        }
        object("tpl-scoring", secs, attrs)
    }

    #[test]
    fn weighted_example() {
        let entries = vec![
            ScoreEntry { timestamp: ts(1), score: 4.0, comment: None },
            ScoreEntry { timestamp: ts(2), score: 8.0, comment: None },
            ScoreEntry { timestamp: ts(3), score: 12.0, comment: None },
        ];
        let overall = weighted_score(&entries).unwrap();
        assert!((overall - 56.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn weighting_ignores_input_order() {
        let entries = vec![
            ScoreEntry { timestamp: ts(3), score: 12.0, comment: None },
            ScoreEntry { timestamp: ts(1), score: 4.0, comment: None },
            ScoreEntry { timestamp: ts(2), score: 8.0, comment: None },
        ];
        let overall = weighted_score(&entries).unwrap();
        assert!((overall - 56.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn no_entries_no_score() {
        assert_eq!(weighted_score(&[]), None);
    }

    #[test]
    fn single_entry_is_its_own_score() {
        let entries = vec![ScoreEntry { timestamp: ts(5), score: 6.5, comment: None }];
        assert_eq!(weighted_score(&entries), Some(6.5));
    }

    #[test]
    fn collect_pools_and_sorts_across_submissions() {
        let mut team_a = record("10", 100);
        team_a.objects.push(scoring(300, "8", Some("solid")));
        team_a.objects.push(scoring(100, "4", None));
        let mut team_b = record("11", 100);
        team_b.objects.push(scoring(200, "6", Some("  ")));
        team_b.objects.push(object("tpl-other", 50, vec![related(SCORE_RELATION, "1", 50)]));

        let entries = collect_scores([&team_a, &team_b], "tpl-scoring");
        let scores: Vec<f64> = entries.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![4.0, 6.0, 8.0]);
        assert_eq!(entries[1].comment, None);
        assert_eq!(entries[2].comment.as_deref(), Some("solid"));
    }

    #[test]
    fn collect_skips_unusable_scores() {
        let mut r = record("10", 100);
        r.objects.push(scoring(100, "high", None));
        r.objects.push(scoring(110, "NaN", None));
        r.objects.push(object("tpl-scoring", 120, vec![]));
        r.objects.push(scoring(130, " 7 ", None));

        let entries = collect_scores([&r], "tpl-scoring");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].score, 7.0);
    }

    #[test]
    fn container_must_belong_to_reviewing_org() {
        let ids = ids();
        let mut foreign = record("20", 100);
        foreign.tags.insert(ids.score_tag_id.clone());
        foreign.org_id = "77".into();
        let mut untagged = record("21", 100);
        untagged.org_id = ids.reviewing_org_id.clone();
        let mut ours = record("22", 100);
        ours.tags.insert(ids.score_tag_id.clone());
        ours.org_id = ids.reviewing_org_id.clone();

        let subs = vec![foreign, untagged, ours];
        assert_eq!(find_container(&subs, &ids).map(|r| r.id.as_str()), Some("22"));
        assert!(find_container(&subs[..2], &ids).is_none());
    }
}
