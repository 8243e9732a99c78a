//! Fetch-and-reconcile: turns record store search hits into a lazy sequence
//! of filtered [`Report`]s.

use log::{debug, warn};

use crate::config::ReviewIds;
use crate::error::ReviewError;
use crate::filter::ReportFilter;
use crate::flatten::latest_timestamp;
use crate::model::{Record, Report, ReportTimes};
use crate::reconcile::{build_report, key_event_id, ReportGraph};
use crate::store::{RecordStore, SearchQuery};

/// Fetch a primary record and everything reconciliation needs.
pub fn load_graph<S: RecordStore + ?Sized>(
    store: &S,
    ids: &ReviewIds,
    id: &str,
) -> Result<ReportGraph, ReviewError> {
    let primary = store.get(id, true)?;
    resolve_graph(store, ids, primary)
}

/// Resolve the sub-records and key event of an already fetched primary record.
///
/// Linked records that no longer resolve are left out. Any other store
/// failure is returned as is.
pub fn resolve_graph<S: RecordStore + ?Sized>(
    store: &S,
    ids: &ReviewIds,
    primary: Record,
) -> Result<ReportGraph, ReviewError> {
    let mut sub_records = Vec::with_capacity(primary.extensions.len());
    for sub_id in &primary.extensions {
        if let Some(sub) = optional(store.get(sub_id, false))? {
            sub_records.push(sub);
        } else {
            warn!("report {}: sub-record {sub_id} not found, skipping", primary.id);
        }
    }

    let key_event = match key_event_id(&primary, ids) {
        Some(key_id) => {
            let found = optional(store.get(&key_id, false))?;
            if found.is_none() {
                warn!("report {}: key event {key_id} not found", primary.id);
            }
            found
        }
        None => None,
    };

    Ok(ReportGraph {
        primary,
        sub_records,
        key_event,
    })
}

/// Fetch and reconcile a single report, unfiltered.
pub fn load_report<S: RecordStore + ?Sized>(
    store: &S,
    ids: &ReviewIds,
    id: &str,
) -> Result<Report, ReviewError> {
    let graph = load_graph(store, ids, id)?;
    Ok(build_report(&graph, ids))
}

fn optional(result: Result<Record, ReviewError>) -> Result<Option<Record>, ReviewError> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(ReviewError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Search, fetch, reconcile, filter.
pub struct ReportPipeline<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    ids: &'a ReviewIds,
    orgs: Vec<String>,
    filter: ReportFilter,
}

impl<'a, S: RecordStore + ?Sized> ReportPipeline<'a, S> {
    pub fn new(store: &'a S, ids: &'a ReviewIds, orgs: Vec<String>, filter: ReportFilter) -> Self {
        Self {
            store,
            ids,
            orgs,
            filter,
        }
    }

    pub fn filter(&self) -> &ReportFilter {
        &self.filter
    }

    /// Run a fresh search and return the lazily reconciled reports.
    ///
    /// Only the search itself happens here; each report is fetched when the
    /// returned iterator reaches it. Calling `run` again starts over.
    pub fn run(&self) -> Result<Reports<'_, 'a, S>, ReviewError> {
        let query = SearchQuery {
            orgs: self.orgs.clone(),
            tags: vec![self.ids.threat_report_tag_id.clone()],
            include_context: true,
        };
        let hits = self.store.search(&query)?;
        debug!("search over {} org(s) returned {} record(s)", self.orgs.len(), hits.len());
        Ok(Reports {
            pipeline: self,
            hits: hits.into_iter(),
        })
    }

    fn next_report(&self, hit: Record) -> Option<Result<Report, ReviewError>> {
        let primary = match optional(self.store.get(&hit.id, true)) {
            Ok(Some(primary)) => primary,
            Ok(None) => {
                warn!("report {} disappeared after search, skipping", hit.id);
                return None;
            }
            Err(e) => return Some(Err(e)),
        };

        // Window predicates only need the primary record.
        let times = ReportTimes::new(primary.published_at, latest_timestamp(&primary));
        if !self.filter.matches_window(&times) {
            debug!("report {} outside the time window", primary.id);
            return None;
        }

        let graph = match resolve_graph(self.store, self.ids, primary) {
            Ok(graph) => graph,
            Err(e) => return Some(Err(e)),
        };
        let report = build_report(&graph, self.ids);
        if self.filter.matches(&report) {
            Some(Ok(report))
        } else {
            debug!("report {} filtered out ({})", report.id, report.status);
            None
        }
    }
}

/// Lazy sequence of reports produced by [`ReportPipeline::run`].
pub struct Reports<'p, 'a, S: RecordStore + ?Sized> {
    pipeline: &'p ReportPipeline<'a, S>,
    hits: std::vec::IntoIter<Record>,
}

impl<S: RecordStore + ?Sized> Iterator for Reports<'_, '_, S> {
    type Item = Result<Report, ReviewError>;

    fn next(&mut self) -> Option<Self::Item> {
        for hit in self.hits.by_ref() {
            if let Some(item) = self.pipeline.next_report(hit) {
                return Some(item);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::store::{AttributeDraft, ObjectDraft, RecordDraft, TagScope};
    use crate::testing::{ids, object, record, related, ts};
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeStore {
        records: BTreeMap<String, Record>,
        searches: Cell<usize>,
        gets: RefCell<Vec<String>>,
        broken: Option<String>,
    }

    impl FakeStore {
        fn insert(&mut self, record: Record) {
            self.records.insert(record.id.clone(), record);
        }
    }

    impl RecordStore for FakeStore {
        fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, ReviewError> {
            self.searches.set(self.searches.get() + 1);
            Ok(self
                .records
                .values()
                .filter(|r| query.tags.iter().all(|t| r.has_tag(t)))
                .filter(|r| query.orgs.is_empty() || query.orgs.contains(&r.org_id))
                .cloned()
                .collect())
        }

        fn get(&self, id: &str, _extended: bool) -> Result<Record, ReviewError> {
            self.gets.borrow_mut().push(id.to_string());
            if self.broken.as_deref() == Some(id) {
                return Err(ReviewError::Store("connection reset".into()));
            }
            self.records
                .get(id)
                .cloned()
                .ok_or_else(|| ReviewError::NotFound { id: id.to_string() })
        }

        fn tag(&self, _: &str, _: &str, _: TagScope) -> Result<(), ReviewError> {
            unreachable!()
        }
        fn create(&self, _: &RecordDraft) -> Result<Record, ReviewError> {
            unreachable!()
        }
        fn add_attribute(&self, _: &str, _: &AttributeDraft) -> Result<(), ReviewError> {
            unreachable!()
        }
        fn add_object(&self, _: &str, _: &ObjectDraft) -> Result<(), ReviewError> {
            unreachable!()
        }
        fn publish(&self, _: &str) -> Result<(), ReviewError> {
            unreachable!()
        }
    }

    fn primary(id: &str, secs: i64) -> Record {
        let mut r = record(id, secs);
        r.tags.insert(ids().threat_report_tag_id);
        r
    }

    #[test]
    fn graph_skips_missing_links() {
        let ids = ids();
        let mut store = FakeStore::default();
        let mut p = primary("1", 10);
        p.extensions = vec!["2".into(), "404".into()];
        p.objects.push(object(
            &ids.key_event_object_template_id,
            10,
            vec![related("event", "405", 10)],
        ));
        store.insert(p);
        store.insert(record("2", 20));

        let graph = load_graph(&store, &ids, "1").unwrap();
        assert_eq!(graph.sub_records.len(), 1);
        assert!(graph.key_event.is_none());
    }

    #[test]
    fn graph_propagates_store_failures() {
        let ids = ids();
        let mut store = FakeStore::default();
        let mut p = primary("1", 10);
        p.extensions = vec!["2".into()];
        store.insert(p);
        store.broken = Some("2".into());

        assert!(matches!(load_graph(&store, &ids, "1"), Err(ReviewError::Store(_))));
    }

    #[test]
    fn missing_primary_is_not_found() {
        let store = FakeStore::default();
        assert!(matches!(
            load_report(&store, &ids(), "9"),
            Err(ReviewError::NotFound { .. })
        ));
    }

    #[test]
    fn pipeline_filters_lazily() {
        let ids = ids();
        let mut store = FakeStore::default();
        store.insert(primary("1", 10));
        let mut approved = primary("2", 20);
        approved.tags.insert(ids.approved_tag_id.clone());
        store.insert(approved);
        store.insert(record("3", 30)); // not a threat report

        let pipeline = ReportPipeline::new(&store, &ids, vec![], ReportFilter::default());
        let reports: Vec<Report> = pipeline.run().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "1");
        assert_eq!(reports[0].status, Status::New);

        let everything = ReportPipeline::new(&store, &ids, vec![], ReportFilter::everything());
        assert_eq!(everything.run().unwrap().count(), 2);
    }

    #[test]
    fn window_is_checked_before_sub_records() {
        let ids = ids();
        let mut store = FakeStore::default();
        let mut old = primary("1", 10);
        old.extensions = vec!["5".into()];
        store.insert(old);
        store.insert(record("5", 10));

        let filter = ReportFilter {
            since: Some(ts(100)),
            ..Default::default()
        };
        let pipeline = ReportPipeline::new(&store, &ids, vec![], filter);
        assert_eq!(pipeline.run().unwrap().count(), 0);
        assert_eq!(*store.gets.borrow(), vec!["1".to_string()]);
    }

    #[test]
    fn rerun_starts_a_fresh_search() {
        let ids = ids();
        let mut store = FakeStore::default();
        store.insert(primary("1", 10));
        let pipeline = ReportPipeline::new(&store, &ids, vec!["20".into()], ReportFilter::default());

        assert_eq!(pipeline.run().unwrap().count(), 1);
        assert_eq!(pipeline.run().unwrap().count(), 1);
        assert_eq!(store.searches.get(), 2);
    }

    #[test]
    fn vanished_hit_is_skipped() {
        struct Vanishing(FakeStore);
        impl RecordStore for Vanishing {
            fn search(&self, q: &SearchQuery) -> Result<Vec<Record>, ReviewError> {
                let mut hits = self.0.search(q)?;
                hits.push(primary("gone", 5));
                Ok(hits)
            }
            fn get(&self, id: &str, extended: bool) -> Result<Record, ReviewError> {
                self.0.get(id, extended)
            }
            fn tag(&self, r: &str, t: &str, s: TagScope) -> Result<(), ReviewError> {
                self.0.tag(r, t, s)
            }
            fn create(&self, d: &RecordDraft) -> Result<Record, ReviewError> {
                self.0.create(d)
            }
            fn add_attribute(&self, r: &str, a: &AttributeDraft) -> Result<(), ReviewError> {
                self.0.add_attribute(r, a)
            }
            fn add_object(&self, r: &str, o: &ObjectDraft) -> Result<(), ReviewError> {
                self.0.add_object(r, o)
            }
            fn publish(&self, r: &str) -> Result<(), ReviewError> {
                self.0.publish(r)
            }
        }

        let ids = ids();
        let mut inner = FakeStore::default();
        inner.insert(primary("1", 10));
        let store = Vanishing(inner);
        let pipeline = ReportPipeline::new(&store, &ids, vec![], ReportFilter::default());
        let ids_seen: Vec<String> = pipeline.run().unwrap().map(|r| r.unwrap().id).collect();
        assert_eq!(ids_seen, vec!["1".to_string()]);
    }
}
