use std::collections::BTreeSet;

use crate::error::ReviewError;
use crate::model::{Report, ReportTimes, Status, Timestamp};

/// Per-report selection predicates. Non-matching reports are skipped, never errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    /// Skip reports last updated before this instant.
    pub since: Option<Timestamp>,
    /// Skip reports published after this instant.
    pub until: Option<Timestamp>,
    /// Explicit status set. `None` means every status except `Approved`.
    pub statuses: Option<BTreeSet<Status>>,
    /// `Some(true)`: only scored reports; `Some(false)`: only unscored; `None`: either.
    pub require_score: Option<bool>,
}

impl ReportFilter {
    /// Translate the mutually exclusive `--scored` / `--unscored` selectors.
    pub fn score_presence(scored: bool, unscored: bool) -> Result<Option<bool>, ReviewError> {
        match (scored, unscored) {
            (true, true) => Err(ReviewError::AmbiguousFilter),
            (true, false) => Ok(Some(true)),
            (false, true) => Ok(Some(false)),
            (false, false) => Ok(None),
        }
    }

    /// A filter that keeps every report, approved ones included.
    pub fn everything() -> Self {
        Self {
            statuses: Some(Status::ALL.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn with_statuses<I: IntoIterator<Item = Status>>(mut self, statuses: I) -> Self {
        let set: BTreeSet<Status> = statuses.into_iter().collect();
        self.statuses = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// The time-window predicates alone. They depend only on the primary
    /// record, so the pipeline applies them before fetching sub-records.
    pub fn matches_window(&self, times: &ReportTimes) -> bool {
        if let Some(since) = self.since {
            if times.updated_at() < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if times.published_at() > until {
                return false;
            }
        }
        true
    }

    pub fn matches_status(&self, status: Status) -> bool {
        match self.statuses {
            Some(ref set) => set.contains(&status),
            None => status != Status::Approved,
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        if !self.matches_window(&report.times) || !self.matches_status(report.status) {
            return false;
        }
        match self.require_score {
            Some(required) => report.is_scored() == required,
            None => true,
        }
    }
}
