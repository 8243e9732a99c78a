use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{Monitor, Report, Status};

/// Per-organization roll-up of reconciled reports.
#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    pub org_id: String,
    pub org_name: String,
    /// Every known status is present, zero or not.
    pub status_counts: BTreeMap<Status, usize>,
    /// Non-null overall scores, in report order.
    pub scores: Vec<f64>,
    pub monitors: BTreeSet<Monitor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; only present for two or more scores.
    pub std_dev: Option<f64>,
}

impl TeamSummary {
    pub fn new(org_id: impl Into<String>, org_name: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            org_name: org_name.into(),
            status_counts: Status::ALL.into_iter().map(|s| (s, 0)).collect(),
            scores: Vec::new(),
            monitors: BTreeSet::new(),
        }
    }

    /// Fold a sequence of reports and a monitor sequence into a summary.
    pub fn fold<'a, R, M>(org_id: &str, org_name: &str, reports: R, monitors: M) -> Self
    where
        R: IntoIterator<Item = &'a Report>,
        M: IntoIterator<Item = Monitor>,
    {
        let mut summary = Self::new(org_id, org_name);
        for report in reports {
            summary.push(report);
        }
        summary.monitors.extend(monitors);
        summary
    }

    pub fn push(&mut self, report: &Report) {
        *self.status_counts.entry(report.status).or_insert(0) += 1;
        if let Some(score) = report.overall_score {
            self.scores.push(score);
        }
    }

    pub fn total(&self) -> usize {
        self.status_counts.values().sum()
    }

    /// Monitor indicators counted by type.
    pub fn monitor_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for monitor in &self.monitors {
            *counts.entry(monitor.kind.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn stats(&self) -> ScoreStats {
        score_stats(&self.scores)
    }
}

/// Mean, median and sample standard deviation of a score sample.
pub fn score_stats(scores: &[f64]) -> ScoreStats {
    let count = scores.len();
    if count == 0 {
        return ScoreStats { count, mean: None, median: None, std_dev: None };
    }

    let mean = scores.iter().sum::<f64>() / count as f64;

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let std_dev = (count >= 2).then(|| {
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    });

    ScoreStats {
        count,
        mean: Some(mean),
        median: Some(median),
        std_dev,
    }
}
