//! Plain-text and JSON views.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use misp_review_client::Organisation;
use misp_review_engine::summary::ScoreStats;
use misp_review_engine::{Report, Status, TeamSummary};

use crate::util::{format_time, pad};

const TITLE_WIDTH: usize = 48;
const ORG_WIDTH: usize = 18;

fn score_cell(score: Option<f64>) -> String {
    score.map(|s| format!("{s:.2}")).unwrap_or_else(|| "-".into())
}

pub fn report_table(reports: &[Report]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  {}  TITLE",
        pad("ID", 8),
        pad("STATUS", 14),
        pad("SCORE", 6),
        pad("PUBLISHED", 16),
        pad("UPDATED", 16),
        pad("ORG", ORG_WIDTH),
    );
    for r in reports {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}  {}  {}",
            pad(&r.id, 8),
            pad(r.status.as_str(), 14),
            pad(&score_cell(r.overall_score), 6),
            pad(&format_time(r.published_at()), 16),
            pad(&format_time(r.updated_at()), 16),
            pad(&r.org_name, ORG_WIDTH),
            pad(&r.title, TITLE_WIDTH).trim_end(),
        );
    }
    let _ = writeln!(out, "{} report(s)", reports.len());
    out
}

pub fn report_detail(r: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", r.title, r.id);
    let _ = writeln!(out, "  organisation:  {} ({})", r.org_name, r.org_id);
    let _ = writeln!(out, "  status:        {}", r.status);
    let _ = writeln!(out, "  published:     {}", format_time(r.published_at()));
    let _ = writeln!(out, "  updated:       {}", format_time(r.updated_at()));
    let _ = writeln!(out, "  overall score: {}", score_cell(r.overall_score));
    if let Some(ref key) = r.key_event {
        let _ = writeln!(out, "  key event:     {} ({})", key.title, key.id);
    }

    if !r.details.is_empty() {
        let _ = writeln!(out, "\nDetails");
        for (relation, value) in &r.details {
            let _ = writeln!(out, "  {relation}: {value}");
        }
    }

    if !r.scores.is_empty() {
        let _ = writeln!(out, "\nScores");
        for entry in &r.scores {
            let _ = write!(out, "  {}  {:>6.2}", format_time(entry.timestamp), entry.score);
            if let Some(ref comment) = entry.comment {
                let _ = write!(out, "  {comment}");
            }
            out.push('\n');
        }
    }

    if let Some(ref request) = r.info_request {
        let _ = writeln!(
            out,
            "\nInformation request {} ({})",
            request.id,
            format_time(request.requested_at)
        );
        for comment in &request.comments {
            let _ = writeln!(out, "  > {comment}");
        }
    }

    if !r.monitors.is_empty() {
        let _ = writeln!(out, "\nMonitors");
        for m in &r.monitors {
            let _ = writeln!(out, "  {}  {}", pad(&m.kind, 12), m.value);
        }
    }
    out
}

/// JSON shape of `summary --json`.
#[derive(Serialize)]
pub struct SummaryView<'a> {
    #[serde(flatten)]
    pub summary: &'a TeamSummary,
    pub total: usize,
    pub stats: ScoreStats,
    pub monitor_counts: BTreeMap<String, usize>,
}

impl<'a> SummaryView<'a> {
    pub fn new(summary: &'a TeamSummary) -> Self {
        Self {
            summary,
            total: summary.total(),
            stats: summary.stats(),
            monitor_counts: summary.monitor_counts(),
        }
    }
}

pub fn summary_text(view: &SummaryView<'_>) -> String {
    let s = view.summary;
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", s.org_name, s.org_id);
    let _ = writeln!(out, "  reports: {}", view.total);
    for status in Status::ALL {
        let count = s.status_counts.get(&status).copied().unwrap_or(0);
        let _ = writeln!(out, "    {} {count}", pad(status.as_str(), 15));
    }

    let stats = &view.stats;
    let _ = writeln!(out, "  scored:  {}", stats.count);
    let _ = writeln!(out, "    mean    {}", score_cell(stats.mean));
    let _ = writeln!(out, "    median  {}", score_cell(stats.median));
    let _ = writeln!(out, "    std dev {}", score_cell(stats.std_dev));

    let _ = writeln!(out, "  monitors: {}", s.monitors.len());
    for (kind, count) in &view.monitor_counts {
        let _ = writeln!(out, "    {} {count}", pad(kind, 15));
    }
    out
}

pub fn org_table(orgs: &[Organisation]) -> String {
    let mut out = String::new();
    for org in orgs {
        let _ = writeln!(out, "{}  {}", pad(&org.id, 6), org.name);
    }
    out
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}
