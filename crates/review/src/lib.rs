//! `misp-review-engine`: threat report review, state reconciliation and scoring.
//!
//! Pure engine crate: reads records through the [`store::RecordStore`] trait,
//! returns reconciled reports and team summaries. No HTTP or terminal code.

pub mod config;
pub mod error;
pub mod filter;
pub mod flatten;
pub mod model;
pub mod monitor;
pub mod pipeline;
pub mod reconcile;
pub mod score;
pub mod store;
pub mod summary;
pub mod wire;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::{ReviewConfig, ReviewIds};
pub use error::ReviewError;
pub use filter::ReportFilter;
pub use model::{Monitor, Record, Report, ReportTimes, Status};
pub use pipeline::{load_report, ReportPipeline};
pub use store::RecordStore;
pub use summary::TeamSummary;
