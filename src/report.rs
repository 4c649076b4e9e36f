//! XRAY execution reports.
//!
//! This module holds the report model sent to the server and the conversion
//! from collected test records into it:
//!
//! ```text
//! ResultRecord (per test, collector)
//!        │ build_batch()
//!        ▼
//! Batch ──► Case, Case, ...
//!        │ to_document()
//!        ▼
//! {"info": {...}, "tests": [...], "testExecutionKey": "..."}
//! ```

pub mod builder;
pub mod model;
pub mod record;

pub use builder::build_batch;
pub use model::{Batch, Case, ExecutionDocument, Status};
pub use record::ResultRecord;

/// Result type for report construction.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors raised while building a report.
///
/// Both variants mean the collector produced something the report model
/// does not understand. They abort the run instead of dropping the test.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// A case was given a status outside the XRAY vocabulary.
    #[error("Invalid XRAY status: '{0}'")]
    InvalidStatus(String),

    /// A record carries an outcome that has no XRAY status.
    #[error("Unsupported execution status '{status}' for test {tracking_id}")]
    InvalidOutcome { tracking_id: String, status: String },
}
