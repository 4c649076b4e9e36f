//! Normalized per-test records produced by the collector.

use serde_json::{Map, Value};

pub const STATUS_PASSED: &str = "passed";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_SKIPPED: &str = "skipped";
/// Status of a result the runner reported without a usable outcome.
pub const STATUS_NONE: &str = "None";

/// One collected test result, before it is translated into a [`Case`].
///
/// `status` is kept as the runner vocabulary (`passed`, `failed`,
/// `skipped`); translation to XRAY statuses happens in
/// [`build_batch`](super::build_batch).
///
/// [`Case`]: super::Case
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// XRAY test key from the test's marker.
    pub tracking_id: String,

    /// Short test name derived from the node id.
    pub test_name: String,

    /// Runner outcome.
    pub status: String,

    /// Failure text, truncated to a bounded size.
    pub failure_text: String,

    /// Duration in seconds.
    pub duration: f64,

    /// Error signature reported through test properties, if any.
    pub error_signature: Option<String>,

    /// Static run metadata attached to every record.
    pub metadata: Map<String, Value>,
}

impl ResultRecord {
    /// Creates a record with no failure text and no metadata.
    pub fn new(
        tracking_id: impl Into<String>,
        test_name: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            test_name: test_name.into(),
            status: status.into(),
            failure_text: String::new(),
            duration: 0.0,
            error_signature: None,
            metadata: Map::new(),
        }
    }

    /// Sets the failure text.
    pub fn with_failure_text(mut self, text: impl Into<String>) -> Self {
        self.failure_text = text.into();
        self
    }

    /// Sets the duration in seconds.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Returns true if the runner reported this test as passed.
    pub fn passed(&self) -> bool {
        self.status == STATUS_PASSED
    }
}
