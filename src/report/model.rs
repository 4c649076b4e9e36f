//! Report model: cases, batches and their wire form.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "testExecutionKey": "PROJ-100",
//!   "info": {
//!     "startDate": "2024-01-01T10:00:00+0000",
//!     "finishDate": "2024-01-01T10:05:00+0000",
//!     "testPlanKey": "PROJ-1"
//!   },
//!   "tests": [
//!     {"testKey": "PROJ-11", "status": "PASS", "comment": ""},
//!     {"testKey": "PROJ-12", "status": "FAIL", "comment": "AssertionError"}
//!   ]
//! }
//! ```
//!
//! `testExecutionKey` and `testPlanKey` are omitted when unset.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReportError;

/// Timestamp format expected by the XRAY import endpoint.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// XRAY test run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Todo,
    Executing,
    Pending,
    Pass,
    Fail,
    Aborted,
    Blocked,
}

impl Status {
    /// All statuses, in XRAY's order.
    pub const ALL: [Status; 7] = [
        Status::Todo,
        Status::Executing,
        Status::Pending,
        Status::Pass,
        Status::Fail,
        Status::Aborted,
        Status::Blocked,
    ];

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "TODO",
            Status::Executing => "EXECUTING",
            Status::Pending => "PENDING",
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Aborted => "ABORTED",
            Status::Blocked => "BLOCKED",
        }
    }
}

impl FromStr for Status {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ReportError::InvalidStatus(s.to_string()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One test outcome in XRAY terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Case {
    #[serde(rename = "testKey")]
    test_key: String,

    status: Status,

    comment: String,

    #[serde(skip)]
    duration: f64,
}

impl Case {
    /// Creates a case with an empty comment.
    pub fn new(test_key: impl Into<String>, status: Status) -> Self {
        Self {
            test_key: test_key.into(),
            status,
            comment: String::new(),
            duration: 0.0,
        }
    }

    /// Creates a case from a textual status.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidStatus`] if `status` is not one of the
    /// XRAY status names (`PASS`, `FAIL`, ...).
    pub fn parse(test_key: impl Into<String>, status: &str) -> Result<Self, ReportError> {
        Ok(Self::new(test_key, status.parse()?))
    }

    /// Sets the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the duration in seconds.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn test_key(&self) -> &str {
        &self.test_key
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// One push to the server: an ordered set of cases plus execution info.
///
/// The start date is fixed at construction. The finish date is taken when
/// the batch is rendered, so it reflects the time of the push.
#[derive(Debug, Clone)]
pub struct Batch {
    execution_key: Option<String>,
    plan_key: Option<String>,
    user: String,
    revision: String,
    start_date: DateTime<Utc>,
    tests: Vec<Case>,
}

impl Batch {
    /// Creates an empty batch. Empty keys are treated as unset.
    pub fn new(execution_key: Option<&str>, plan_key: Option<&str>) -> Self {
        let key = |k: Option<&str>| k.filter(|k| !k.is_empty()).map(str::to_string);
        Self {
            execution_key: key(execution_key),
            plan_key: key(plan_key),
            user: String::new(),
            revision: String::new(),
            start_date: Utc::now(),
            tests: Vec::new(),
        }
    }

    /// Sets the user reported in the execution info.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets the revision reported in the execution info.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Appends a case. Order is preserved in the report.
    pub fn push(&mut self, case: Case) {
        self.tests.push(case);
    }

    pub fn execution_key(&self) -> Option<&str> {
        self.execution_key.as_deref()
    }

    pub fn plan_key(&self) -> Option<&str> {
        self.plan_key.as_deref()
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn tests(&self) -> &[Case] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Renders the batch with the current time as the finish date.
    pub fn to_document(&self) -> ExecutionDocument<'_> {
        self.to_document_at(Utc::now())
    }

    /// Renders the batch with an explicit finish date.
    pub fn to_document_at(&self, finish: DateTime<Utc>) -> ExecutionDocument<'_> {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        ExecutionDocument {
            test_execution_key: self.execution_key.clone(),
            info: ExecutionInfo {
                start_date: self.start_date.format(DATETIME_FORMAT).to_string(),
                finish_date: finish.format(DATETIME_FORMAT).to_string(),
                test_plan_key: self.plan_key.clone(),
                user: non_empty(&self.user),
                revision: non_empty(&self.revision),
            },
            tests: &self.tests,
        }
    }
}

/// Serializable form of a [`Batch`] at the moment of a push.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_execution_key: Option<String>,

    pub info: ExecutionInfo,

    pub tests: &'a [Case],
}

/// The `info` block of an execution document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInfo {
    pub start_date: String,

    pub finish_date: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_plan_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}
