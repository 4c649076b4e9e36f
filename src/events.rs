//! Test-runner events consumed by xray-sync.
//!
//! The test runner itself is external. It reports its lifecycle as JSON
//! lines, one event per line:
//!
//! ```text
//! {"event": "session_start", "mark_expr": "smoke"}
//! {"event": "collection_complete", "items": [{"node_id": "tests/test_a.py::test_x", "markers": [{"name": "xray", "args": ["PROJ-1"]}]}]}
//! {"event": "test_finished", "node_id": "tests/test_a.py::test_x", "phase": "call", "outcome": "passed", "duration": 0.12}
//! {"event": "session_finish", "exit_status": 0}
//! ```
//!
//! Blank lines are ignored.

use std::io::BufRead;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Errors reading an event stream.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The stream could not be read.
    #[error("Failed to read events: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid event.
    #[error("Invalid event on line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// A single lifecycle event from the test runner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunnerEvent {
    /// The session started.
    SessionStart(SessionInfo),

    /// All tests were collected.
    CollectionComplete { items: Vec<CollectedItem> },

    /// One phase of one test finished.
    TestFinished(TestEvent),

    /// The session finished.
    SessionFinish {
        #[serde(default)]
        exit_status: Option<i32>,
    },
}

/// Session-level information from the runner.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionInfo {
    /// Marker expression used to select tests (reported as `suite`).
    #[serde(default)]
    pub mark_expr: Option<String>,
}

/// A collected test and its markers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectedItem {
    pub node_id: String,

    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl CollectedItem {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            markers: Vec::new(),
        }
    }

    /// Adds a marker.
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Returns the closest marker with the given name.
    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.name == name)
    }
}

/// A marker attached to a test, e.g. `xray("PROJ-1")`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Marker {
    pub name: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Marker {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Test phase a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Call,
    Teardown,
}

/// Outcome of one test phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    /// Anything the runner reports that is none of the above.
    #[serde(other)]
    Unknown,
}

/// Completion of one phase of one test.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestEvent {
    pub node_id: String,

    pub phase: Phase,

    pub outcome: Outcome,

    /// Duration in seconds.
    #[serde(default)]
    pub duration: f64,

    /// Full failure representation, empty for passing tests.
    #[serde(default)]
    pub failure_text: String,

    /// Structured properties recorded by the test.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl TestEvent {
    pub fn new(node_id: impl Into<String>, phase: Phase, outcome: Outcome) -> Self {
        Self {
            node_id: node_id.into(),
            phase,
            outcome,
            duration: 0.0,
            failure_text: String::new(),
            properties: Map::new(),
        }
    }

    /// Sets the duration in seconds.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the failure text.
    pub fn with_failure_text(mut self, text: impl Into<String>) -> Self {
        self.failure_text = text.into();
        self
    }

    /// Adds a structured property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Iterator over the events in a JSON-lines stream.
pub struct EventReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<RunnerEvent, EventError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line += 1;

            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(serde_json::from_str(trimmed).map_err(|e| EventError::Parse {
                line: self.line,
                message: e.to_string(),
            }));
        }
    }
}
