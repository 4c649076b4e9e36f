//! Collection of test results and synchronization with XRAY.
//!
//! [`XrayPlugin`] receives the runner's lifecycle events:
//!
//! ```text
//! collection_complete ──► tracking map (node id -> XRAY key)
//! test_finished ────────► ResultRecord ──► buffer
//!                              │ interactive?
//!                              ▼
//!                         publish [record] ──► carried execution key
//! session_finish ───────► publish [buffer] (non-interactive only)
//! ```
//!
//! Only tests carrying an `xray("KEY")` marker are reported. All pushes
//! after the first one reuse the execution key returned by the server, so
//! interactive runs accumulate into a single remote execution.

pub mod metadata;

pub use metadata::{Environment, MetadataSources, ProcessEnv, SettingsFile, SharedSettings};

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::SyncSettings;
use crate::events::{CollectedItem, Outcome, Phase, SessionInfo, TestEvent};
use crate::publisher::Publisher;
use crate::report::record::{STATUS_FAILED, STATUS_NONE, STATUS_PASSED, STATUS_SKIPPED};
use crate::report::{Batch, ReportResult, ResultRecord, build_batch};

/// Marker that associates a test with an XRAY test key.
pub const XRAY_MARKER: &str = "xray";

/// Failure text longer than this many characters is truncated.
pub const MAX_FAILURE_TEXT: usize = 5000;
const TRUNCATED_HEAD: usize = 2000;
const TRUNCATED_TAIL: usize = 3000;
const TRUNCATION_MARKER: &str = " TRUNCATED ";

/// Properties key carrying a failure's error signature.
pub const ERROR_SIGNATURE: &str = "error_signature";

static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("integer pattern is valid"));
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+$").expect("decimal pattern is valid"));

/// Behaviour switches for the collector.
#[derive(Debug, Clone)]
pub struct PluginOptions {
    /// Push after every recorded test.
    pub interactive_push: bool,

    /// Push the final report even when no test passed.
    pub all_fails_allowed: bool,

    /// Convert metadata strings that look like booleans or numbers.
    pub convert_datatypes: bool,

    /// Test plan key attached to every batch.
    pub test_plan_key: Option<String>,

    /// Execution key the first push attaches to.
    pub execution_key: Option<String>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            interactive_push: false,
            all_fails_allowed: false,
            convert_datatypes: true,
            test_plan_key: None,
            execution_key: None,
        }
    }
}

impl PluginOptions {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            interactive_push: settings.interactive_push,
            all_fails_allowed: settings.all_fails_allowed,
            convert_datatypes: true,
            test_plan_key: settings.test_plan_key.clone(),
            execution_key: settings.execution_key.clone(),
        }
    }
}

/// Outcome of a session's synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    /// Number of records collected.
    pub total_items: usize,

    /// Number of publish calls made.
    pub pushes: usize,

    /// Last execution key known to the collector (empty if none).
    pub execution_key: String,

    /// Whether the final push was withheld because nothing passed.
    pub zero_pass_blocked: bool,

    /// Publish failures, oldest first.
    pub errors: Vec<String>,
}

/// Collects XRAY-marked results for one session and publishes them.
pub struct XrayPlugin {
    publisher: Box<dyn Publisher>,
    options: PluginOptions,
    sources: MetadataSources,
    session: SessionInfo,
    tracking_ids: HashMap<String, String>,
    records: Vec<ResultRecord>,
    execution_key: String,
    static_metadata: Option<Map<String, Value>>,
    pushes: usize,
}

impl XrayPlugin {
    pub fn new(publisher: Box<dyn Publisher>, options: PluginOptions, sources: MetadataSources) -> Self {
        let execution_key = options.execution_key.clone().unwrap_or_default();
        Self {
            publisher,
            options,
            sources,
            session: SessionInfo::default(),
            tracking_ids: HashMap::new(),
            records: Vec::new(),
            execution_key,
            static_metadata: None,
            pushes: 0,
        }
    }

    /// Line shown in the runner's header.
    pub fn report_header(&self) -> String {
        format!(
            "[xray-sync] Plugin is enabled (publisher: {}, interactive: {}).",
            self.publisher.name(),
            self.options.interactive_push
        )
    }

    /// Records session-level information.
    pub fn on_session_start(&mut self, info: SessionInfo) {
        self.session = info;
    }

    /// Builds the tracking map from the collected tests' markers.
    pub fn on_collection_complete(&mut self, items: &[CollectedItem]) {
        for item in items {
            let Some(marker) = item.marker(XRAY_MARKER) else {
                continue;
            };
            match marker.args.first() {
                Some(key) if !key.is_empty() => {
                    if marker.args.len() > 1 {
                        warn!(
                            "{} marker on {} has extra arguments; using {}",
                            XRAY_MARKER, item.node_id, key
                        );
                    }
                    self.tracking_ids.insert(item.node_id.clone(), key.clone());
                }
                _ => warn!("{} marker on {} has no test key", XRAY_MARKER, item.node_id),
            }
        }
        debug!("Tracking {} of {} collected tests", self.tracking_ids.len(), items.len());
    }

    /// Handles one finished test phase.
    ///
    /// Call-phase results are recorded, as are setup failures and skips
    /// (the test never reaches its call phase). Tests without a tracking
    /// key are ignored. In interactive mode the record is published at once.
    ///
    /// # Errors
    ///
    /// Propagates [`ReportError::InvalidOutcome`](crate::report::ReportError)
    /// when an interactive push meets an outcome with no XRAY status.
    pub async fn on_test_finished(&mut self, event: &TestEvent) -> ReportResult<()> {
        if !is_reportable(event) {
            return Ok(());
        }
        let Some(tracking_id) = self.tracking_ids.get(&event.node_id).cloned() else {
            if event.phase == Phase::Call {
                info!("{} doesn't contain an XRAY marker", event.node_id);
            }
            return Ok(());
        };

        let record = self.make_record(event, tracking_id);
        debug!("Generated record: {:?}", record);
        self.records.push(record);

        if self.options.interactive_push {
            let batch = build_batch(
                &self.records[self.records.len() - 1..],
                Some(self.execution_key.as_str()),
                self.options.test_plan_key.as_deref(),
            )?;
            self.publish(&batch).await;
        }
        Ok(())
    }

    /// Finishes the session, pushing the buffered records if needed.
    ///
    /// Outside interactive mode all records go out in a single batch, but
    /// only if at least one test passed or zero-pass runs are allowed.
    ///
    /// # Errors
    ///
    /// The batch is built before the zero-pass rule is applied, so a record
    /// with no XRAY status fails the session even when nothing is pushed.
    pub async fn on_session_finish(&mut self) -> ReportResult<SyncSummary> {
        let any_passed = self.records.iter().any(ResultRecord::passed);
        let mut zero_pass_blocked = false;

        if !self.options.interactive_push {
            if self.records.is_empty() {
                info!("No XRAY-marked results to push");
            } else {
                let batch = build_batch(
                    &self.records,
                    Some(self.execution_key.as_str()),
                    self.options.test_plan_key.as_deref(),
                )?;
                if any_passed || self.options.all_fails_allowed {
                    self.publish(&batch).await;
                } else {
                    zero_pass_blocked = true;
                }
            }
        }

        Ok(SyncSummary {
            total_items: self.records.len(),
            pushes: self.pushes,
            execution_key: self.execution_key.clone(),
            zero_pass_blocked,
            errors: self.publisher.errors().to_vec(),
        })
    }

    /// Records collected so far.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Execution key the next batch will carry.
    pub fn execution_key(&self) -> &str {
        &self.execution_key
    }

    /// XRAY key tracked for a node id.
    pub fn tracking_id(&self, node_id: &str) -> Option<&str> {
        self.tracking_ids.get(node_id).map(String::as_str)
    }

    async fn publish(&mut self, batch: &Batch) {
        let key = self.publisher.publish(batch).await;
        self.pushes += 1;
        if key.is_empty() {
            warn!(
                "Push failed; keeping execution key '{}' for the next push",
                self.execution_key
            );
        } else {
            self.execution_key = key;
        }
    }

    fn make_record(&mut self, event: &TestEvent, tracking_id: String) -> ResultRecord {
        let sources = &self.sources;
        let suite = self.session.mark_expr.as_deref();
        let mut metadata = self
            .static_metadata
            .get_or_insert_with(|| sources.collect(suite))
            .clone();
        if self.options.convert_datatypes {
            metadata = convert_datatypes(metadata);
        }

        let status = match event.outcome {
            Outcome::Passed => STATUS_PASSED,
            Outcome::Failed => STATUS_FAILED,
            Outcome::Skipped => STATUS_SKIPPED,
            Outcome::Unknown => STATUS_NONE,
        };

        let error_signature = event.properties.get(ERROR_SIGNATURE).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        ResultRecord {
            tracking_id,
            test_name: test_name(&event.node_id).to_string(),
            status: status.to_string(),
            failure_text: truncate_failure_text(&event.failure_text),
            duration: event.duration,
            error_signature,
            metadata,
        }
    }
}

fn is_reportable(event: &TestEvent) -> bool {
    match event.phase {
        Phase::Call => true,
        Phase::Setup => matches!(event.outcome, Outcome::Failed | Outcome::Skipped),
        Phase::Teardown => false,
    }
}

/// Derives the short test name from a node id.
///
/// `file.py::test_a` gives `test_a`; `file.py::Class::test_a` gives
/// `test_a`; an id without `::` is used whole.
pub fn test_name(node_id: &str) -> &str {
    let parts: Vec<&str> = node_id.split("::").collect();
    match parts.len() {
        2 => parts[1],
        n if n >= 3 => parts[2],
        _ => node_id,
    }
}

/// Bounds failure text to the first 2000 and last 3000 characters.
pub fn truncate_failure_text(text: &str) -> String {
    let length = text.chars().count();
    if length <= MAX_FAILURE_TEXT {
        return text.to_string();
    }
    let head: String = text.chars().take(TRUNCATED_HEAD).collect();
    let tail: String = text.chars().skip(length - TRUNCATED_TAIL).collect();
    format!("{}{}{}", head, TRUNCATION_MARKER, tail)
}

/// Converts `"true"`/`"false"`, integers and decimals to native JSON values.
///
/// Only string values are touched. Integers must fit in a `u64`; longer
/// digit runs stay strings. The collector applies this to the static
/// metadata only, never to the record's own fields.
pub fn convert_datatypes(data: Map<String, Value>) -> Map<String, Value> {
    data.into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => (key, convert_text(text)),
            other => (key, other),
        })
        .collect()
}

fn convert_text(text: String) -> Value {
    match text.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    let number = if DECIMAL_RE.is_match(&text) {
        text.parse::<f64>().ok().and_then(serde_json::Number::from_f64)
    } else if INTEGER_RE.is_match(&text) {
        text.parse::<u64>().ok().map(serde_json::Number::from)
    } else {
        None
    };
    number.map(Value::Number).unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Marker;
    use crate::report::{Case, ReportError, Status};
    use std::sync::{Arc, Mutex};

    /// Publisher that records every batch it receives.
    #[derive(Clone, Default)]
    struct RecordingPublisher {
        batches: Arc<Mutex<Vec<Batch>>>,
        keys: Arc<Mutex<Vec<String>>>,
        errors: Vec<String>,
    }

    impl RecordingPublisher {
        fn with_keys(keys: &[&str]) -> Self {
            let publisher = Self::default();
            publisher
                .keys
                .lock()
                .unwrap()
                .extend(keys.iter().rev().map(|k| k.to_string()));
            publisher
        }

        fn batches(&self) -> Vec<Batch> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&mut self, batch: &Batch) -> String {
            self.batches.lock().unwrap().push(batch.clone());
            let key = self.keys.lock().unwrap().pop().unwrap_or_default();
            if key.is_empty() {
                self.errors.push("push failed".to_string());
            }
            key
        }

        fn errors(&self) -> &[String] {
            &self.errors
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn item(node_id: &str, key: Option<&str>) -> CollectedItem {
        let item = CollectedItem::new(node_id);
        match key {
            Some(key) => item.with_marker(Marker::new(XRAY_MARKER, &[key])),
            None => item,
        }
    }

    fn call(node_id: &str, outcome: Outcome) -> TestEvent {
        TestEvent::new(node_id, Phase::Call, outcome)
    }

    fn plugin(publisher: &RecordingPublisher, options: PluginOptions) -> XrayPlugin {
        let mut plugin = XrayPlugin::new(
            Box::new(publisher.clone()),
            options,
            MetadataSources::empty().with_env(HashMap::new()),
        );
        plugin.on_collection_complete(&[
            item("tests/test_a.py::test_one", Some("P-1")),
            item("tests/test_a.py::test_two", Some("P-2")),
            item("tests/test_a.py::test_plain", None),
        ]);
        plugin
    }

    fn interactive() -> PluginOptions {
        PluginOptions {
            interactive_push: true,
            ..PluginOptions::default()
        }
    }

    #[test]
    fn test_truncation_bounds() {
        let text: String = (0..6000).map(|i| if i < 3000 { 'a' } else { 'b' }).collect();
        let truncated = truncate_failure_text(&text);
        assert_eq!(truncated.chars().count(), 2000 + TRUNCATION_MARKER.len() + 3000);
        assert!(truncated.starts_with(&"a".repeat(2000)));
        assert!(truncated.ends_with(&"b".repeat(3000)));
        assert!(truncated.contains(&format!("a{}b", TRUNCATION_MARKER)));

        let short = "x".repeat(4000);
        assert_eq!(truncate_failure_text(&short), short);
        let exact = "x".repeat(MAX_FAILURE_TEXT);
        assert_eq!(truncate_failure_text(&exact), exact);
    }

    #[test]
    fn test_truncation_counts_characters() {
        let text = "é".repeat(5001);
        let truncated = truncate_failure_text(&text);
        assert_eq!(truncated.chars().count(), 5000 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_test_name() {
        assert_eq!(test_name("tests/test_a.py::test_one"), "test_one");
        assert_eq!(test_name("tests/test_a.py::TestCls::test_one"), "test_one");
        assert_eq!(test_name("tests/test_a.py::TestCls::test_one::sub"), "test_one");
        assert_eq!(test_name("test_lonely"), "test_lonely");
    }

    #[test]
    fn test_convert_datatypes() {
        let data = serde_json::json!({
            "a": "true", "b": "false", "c": "12", "d": "3.25",
            "e": "1.2.3", "f": "True", "g": "-4", "h": null, "i": "PROJ-1"
        });
        let converted = convert_datatypes(data.as_object().unwrap().clone());
        assert_eq!(converted["a"], true);
        assert_eq!(converted["b"], false);
        assert_eq!(converted["c"], 12);
        assert_eq!(converted["d"], 3.25);
        assert_eq!(converted["e"], "1.2.3");
        assert_eq!(converted["f"], "True");
        assert_eq!(converted["g"], "-4");
        assert_eq!(converted["h"], Value::Null);
        assert_eq!(converted["i"], "PROJ-1");
    }

    #[test]
    fn test_convert_datatypes_keeps_oversized_integers() {
        let data = serde_json::json!({"big": "123456789012345678901234", "max": "18446744073709551615"});
        let converted = convert_datatypes(data.as_object().unwrap().clone());
        assert_eq!(converted["big"], "123456789012345678901234");
        assert_eq!(converted["max"], u64::MAX);
    }

    #[test]
    fn test_collection_ignores_markers_without_key() {
        let publisher = RecordingPublisher::default();
        let mut plugin = plugin(&publisher, PluginOptions::default());
        plugin.on_collection_complete(&[
            CollectedItem::new("t.py::empty").with_marker(Marker::new(XRAY_MARKER, &[])),
            CollectedItem::new("t.py::other").with_marker(Marker::new("slow", &["P-9"])),
        ]);
        assert_eq!(plugin.tracking_id("tests/test_a.py::test_one"), Some("P-1"));
        assert_eq!(plugin.tracking_id("t.py::empty"), None);
        assert_eq!(plugin.tracking_id("t.py::other"), None);
    }

    #[tokio::test]
    async fn test_phase_filtering() {
        let publisher = RecordingPublisher::default();
        let mut plugin = plugin(&publisher, PluginOptions::default());
        let node = "tests/test_a.py::test_one";

        let events = [
            TestEvent::new(node, Phase::Setup, Outcome::Passed),
            TestEvent::new(node, Phase::Teardown, Outcome::Failed),
            TestEvent::new(node, Phase::Setup, Outcome::Skipped).with_failure_text("skipped: no db"),
            TestEvent::new("tests/test_a.py::test_two", Phase::Setup, Outcome::Failed),
            call("tests/test_a.py::test_plain", Outcome::Passed),
        ];
        for event in &events {
            plugin.on_test_finished(event).await.unwrap();
        }

        let records = plugin.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tracking_id, "P-1");
        assert_eq!(records[0].status, "skipped");
        assert_eq!(records[0].failure_text, "skipped: no db");
        assert_eq!(records[1].tracking_id, "P-2");
        assert_eq!(records[1].status, "failed");
        assert!(publisher.batches().is_empty());
    }

    #[tokio::test]
    async fn test_record_fields() {
        let publisher = RecordingPublisher::default();
        let sources = MetadataSources::empty()
            .with_osenv_fields(vec![
                ("BUILD_NUMBER".to_string(), "build".to_string()),
                ("NIGHTLY".to_string(), "nightly".to_string()),
            ])
            .with_env(HashMap::from([
                ("BUILD_NUMBER".to_string(), "1234".to_string()),
                ("NIGHTLY".to_string(), "true".to_string()),
            ]));
        let mut plugin = XrayPlugin::new(Box::new(publisher.clone()), PluginOptions::default(), sources);
        plugin.on_session_start(SessionInfo {
            mark_expr: Some("smoke".to_string()),
        });
        plugin.on_collection_complete(&[item("tests/test_a.py::TestX::test_one", Some("P-1"))]);

        let event = call("tests/test_a.py::TestX::test_one", Outcome::Failed)
            .with_duration(0.75)
            .with_failure_text("AssertionError")
            .with_property(ERROR_SIGNATURE, "E-42");
        plugin.on_test_finished(&event).await.unwrap();

        let record = &plugin.records()[0];
        assert_eq!(record.test_name, "test_one");
        assert_eq!(record.duration, 0.75);
        assert_eq!(record.error_signature.as_deref(), Some("E-42"));
        assert_eq!(record.metadata["suite"], "smoke");
        assert_eq!(record.metadata["build"], 1234);
        assert_eq!(record.metadata["nightly"], true);
    }

    #[tokio::test]
    async fn test_datatype_conversion_can_be_disabled() {
        let publisher = RecordingPublisher::default();
        let sources = MetadataSources::empty()
            .with_osenv_fields(vec![("N".to_string(), "n".to_string())])
            .with_env(HashMap::from([("N".to_string(), "7".to_string())]));
        let options = PluginOptions {
            convert_datatypes: false,
            ..PluginOptions::default()
        };
        let mut plugin = XrayPlugin::new(Box::new(publisher.clone()), options, sources);
        plugin.on_collection_complete(&[item("t.py::a", Some("P-1"))]);
        plugin.on_test_finished(&call("t.py::a", Outcome::Passed)).await.unwrap();
        assert_eq!(plugin.records()[0].metadata["n"], "7");
    }

    #[tokio::test]
    async fn test_interactive_pushes_carry_execution_key() {
        let publisher = RecordingPublisher::with_keys(&["EX-1", "EX-1"]);
        let mut plugin = plugin(&publisher, interactive());

        plugin
            .on_test_finished(&call("tests/test_a.py::test_one", Outcome::Passed))
            .await
            .unwrap();
        plugin
            .on_test_finished(&call("tests/test_a.py::test_two", Outcome::Failed))
            .await
            .unwrap();

        let batches = publisher.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].execution_key(), None);
        assert_eq!(batches[0].tests(), &[Case::new("P-1", Status::Pass)]);
        assert_eq!(batches[1].execution_key(), Some("EX-1"));
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1].tests()[0].test_key(), "P-2");

        let summary = plugin.on_session_finish().await.unwrap();
        assert_eq!(publisher.batches().len(), 2);
        assert_eq!(summary.pushes, 2);
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.execution_key, "EX-1");
    }

    #[tokio::test]
    async fn test_interactive_failed_push_keeps_previous_key() {
        let publisher = RecordingPublisher::with_keys(&["EX-5", "", "EX-5"]);
        let mut plugin = plugin(&publisher, interactive());

        for outcome in [Outcome::Passed, Outcome::Failed, Outcome::Passed] {
            plugin
                .on_test_finished(&call("tests/test_a.py::test_one", outcome))
                .await
                .unwrap();
        }

        let batches = publisher.batches();
        assert_eq!(batches[1].execution_key(), Some("EX-5"));
        assert_eq!(batches[2].execution_key(), Some("EX-5"));

        let summary = plugin.on_session_finish().await.unwrap();
        assert_eq!(summary.errors, vec!["push failed".to_string()]);
    }

    #[tokio::test]
    async fn test_initial_execution_key_and_plan() {
        let publisher = RecordingPublisher::with_keys(&["EX-7"]);
        let options = PluginOptions {
            test_plan_key: Some("PLAN-1".to_string()),
            execution_key: Some("EX-7".to_string()),
            ..PluginOptions::default()
        };
        let mut plugin = plugin(&publisher, options);
        plugin
            .on_test_finished(&call("tests/test_a.py::test_one", Outcome::Passed))
            .await
            .unwrap();
        plugin.on_session_finish().await.unwrap();

        let batches = publisher.batches();
        assert_eq!(batches[0].execution_key(), Some("EX-7"));
        assert_eq!(batches[0].plan_key(), Some("PLAN-1"));
    }

    #[tokio::test]
    async fn test_zero_pass_run_is_not_pushed() {
        let publisher = RecordingPublisher::with_keys(&["EX-1"]);
        let mut plugin = plugin(&publisher, PluginOptions::default());
        for node in ["tests/test_a.py::test_one", "tests/test_a.py::test_two"] {
            plugin.on_test_finished(&call(node, Outcome::Failed)).await.unwrap();
        }

        let summary = plugin.on_session_finish().await.unwrap();
        assert!(publisher.batches().is_empty());
        assert!(summary.zero_pass_blocked);
        assert_eq!(summary.pushes, 0);
        assert_eq!(summary.total_items, 2);
    }

    #[tokio::test]
    async fn test_zero_pass_run_pushed_when_allowed() {
        let publisher = RecordingPublisher::with_keys(&["EX-1"]);
        let options = PluginOptions {
            all_fails_allowed: true,
            ..PluginOptions::default()
        };
        let mut plugin = plugin(&publisher, options);
        plugin
            .on_test_finished(&call("tests/test_a.py::test_one", Outcome::Failed))
            .await
            .unwrap();

        let summary = plugin.on_session_finish().await.unwrap();
        assert_eq!(publisher.batches().len(), 1);
        assert!(!summary.zero_pass_blocked);
    }

    #[tokio::test]
    async fn test_single_push_covers_all_records() {
        let publisher = RecordingPublisher::with_keys(&["EX-2"]);
        let mut plugin = plugin(&publisher, PluginOptions::default());
        plugin
            .on_test_finished(&call("tests/test_a.py::test_one", Outcome::Passed))
            .await
            .unwrap();
        plugin
            .on_test_finished(&call("tests/test_a.py::test_two", Outcome::Failed))
            .await
            .unwrap();
        assert!(publisher.batches().is_empty());

        let summary = plugin.on_session_finish().await.unwrap();
        let batches = publisher.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(summary.execution_key, "EX-2");
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_empty_session_is_not_pushed() {
        let publisher = RecordingPublisher::default();
        let options = PluginOptions {
            all_fails_allowed: true,
            ..PluginOptions::default()
        };
        let mut plugin = plugin(&publisher, options);
        let summary = plugin.on_session_finish().await.unwrap();
        assert!(publisher.batches().is_empty());
        assert_eq!(summary.total_items, 0);
    }

    #[tokio::test]
    async fn test_unknown_outcome_aborts_final_push() {
        let publisher = RecordingPublisher::with_keys(&["EX-1"]);
        let mut plugin = plugin(&publisher, PluginOptions::default());
        plugin
            .on_test_finished(&call("tests/test_a.py::test_one", Outcome::Passed))
            .await
            .unwrap();
        plugin
            .on_test_finished(&call("tests/test_a.py::test_two", Outcome::Unknown))
            .await
            .unwrap();

        let err = plugin.on_session_finish().await.unwrap_err();
        assert!(matches!(err, ReportError::InvalidOutcome { .. }));
        assert!(publisher.batches().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_outcome_aborts_zero_pass_run() {
        let publisher = RecordingPublisher::with_keys(&["EX-1"]);
        let mut plugin = plugin(&publisher, PluginOptions::default());
        plugin
            .on_test_finished(&call("tests/test_a.py::test_one", Outcome::Failed))
            .await
            .unwrap();
        plugin
            .on_test_finished(&call("tests/test_a.py::test_two", Outcome::Unknown))
            .await
            .unwrap();

        let err = plugin.on_session_finish().await.unwrap_err();
        assert!(matches!(
            err,
            ReportError::InvalidOutcome { ref tracking_id, ref status }
                if tracking_id == "P-2" && status == "None"
        ));
        assert!(publisher.batches().is_empty());
    }

    #[tokio::test]
    async fn test_marked_tests_reported_in_one_batch() {
        let publisher = RecordingPublisher::with_keys(&["EX-10"]);
        let mut plugin = XrayPlugin::new(
            Box::new(publisher.clone()),
            PluginOptions::default(),
            MetadataSources::empty().with_env(HashMap::new()),
        );
        plugin.on_collection_complete(&[
            item("tests/test_login.py::test_ok", Some("JIRA-1")),
            item("tests/test_login.py::test_bad", Some("JIRA-2")),
            item("tests/test_login.py::test_unmarked", None),
        ]);

        let events = [
            call("tests/test_login.py::test_ok", Outcome::Passed),
            call("tests/test_login.py::test_bad", Outcome::Failed)
                .with_failure_text("AssertionError: x != y"),
            call("tests/test_login.py::test_unmarked", Outcome::Passed),
        ];
        for event in &events {
            plugin.on_test_finished(event).await.unwrap();
        }
        let summary = plugin.on_session_finish().await.unwrap();

        let batches = publisher.batches();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.len(), 2);

        let ok = &batch.tests()[0];
        assert_eq!(ok.test_key(), "JIRA-1");
        assert_eq!(ok.status(), Status::Pass);

        let bad = &batch.tests()[1];
        assert_eq!(bad.test_key(), "JIRA-2");
        assert_eq!(bad.status(), Status::Fail);
        assert_eq!(bad.comment(), "AssertionError: x != y");

        assert!(batch.tests().iter().all(|case| case.test_key().starts_with("JIRA-")));
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.execution_key, "EX-10");
    }

    #[tokio::test]
    async fn test_unknown_outcome_aborts_interactive_push() {
        let publisher = RecordingPublisher::default();
        let mut plugin = plugin(&publisher, interactive());
        let result = plugin
            .on_test_finished(&call("tests/test_a.py::test_one", Outcome::Unknown))
            .await;
        assert!(matches!(result, Err(ReportError::InvalidOutcome { .. })));
    }
}
