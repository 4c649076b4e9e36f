//! Driving the collector from a runner event stream.

use std::io::BufRead;

use tracing::{debug, warn};

use crate::collector::{SyncSummary, XrayPlugin};
use crate::events::{EventError, EventReader, RunnerEvent};
use crate::report::ReportError;

/// Errors that stop a session before it is synchronized.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Events(#[from] EventError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Feeds every event of `reader` to `plugin` and finishes the session.
///
/// Events after `session_finish` are ignored. A stream that ends without
/// one is finished implicitly.
pub async fn run_session<R: BufRead>(
    plugin: &mut XrayPlugin,
    reader: R,
) -> Result<SyncSummary, SessionError> {
    for event in EventReader::new(reader) {
        match event? {
            RunnerEvent::SessionStart(info) => {
                debug!("Session started (mark expression: {:?})", info.mark_expr);
                plugin.on_session_start(info);
            }
            RunnerEvent::CollectionComplete { items } => {
                plugin.on_collection_complete(&items);
            }
            RunnerEvent::TestFinished(test) => {
                plugin.on_test_finished(&test).await?;
            }
            RunnerEvent::SessionFinish { exit_status } => {
                debug!("Session finished with exit status {:?}", exit_status);
                return Ok(plugin.on_session_finish().await?);
            }
        }
    }

    warn!("Event stream ended without session_finish");
    Ok(plugin.on_session_finish().await?)
}

/// Prints the end-of-run synchronization report.
pub fn print_summary(summary: &SyncSummary) {
    println!();
    for line in summary_lines(summary) {
        println!("{}", line);
    }
}

/// Renders the end-of-run report: item count first, then any failures.
pub fn summary_lines(summary: &SyncSummary) -> Vec<String> {
    let mut lines = vec![console::style("[xray-sync]").bold().to_string()];

    if summary.zero_pass_blocked {
        lines.push(
            console::style("No test passed; results were not pushed (set xr_all_fails_allowed to push them).")
                .yellow()
                .to_string(),
        );
    }

    lines.push(format!(
        "Report sync finished. Total items: '{}'",
        console::style(summary.total_items).green()
    ));
    if !summary.execution_key.is_empty() {
        lines.push(format!(
            "Test execution: {}",
            console::style(&summary.execution_key).bold()
        ));
    }

    if !summary.errors.is_empty() {
        lines.push(
            console::style(format!("Report sync failed: {} times", summary.errors.len()))
                .red()
                .bold()
                .to_string(),
        );
        lines.push("Errors:".to_string());
        for error in &summary.errors {
            lines.push(format!("  {}", console::style(error).dim()));
        }
    }
    lines
}
