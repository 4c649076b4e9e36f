//! Conversion of collected records into a [`Batch`].

use tracing::debug;

use super::model::{Batch, Case, Status};
use super::record::{ResultRecord, STATUS_FAILED, STATUS_PASSED, STATUS_SKIPPED};
use super::{ReportError, ReportResult};

/// Builds a batch from records, in record order.
///
/// | Record status | XRAY status | Comment |
/// |---------------|-------------|---------|
/// | `passed` | `PASS` | none |
/// | `failed` | `FAIL` | failure text |
/// | `skipped` | `ABORTED` | failure text |
///
/// # Errors
///
/// Any other status is a [`ReportError::InvalidOutcome`]. No partial batch
/// is returned.
pub fn build_batch(
    records: &[ResultRecord],
    execution_key: Option<&str>,
    plan_key: Option<&str>,
) -> ReportResult<Batch> {
    let mut batch = Batch::new(execution_key, plan_key);

    for record in records {
        let case = match record.status.as_str() {
            STATUS_PASSED => Case::new(&record.tracking_id, Status::Pass),
            STATUS_FAILED => {
                Case::new(&record.tracking_id, Status::Fail).with_comment(&record.failure_text)
            }
            STATUS_SKIPPED => {
                Case::new(&record.tracking_id, Status::Aborted).with_comment(&record.failure_text)
            }
            other => {
                return Err(ReportError::InvalidOutcome {
                    tracking_id: record.tracking_id.clone(),
                    status: other.to_string(),
                });
            }
        };
        batch.push(case.with_duration(record.duration));
    }

    debug!(
        "Built batch with {} cases (execution: {:?})",
        batch.len(),
        batch.execution_key()
    );
    Ok(batch)
}
