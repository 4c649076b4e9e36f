//! Publisher that prints reports instead of sending them.

use async_trait::async_trait;

use super::{PublishError, Publisher};
use crate::report::Batch;

/// Execution key returned by every dry-run publish.
pub const LOCAL_EXECUTION_KEY: &str = "local";

/// Prints each batch as pretty JSON to stdout.
///
/// Used for dry runs and for debugging field mappings without a server.
#[derive(Debug, Default)]
pub struct PrintPublisher {
    errors: Vec<String>,
}

impl PrintPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders a batch the way it is printed.
    pub fn render(batch: &Batch) -> Result<String, PublishError> {
        Ok(serde_json::to_string_pretty(&batch.to_document())?)
    }
}

#[async_trait]
impl Publisher for PrintPublisher {
    async fn publish(&mut self, batch: &Batch) -> String {
        match Self::render(batch) {
            Ok(rendered) => {
                println!();
                println!("{}", rendered);
            }
            Err(e) => self.errors.push(e.to_string()),
        }
        LOCAL_EXECUTION_KEY.to_string()
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn name(&self) -> &str {
        "print"
    }
}
