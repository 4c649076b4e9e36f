//! Publisher for the XRAY REST import endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, error, info};

use super::{Credentials, PublishError, Publisher, TEST_EXECUTION_ENDPOINT, TlsVerification};
use crate::config::SettingsError;
use crate::report::Batch;

/// Longest slice of an error response body kept in the error log.
const MAX_ERROR_BODY: usize = 500;

/// Posts execution reports to an XRAY server.
///
/// Each call to [`publish`](Publisher::publish) is one blocking POST with no
/// retries. The execution key is read from `testExecIssue.key` in the
/// response.
pub struct XrayPublisher {
    client: Client,
    base_url: String,
    credentials: Credentials,
    errors: Vec<String>,
}

impl XrayPublisher {
    /// Creates a publisher with a client configured for TLS and timeout.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        tls: &TlsVerification,
        timeout: Option<Duration>,
    ) -> Result<Self, SettingsError> {
        let client = build_client(tls, timeout)?;
        Ok(Self::with_client(client, base_url, credentials))
    }

    /// Creates a publisher using an existing HTTP client.
    pub fn with_client(client: Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            credentials,
            errors: Vec::new(),
        }
    }

    /// Full URL of the import endpoint.
    pub fn endpoint_url(&self) -> String {
        format!("{}{}", self.base_url, TEST_EXECUTION_ENDPOINT)
    }

    async fn send(&self, batch: &Batch) -> Result<String, PublishError> {
        let url = self.endpoint_url();
        let mut request = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&batch.to_document());

        if !self.credentials.is_anonymous() {
            request = request.basic_auth(
                self.credentials.username(),
                Some(self.credentials.secret()),
            );
        }

        let response = request.send().await.map_err(|source| {
            error!("Connection error to XRAY service {}", self.base_url);
            PublishError::Connection {
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                "Could not post to XRAY service {}. Response status code: {}",
                self.base_url, status
            );
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                code: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PublishError::MalformedResponse(e.to_string()))?;
        extract_execution_key(&body)
    }
}

#[async_trait]
impl Publisher for XrayPublisher {
    async fn publish(&mut self, batch: &Batch) -> String {
        debug!("Publishing {} cases to {}", batch.len(), self.endpoint_url());
        match self.send(batch).await {
            Ok(key) => {
                info!("Uploaded results to XRAY test execution: {}", key);
                key
            }
            Err(e) => {
                self.errors.push(e.to_string());
                String::new()
            }
        }
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn name(&self) -> &str {
        "xray"
    }
}

fn build_client(tls: &TlsVerification, timeout: Option<Duration>) -> Result<Client, SettingsError> {
    let mut builder = Client::builder();

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    match tls {
        TlsVerification::Enabled => {}
        TlsVerification::Disabled => {
            builder = builder.danger_accept_invalid_certs(true);
        }
        TlsVerification::CaBundle(path) => {
            let pem = std::fs::read(path).map_err(|e| SettingsError::CaBundle {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                SettingsError::CaBundle {
                    path: path.clone(),
                    message: e.to_string(),
                }
            })?;
            builder = builder.add_root_certificate(cert);
        }
    }

    builder
        .build()
        .map_err(|e| SettingsError::Client(e.to_string()))
}

fn extract_execution_key(body: &Value) -> Result<String, PublishError> {
    body.pointer("/testExecIssue/key")
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            PublishError::MalformedResponse(format!("missing testExecIssue.key in {}", body))
        })
}
