//! Publishing execution reports to XRAY.
//!
//! A [`Publisher`] takes a [`Batch`] and returns the key of the remote test
//! execution it landed in. Failures are never raised: they are recorded in
//! [`Publisher::errors`] and the call returns an empty key, so a broken
//! server cannot affect the outcome of the test run itself.
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`xray::XrayPublisher`] | POST to the XRAY import endpoint |
//! | [`print::PrintPublisher`] | Print the report locally (dry run) |

pub mod print;
pub mod xray;

pub use print::PrintPublisher;
pub use xray::XrayPublisher;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::config::{SettingsError, SyncSettings};
use crate::report::Batch;

/// Path of the XRAY test execution import endpoint.
pub const TEST_EXECUTION_ENDPOINT: &str = "/rest/raven/2.0/import/execution";

/// Errors talking to the XRAY server.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The request never got a response.
    #[error("Connection to XRAY at {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("XRAY rejected the report with status {code}: {body}")]
    Status { code: u16, body: String },

    /// The server answered 2xx but the body has no execution key.
    #[error("Malformed XRAY response: {0}")]
    MalformedResponse(String),

    /// The report could not be rendered.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sends batches somewhere and remembers what went wrong.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a batch and returns the remote execution key.
    ///
    /// Returns an empty string on failure; the failure is appended to
    /// [`errors`](Self::errors).
    async fn publish(&mut self, batch: &Batch) -> String;

    /// Failures recorded so far, oldest first.
    fn errors(&self) -> &[String];

    /// Publisher name (for logging).
    fn name(&self) -> &str;
}

/// Creates the publisher selected by the settings.
///
/// # Errors
///
/// Fails if a real server is selected but no URL is configured, or the
/// HTTP client cannot be built with the requested TLS settings.
pub fn from_settings(settings: &SyncSettings) -> Result<Box<dyn Publisher>, SettingsError> {
    if settings.dry_run {
        return Ok(Box::new(PrintPublisher::new()));
    }

    let base_url = settings.base_url.clone().ok_or(SettingsError::MissingUrl)?;
    let publisher = XrayPublisher::new(
        base_url,
        settings.credentials.clone(),
        &settings.tls,
        settings.timeout,
    )?;
    Ok(Box::new(publisher))
}

/// Basic-auth username and password.
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns true if no username is configured.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Placeholder shown instead of the password.
    pub fn redacted(&self) -> &'static str {
        if self.secret.is_empty() {
            "<unset>"
        } else {
            "********"
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &self.redacted())
            .finish()
    }
}

/// How the server certificate is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Verify against the system roots.
    #[default]
    Enabled,

    /// Accept any certificate.
    Disabled,

    /// Verify against the system roots plus this PEM bundle.
    CaBundle(PathBuf),
}

impl TlsVerification {
    /// Parses a flag value or a CA bundle path.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "true" | "True" | "TRUE" => TlsVerification::Enabled,
            "false" | "False" | "FALSE" => TlsVerification::Disabled,
            path => TlsVerification::CaBundle(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for TlsVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVerification::Enabled => f.write_str("enabled"),
            TlsVerification::Disabled => f.write_str("disabled"),
            TlsVerification::CaBundle(path) => write!(f, "CA bundle {}", path.display()),
        }
    }
}
