//! Typed settings resolved once at startup.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use super::options::{self as opt};
use super::{ConfigResolver, FieldMap};
use crate::publisher::{Credentials, TlsVerification};

/// Errors for option values that resolve but cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// `xr_url` is required for pushing to a real server.
    #[error("No XRAY server URL configured (set --{})", opt::URL)]
    MissingUrl,

    /// The URL could not be parsed.
    #[error("Invalid XRAY server URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The port is not a valid TCP port.
    #[error("Invalid XRAY server port '{0}'")]
    InvalidPort(String),

    /// The timeout is not a positive number of seconds.
    #[error("Invalid XRAY connection timeout '{0}'")]
    InvalidTimeout(String),

    /// The CA bundle could not be loaded.
    #[error("Failed to load CA bundle {path}: {message}")]
    CaBundle { path: PathBuf, message: String },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Everything the collector and publisher need, resolved from all tiers.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Whether syncing is enabled at all.
    pub enabled: bool,

    /// Server base URL with the configured port applied.
    pub base_url: Option<Url>,

    /// Basic-auth credentials.
    pub credentials: Credentials,

    /// Request timeout. `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,

    /// Push after every test instead of once per session.
    pub interactive_push: bool,

    /// Push the final report even if no test passed.
    pub all_fails_allowed: bool,

    /// Print reports instead of sending them.
    pub dry_run: bool,

    /// Server certificate verification.
    pub tls: TlsVerification,

    /// Runner option name -> report field name.
    pub pytest_fields: FieldMap,

    /// Environment variable name -> report field name.
    pub osenv_fields: FieldMap,

    /// Test plan key attached to every batch.
    pub test_plan_key: Option<String>,

    /// Execution key to attach the first push to.
    pub execution_key: Option<String>,
}

impl SyncSettings {
    /// Resolves all settings from the given resolver.
    pub fn resolve(resolver: &ConfigResolver) -> Result<Self, SettingsError> {
        let port = resolver
            .resolve(opt::PORT, None, None)
            .map(|raw| {
                raw.trim()
                    .parse::<u16>()
                    .map_err(|_| SettingsError::InvalidPort(raw.clone()))
            })
            .transpose()?;

        let base_url = resolver
            .resolve(opt::URL, None, None)
            .map(|raw| parse_base_url(&raw, port))
            .transpose()?;

        let timeout = resolver
            .resolve(opt::TIMEOUT, None, None)
            .map(|raw| parse_timeout(&raw))
            .transpose()?;

        let credentials = Credentials::new(
            resolver.resolve(opt::USERNAME, None, None).unwrap_or_default(),
            resolver.resolve(opt::PASSWORD, None, None).unwrap_or_default(),
        );

        let tls = resolver
            .resolve(opt::SSL_VERIFICATION, None, None)
            .map(|raw| TlsVerification::parse(&raw))
            .unwrap_or_default();

        Ok(Self {
            enabled: resolver.resolve_flag(opt::ENABLE, None, false),
            base_url,
            credentials,
            timeout,
            interactive_push: resolver.resolve_flag(opt::INTERACTIVE, None, false),
            all_fails_allowed: resolver.resolve_flag(opt::ALL_FAILS_ALLOWED, None, false),
            dry_run: resolver.resolve_flag(opt::DRY_RUN, None, false),
            tls,
            pytest_fields: resolver.resolve_dict(opt::PYTEST_FIELDS),
            osenv_fields: resolver.resolve_dict(opt::OSENV_FIELDS),
            test_plan_key: resolver.resolve(opt::TEST_PLAN, None, None),
            execution_key: resolver.resolve(opt::EXECUTION_ID, None, None),
        })
    }

    /// Renders the settings for display. The password is never shown.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let fields = |map: &FieldMap| {
            map.iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        vec![
            ("enabled", self.enabled.to_string()),
            (
                "url",
                self.base_url
                    .as_ref()
                    .map(Url::to_string)
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("username", self.credentials.username().to_string()),
            ("password", self.credentials.redacted().to_string()),
            (
                "timeout",
                self.timeout
                    .map(|t| format!("{}s", t.as_secs_f64()))
                    .unwrap_or_else(|| "default".to_string()),
            ),
            ("interactive push", self.interactive_push.to_string()),
            ("all fails allowed", self.all_fails_allowed.to_string()),
            ("dry run", self.dry_run.to_string()),
            ("ssl verification", self.tls.to_string()),
            ("test plan", self.test_plan_key.clone().unwrap_or_default()),
            ("execution", self.execution_key.clone().unwrap_or_default()),
            ("pytest fields", fields(&self.pytest_fields)),
            ("osenv fields", fields(&self.osenv_fields)),
        ]
    }
}

/// Parses the server URL, accepting a bare hostname, and applies the port.
fn parse_base_url(raw: &str, port: Option<u16>) -> Result<Url, SettingsError> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let mut url = Url::parse(&candidate).map_err(|e| SettingsError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    if let Some(port) = port {
        url.set_port(Some(port))
            .map_err(|_| SettingsError::InvalidPort(port.to_string()))?;
    }
    Ok(url)
}

fn parse_timeout(raw: &str) -> Result<Duration, SettingsError> {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        _ => Err(SettingsError::InvalidTimeout(raw.to_string())),
    }
}
