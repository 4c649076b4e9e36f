//! Static run metadata merged into every record.
//!
//! Metadata is assembled once per session, on the first recorded test,
//! from three places (later ones win on conflicts):
//!
//! 1. runner options named in `xr_pytest_fields_to_push`, plus `suite`
//!    (the session's marker expression)
//! 2. environment variables named in `xr_osenv_fields_to_push`
//! 3. an optional shared settings object, read with the same field map
//!    as the runner options; it also supplies `build` when nothing else
//!    does

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{ConfigResolver, FieldMap, SyncSettings};

/// Field always added to the metadata with the session's marker expression.
pub const SUITE_FIELD: &str = "suite";
/// Field filled from [`SharedSettings::build_id`] when otherwise missing.
pub const BUILD_FIELD: &str = "build";
/// Settings key holding the build under test.
pub const BUILD_ID_KEY: &str = "aut_build";

/// Read access to environment variables.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A shared key/value settings object provided by the test project.
pub trait SharedSettings: Send + Sync {
    /// Returns the value for `key`, or `None` when unset or empty.
    fn value(&self, key: &str) -> Option<String>;

    /// Identifier of the build under test.
    fn build_id(&self) -> Option<String>;
}

/// Errors loading a settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsFileError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} must contain a JSON object: {message}")]
    Invalid { path: String, message: String },
}

/// Shared settings loaded from a JSON object.
///
/// ```json
/// {"aut_build": "1.4.2", "environment": "staging"}
/// ```
#[derive(Debug, Clone, Default)]
pub struct SettingsFile {
    values: Map<String, Value>,
}

impl SettingsFile {
    /// Loads settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let values: Map<String, Value> =
            serde_json::from_str(&content).map_err(|e| SettingsFileError::Invalid {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { values })
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl SharedSettings for SettingsFile {
    fn value(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::Null => None,
            Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn build_id(&self) -> Option<String> {
        self.value(BUILD_ID_KEY)
    }
}

/// Everything needed to compute the static metadata of a session.
pub struct MetadataSources {
    pytest_fields: FieldMap,
    osenv_fields: FieldMap,
    options: ConfigResolver,
    env: Box<dyn Environment>,
    settings: Option<Box<dyn SharedSettings>>,
}

impl MetadataSources {
    /// Creates sources reading runner options from `options` and the
    /// field maps from `settings`. Uses the process environment.
    pub fn new(options: ConfigResolver, settings: &SyncSettings) -> Self {
        Self {
            pytest_fields: settings.pytest_fields.clone(),
            osenv_fields: settings.osenv_fields.clone(),
            options,
            env: Box::new(ProcessEnv),
            settings: None,
        }
    }

    /// Sources with no field maps; only `suite` is produced.
    pub fn empty() -> Self {
        Self {
            pytest_fields: Vec::new(),
            osenv_fields: Vec::new(),
            options: ConfigResolver::default(),
            env: Box::new(ProcessEnv),
            settings: None,
        }
    }

    pub fn with_pytest_fields(mut self, fields: FieldMap) -> Self {
        self.pytest_fields = fields;
        self
    }

    pub fn with_osenv_fields(mut self, fields: FieldMap) -> Self {
        self.osenv_fields = fields;
        self
    }

    pub fn with_options(mut self, options: ConfigResolver) -> Self {
        self.options = options;
        self
    }

    pub fn with_env(mut self, env: impl Environment + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn with_settings(mut self, settings: impl SharedSettings + 'static) -> Self {
        self.settings = Some(Box::new(settings));
        self
    }

    /// Computes the metadata map.
    pub fn collect(&self, suite: Option<&str>) -> Map<String, Value> {
        let mut data = self.runner_data(suite);
        data.extend(self.env_data());
        data.extend(self.settings_data());
        debug!("Static metadata: {:?}", data.keys().collect::<Vec<_>>());
        data
    }

    fn runner_data(&self, suite: Option<&str>) -> Map<String, Value> {
        let mut data = Map::new();
        for (option, field) in &self.pytest_fields {
            match self.options.runner_option(option) {
                Some(value) => {
                    data.insert(field.clone(), Value::String(value));
                }
                None => warn!("Couldn't find runner option '{}' for field '{}'", option, field),
            }
        }
        data.insert(
            SUITE_FIELD.to_string(),
            Value::String(suite.unwrap_or_default().to_string()),
        );
        data
    }

    fn env_data(&self) -> Map<String, Value> {
        self.osenv_fields
            .iter()
            .map(|(var, field)| {
                let value = self.env.var(var).map(Value::String).unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect()
    }

    fn settings_data(&self) -> Map<String, Value> {
        let Some(settings) = &self.settings else {
            return Map::new();
        };

        let mut data: Map<String, Value> = self
            .pytest_fields
            .iter()
            .filter_map(|(key, field)| {
                settings
                    .value(key)
                    .map(|value| (field.clone(), Value::String(value)))
            })
            .collect();

        if !data.contains_key(BUILD_FIELD)
            && let Some(build) = settings.build_id()
        {
            data.insert(BUILD_FIELD.to_string(), Value::String(build));
        }
        data
    }
}
