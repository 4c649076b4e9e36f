//! Configuration resolution for xray-sync.
//!
//! Every option can come from one of three tiers, checked in order:
//!
//! 1. the command line (`--xr_url https://jira.example.com`)
//! 2. the project defaults file (`xray-sync.toml`, flat `[xray]` table)
//! 3. the external, sectioned config file named by `xr_config`
//!
//! The first non-empty value wins; otherwise the caller's default is used.
//!
//! ```text
//! ConfigResolver
//! ├── CliOptions   - values captured from the command line
//! ├── IniOptions   - project defaults file
//! └── ConfigFile   - optional sectioned file (sections = TOML tables)
//! ```
//!
//! Lookup failures in any tier (unreadable file, malformed TOML, a table
//! where a scalar was expected) are logged and treated as a miss. They are
//! never surfaced to the caller.

pub mod file;
pub mod options;
pub mod settings;

pub use file::{CliOptions, ConfigFile, IniOptions};
pub use options::OPTIONS;
pub use settings::{SettingsError, SyncSettings};

use std::path::PathBuf;

use tracing::debug;

/// Ordered `key -> value` pairs parsed from a multi-line option.
pub type FieldMap = Vec<(String, String)>;

/// Errors raised while reading a single configuration tier.
///
/// The resolver recovers from all of these by falling through to the next
/// tier, so they only ever show up in debug logs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLookupError {
    /// The file exists but could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML.
    #[error("Failed to parse config file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// The option exists but holds a table instead of a value.
    #[error("Option '{0}' is not a scalar value")]
    NotScalar(String),
}

/// Resolves option values across the CLI, project file and config file.
///
/// # Example
///
/// ```
/// use xray_sync::config::{CliOptions, ConfigResolver, IniOptions};
///
/// let cli = CliOptions::from_pairs([("xr_url", "https://jira.example.com")]);
/// let resolver = ConfigResolver::new(cli, IniOptions::default());
///
/// assert_eq!(
///     resolver.resolve("xr_url", None, None).as_deref(),
///     Some("https://jira.example.com")
/// );
/// assert!(!resolver.resolve_flag("xr_interactive_push", None, false));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli: CliOptions,
    ini: IniOptions,
    file: Option<ConfigFile>,
}

impl ConfigResolver {
    /// Creates a resolver and loads the config file named by `xr_config`.
    ///
    /// The config file path itself is only looked up on the command line
    /// and in the project file. A missing or malformed file behaves as if
    /// no file was configured.
    pub fn new(cli: CliOptions, ini: IniOptions) -> Self {
        let mut resolver = Self {
            cli,
            ini,
            file: None,
        };
        resolver.file = resolver.config_file_path().and_then(ConfigFile::load);
        resolver
    }

    /// Replaces the external config file tier.
    pub fn with_config_file(mut self, file: ConfigFile) -> Self {
        self.file = Some(file);
        self
    }

    /// Returns the expanded path of the external config file, if one is set.
    pub fn config_file_path(&self) -> Option<PathBuf> {
        let raw = self.runner_option(options::CONFIG)?;
        match shellexpand::full(&raw) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(e) => {
                debug!("Could not expand config path '{}': {}", raw, e);
                Some(PathBuf::from(raw))
            }
        }
    }

    /// Looks up an option on the command line, then in the project file.
    ///
    /// This is the view the test runner itself has of its options; the
    /// external config file is not consulted.
    pub fn runner_option(&self, name: &str) -> Option<String> {
        let name = name.trim_start_matches("--");
        if let Some(value) = non_empty(self.cli.get(name)) {
            return Some(value);
        }
        match self.ini.get(name) {
            Ok(value) => non_empty(value),
            Err(e) => {
                debug!("Ignoring project option '{}': {}", name, e);
                None
            }
        }
    }

    /// Resolves an option value across all tiers.
    ///
    /// `section` is a hint for the config file: when the section exists the
    /// option is read from it only, otherwise sections are scanned in
    /// declaration order and the first one defining the option wins.
    pub fn resolve(
        &self,
        name: &str,
        section: Option<&str>,
        default: Option<&str>,
    ) -> Option<String> {
        self.runner_option(name)
            .or_else(|| self.from_config_file(name, section))
            .or_else(|| default.map(str::to_string))
    }

    /// Resolves an option and coerces it to a boolean.
    ///
    /// `"false"`, `"False"` and `"FALSE"` are false; any other non-empty
    /// value is true. A missing value yields `default`.
    pub fn resolve_flag(&self, name: &str, section: Option<&str>, default: bool) -> bool {
        match self.resolve(name, section, None) {
            Some(value) => coerce_flag(&value),
            None => default,
        }
    }

    /// Resolves a multi-line option into its non-blank lines.
    pub fn resolve_list(&self, name: &str) -> Vec<String> {
        self.resolve(name, None, None)
            .map(|raw| {
                raw.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolves a multi-line option into ordered `key: value` pairs.
    ///
    /// Each line is split on the first `:`. A line without `:` maps the
    /// key to itself.
    pub fn resolve_dict(&self, name: &str) -> FieldMap {
        self.resolve_list(name)
            .iter()
            .map(|line| match line.split_once(':') {
                Some((key, value)) if !value.trim().is_empty() => {
                    (key.trim().to_string(), value.trim().to_string())
                }
                Some((key, _)) => (key.trim().to_string(), key.trim().to_string()),
                None => (line.clone(), line.clone()),
            })
            .collect()
    }

    fn from_config_file(&self, name: &str, section: Option<&str>) -> Option<String> {
        let file = self.file.as_ref()?;
        match file.get(name, section) {
            Ok(value) => non_empty(value),
            Err(e) => {
                debug!("Ignoring config file option '{}': {}", name, e);
                None
            }
        }
    }
}

/// Coerces a textual flag value to a boolean.
pub fn coerce_flag(value: &str) -> bool {
    !matches!(value.trim(), "false" | "False" | "FALSE")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
