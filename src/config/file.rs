//! Configuration tiers backed by the command line and TOML files.

use std::collections::HashMap;
use std::path::Path;

use toml::{Table, Value};
use tracing::{debug, warn};

use super::ConfigLookupError;
use super::options::PREFIX;

/// Table in the project defaults file that holds xray-sync options.
pub const PROJECT_TABLE: &str = "xray";

/// Option values captured from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    values: HashMap<String, String>,
}

impl CliOptions {
    /// Builds the tier from `(name, value)` pairs. Leading `--` is ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().trim_start_matches("--").to_string(), v.into()))
            .collect();
        Self { values }
    }

    /// Sets a single option value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .insert(name.trim_start_matches("--").to_string(), value.into());
    }

    /// Returns the raw value given on the command line.
    pub fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// The project defaults file (`xray-sync.toml`).
///
/// Options live in a flat `[xray]` table under their full names:
///
/// ```toml
/// [xray]
/// xr_config = "~/.config/xray.toml"
/// xr_interactive_push = true
/// ```
#[derive(Debug, Clone, Default)]
pub struct IniOptions {
    table: Table,
}

impl IniOptions {
    /// Loads the project file. A missing or broken file yields an empty tier.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No project file at {}", path.display());
            return Self::default();
        }
        match read_table(path).and_then(|table| Self::from_table(table, path)) {
            Ok(options) => options,
            Err(e) => {
                warn!("{}", e);
                Self::default()
            }
        }
    }

    /// Parses project options from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigLookupError> {
        let table = parse_table(content, Path::new("<inline>"))?;
        Self::from_table(table, Path::new("<inline>"))
    }

    fn from_table(mut table: Table, path: &Path) -> Result<Self, ConfigLookupError> {
        match table.remove(PROJECT_TABLE) {
            Some(Value::Table(table)) => Ok(Self { table }),
            Some(_) => Err(ConfigLookupError::Malformed {
                path: path.to_path_buf(),
                message: format!("'{}' must be a table", PROJECT_TABLE),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Returns the value of `name` rendered as text.
    pub fn get(&self, name: &str) -> Result<Option<String>, ConfigLookupError> {
        self.table
            .get(name)
            .map(|value| render_value(name, value))
            .transpose()
    }
}

/// The external config file, grouped into sections.
///
/// Every top-level table is a section. Keys are option names without the
/// `xr_` prefix:
///
/// ```toml
/// [server]
/// url = "https://jira.example.com"
/// username = "ci-bot"
///
/// [fields]
/// osenv_fields_to_push = """
/// BUILD_NUMBER: build
/// GIT_BRANCH: branch
/// """
/// ```
///
/// Sections keep their declaration order, which decides the winner when
/// several sections define the same key.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    sections: Table,
}

impl ConfigFile {
    /// Loads the file, returning `None` when it is missing or unusable.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("Config file {} not found", path.display());
            return None;
        }
        match read_table(path) {
            Ok(table) => Some(Self::from_table(table)),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    /// Parses a config file from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigLookupError> {
        parse_table(content, Path::new("<inline>")).map(Self::from_table)
    }

    fn from_table(table: Table) -> Self {
        let sections = table
            .into_iter()
            .filter(|(name, value)| {
                let is_section = value.is_table();
                if !is_section {
                    debug!("Ignoring top-level key '{}' outside any section", name);
                }
                is_section
            })
            .collect();
        Self { sections }
    }

    /// Returns the section names in declaration order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Looks up an option, honouring the section hint when it exists.
    pub fn get(
        &self,
        name: &str,
        section: Option<&str>,
    ) -> Result<Option<String>, ConfigLookupError> {
        let key = name.strip_prefix(PREFIX).unwrap_or(name);

        if let Some(hint) = section
            && let Some(Value::Table(table)) = self.sections.get(hint)
        {
            return table.get(key).map(|v| render_value(name, v)).transpose();
        }

        for table in self.sections.values().filter_map(Value::as_table) {
            if let Some(value) = table.get(key) {
                return render_value(name, value).map(Some);
            }
        }
        Ok(None)
    }
}

fn read_table(path: &Path) -> Result<Table, ConfigLookupError> {
    let content =
        std::fs::read_to_string(path).map_err(|source| ConfigLookupError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    parse_table(&content, path)
}

fn parse_table(content: &str, path: &Path) -> Result<Table, ConfigLookupError> {
    content
        .parse::<Table>()
        .map_err(|e| ConfigLookupError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Renders a TOML value as option text. Arrays become one line per item.
fn render_value(name: &str, value: &Value) -> Result<String, ConfigLookupError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(d) => Ok(d.to_string()),
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| render_value(name, item))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n")),
        Value::Table(_) => Err(ConfigLookupError::NotScalar(name.to_string())),
    }
}
