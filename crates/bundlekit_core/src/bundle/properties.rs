//! Bundle properties: the configuration handed to extension factories.
//!
//! # Responsibility
//! - Hold ordered string key/value pairs for bundle and registry setup.
//! - Load from JSON objects, `key=value` properties text, or files.
//! - Expose well-known keys (extension types, archive extensions, dirs).
//!
//! # Invariants
//! - Keys and values are stored trimmed.
//! - Parsing never yields a partially-loaded instance.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Prefix of keys that declare extension types (`bundle.extension.type.<alias>`).
pub const EXTENSION_TYPE_PREFIX: &str = "bundle.extension.type.";
/// Comma-separated archive file extensions treated as bundles.
pub const ARCHIVE_EXTENSION_KEY: &str = "bundle.archive.extension";
/// Directory holding bundle archives.
pub const LIBRARY_DIRECTORY_KEY: &str = "bundle.library.directory";
/// Directory where unpacked bundle content lives.
pub const WORKING_DIRECTORY_KEY: &str = "bundle.working.directory";
/// Archive extension used when none is configured.
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "bundle";

static PROPERTY_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^=:\s][^=:]*?)\s*[=:]\s*(.*?)\s*$").expect("valid property line regex")
});

/// Ordered string configuration map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleProperties {
    entries: BTreeMap<String, String>,
}

impl BundleProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a flat JSON object. Scalar values are stored as strings.
    ///
    /// # Errors
    /// - [`PropertiesError::Json`] when the text is not a JSON object.
    /// - [`PropertiesError::UnsupportedValue`] for nested arrays/objects.
    pub fn from_json_str(text: &str) -> Result<Self, PropertiesError> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(text).map_err(PropertiesError::Json)?;

        let mut properties = Self::new();
        for (key, value) in raw {
            let rendered = match value {
                serde_json::Value::String(value) => value,
                serde_json::Value::Bool(value) => value.to_string(),
                serde_json::Value::Number(value) => value.to_string(),
                serde_json::Value::Null => String::new(),
                _ => return Err(PropertiesError::UnsupportedValue(key)),
            };
            properties.set(key, rendered);
        }
        Ok(properties)
    }

    /// Parses `key=value` / `key: value` lines; `#` and `!` start comments.
    ///
    /// # Errors
    /// - [`PropertiesError::Syntax`] with the 1-based line number of the first
    ///   line that is neither blank, a comment, nor a key/value pair.
    pub fn from_properties_str(text: &str) -> Result<Self, PropertiesError> {
        let mut properties = Self::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let Some(captures) = PROPERTY_LINE_RE.captures(line) else {
                return Err(PropertiesError::Syntax { line: index + 1 });
            };
            properties.set(&captures[1], &captures[2]);
        }
        Ok(properties)
    }

    /// Loads a file; `.json` files are parsed as JSON, anything else as
    /// properties text.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PropertiesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(PropertiesError::Io)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_properties_str(&text)
        }
    }

    /// Builder-style setter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().trim().to_string();
        let value = value.into().trim().to_string();
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key.trim()).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.get(key).unwrap_or(fallback)
    }

    /// Reads a boolean flag (`true|false|yes|no|1|0`, case-insensitive).
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, PropertiesError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(PropertiesError::InvalidBool {
                key: key.trim().to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Reads a comma-separated list, dropping empty items.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Declared extension types keyed by alias.
    pub fn extension_types(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                let alias = key.strip_prefix(EXTENSION_TYPE_PREFIX)?;
                if alias.is_empty() || value.is_empty() {
                    return None;
                }
                Some((alias.to_string(), value.clone()))
            })
            .collect()
    }

    /// Archive extensions; defaults to [`DEFAULT_ARCHIVE_EXTENSION`].
    pub fn archive_extensions(&self) -> Vec<String> {
        let configured = self.get_list(ARCHIVE_EXTENSION_KEY);
        if configured.is_empty() {
            vec![DEFAULT_ARCHIVE_EXTENSION.to_string()]
        } else {
            configured
        }
    }

    pub fn library_directory(&self) -> Option<&str> {
        self.get(LIBRARY_DIRECTORY_KEY)
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.get(WORKING_DIRECTORY_KEY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Property loading and lookup errors.
#[derive(Debug)]
pub enum PropertiesError {
    Io(std::io::Error),
    Json(serde_json::Error),
    UnsupportedValue(String),
    Syntax { line: usize },
    InvalidBool { key: String, value: String },
}

impl Display for PropertiesError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read properties: {err}"),
            Self::Json(err) => write!(f, "invalid properties json: {err}"),
            Self::UnsupportedValue(key) => {
                write!(f, "property `{key}` must be a string, number or bool")
            }
            Self::Syntax { line } => write!(f, "invalid property syntax at line {line}"),
            Self::InvalidBool { key, value } => {
                write!(f, "property `{key}` is not a boolean: {value}")
            }
        }
    }
}

impl Error for PropertiesError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}
