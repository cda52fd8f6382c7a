//! Credential store settings.
//!
//! `DB_URL`, `DB_USER` and `DB_PASSWORD` are read from a local override file
//! (`KEY=value` lines, `.env` by default) and fall back to the process
//! environment. A key set in the file wins. All three are required.

use config::{Config, Environment, File, FileStoredFormat, Format, Map, Value};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{env, path::Path};
use thiserror::Error;
use url::Url;

pub const KEY_DB_URL: &str = "DB_URL";
pub const KEY_DB_USER: &str = "DB_USER";
pub const KEY_DB_PASSWORD: &str = "DB_PASSWORD";

const KEYS: [&str; 3] = [KEY_DB_URL, KEY_DB_USER, KEY_DB_PASSWORD];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} must be set in the override file or the environment", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("{0} in the environment is not valid UTF-8")]
    NotUnicode(&'static str),
    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
    #[error("invalid DB_URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("DB_URL cannot carry a username and password")]
    UrlCredentials,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvFileError {
    #[error("line {0}: expected KEY=value")]
    MissingSeparator(usize),
    #[error("line {0}: key must be ASCII letters, digits or '_'")]
    InvalidKey(usize),
}

/// Override file format: one `KEY=value` per line.
///
/// Blank lines and lines starting with `#` are skipped and an `export `
/// prefix is allowed. The value is everything after the first `=`, taken
/// literally: quotes, backslashes, `#` and surrounding spaces are kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvFileFormat;

impl EnvFileFormat {
    /// Parse `text` into lowercased keys and literal values.
    ///
    /// # Errors
    /// Returns an error naming the first line that is not `KEY=value`.
    pub fn parse_lines(text: &str) -> Result<Vec<(String, String)>, EnvFileError> {
        let mut pairs = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let number = index + 1;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(EnvFileError::MissingSeparator(number));
            };

            let key = key.trim_end();
            let key = key.strip_prefix("export ").map_or(key, str::trim_start);
            if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
                return Err(EnvFileError::InvalidKey(number));
            }

            pairs.push((key.to_lowercase(), value.to_string()));
        }

        Ok(pairs)
    }
}

impl Format for EnvFileFormat {
    fn parse(
        &self,
        uri: Option<&String>,
        text: &str,
    ) -> Result<Map<String, Value>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self::parse_lines(text)?
            .into_iter()
            .map(|(key, value)| (key, Value::new(uri, value)))
            .collect())
    }
}

impl FileStoredFormat for EnvFileFormat {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["env"]
    }
}

/// The three database keys from the process environment, lowercased to match
/// the override file. Unrelated variables are never read.
fn environment() -> Result<Map<String, String>, ConfigError> {
    let mut found = Map::new();

    for key in KEYS {
        if let Some(value) = env::var_os(key) {
            let value = value
                .into_string()
                .map_err(|_| ConfigError::NotUnicode(key))?;
            found.insert(key.to_lowercase(), value);
        }
    }

    Ok(found)
}

// Both sources produce lowercase keys.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    db_url: Option<String>,
    db_user: Option<String>,
    db_password: Option<String>,
}

#[derive(Clone)]
pub struct GlobalArgs {
    pub db_url: String,
    pub db_user: String,
    pub db_password: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(db_url: String, db_user: String, db_password: SecretString) -> Self {
        Self {
            db_url,
            db_user,
            db_password,
        }
    }

    /// Load settings, with `env_file` taking precedence over the environment.
    /// A missing `env_file` is not an error.
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] naming every absent or empty key, or
    /// an error if the file is malformed or a key's value is not UTF-8.
    pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
        let raw: RawSettings = Config::builder()
            .add_source(Environment::default().source(Some(environment()?)))
            .add_source(File::new(&env_file.to_string_lossy(), EnvFileFormat).required(false))
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let db_url = present(raw.db_url);
        let db_user = present(raw.db_user);
        let db_password = present(raw.db_password);

        match (db_url, db_user, db_password) {
            (Some(db_url), Some(db_user), Some(db_password)) => {
                Ok(Self::new(db_url, db_user, SecretString::from(db_password)))
            }
            (db_url, db_user, db_password) => {
                let missing = [
                    (KEY_DB_URL, db_url.is_none()),
                    (KEY_DB_USER, db_user.is_none()),
                    (KEY_DB_PASSWORD, db_password.is_none()),
                ]
                .into_iter()
                .filter_map(|(key, missing)| missing.then_some(key))
                .collect();

                Err(ConfigError::Missing(missing))
            }
        }
    }

    /// Connection string with `DB_USER` and `DB_PASSWORD` injected.
    ///
    /// # Errors
    /// Returns an error if `DB_URL` is not a URL that can hold credentials.
    pub fn dsn(&self) -> Result<SecretString, ConfigError> {
        let mut dsn = Url::parse(&self.db_url)?;

        dsn.set_username(&self.db_user)
            .map_err(|()| ConfigError::UrlCredentials)?;

        dsn.set_password(Some(self.db_password.expose_secret()))
            .map_err(|()| ConfigError::UrlCredentials)?;

        Ok(SecretString::from(dsn.to_string()))
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("db_url", &self.db_url)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .finish()
    }
}
