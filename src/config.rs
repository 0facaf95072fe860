//! Configuration from `sqlprep.toml`.
//!
//! ```toml
//! [dialect]
//! preset = "postgres"
//! case_folding = "lower"
//! reserved_words = ["status"]
//!
//! [clean]
//! statement_policy = "first"
//!
//! [engine]
//! provider = "sqlx"
//!
//! [engine.config]
//! url = "postgres://localhost/analytics"
//! limit = 200
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cleaner::CleanOptions;
use crate::dialect::{CaseFolding, Dialect, EscapeRule};
use crate::engine::EngineConfig;
use crate::error::{SqlPrepError, SqlPrepResult};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "sqlprep.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dialect: DialectConfig,
    pub clean: CleanOptions,
    pub engine: EngineConfig,
}

/// `[dialect]`: a preset plus per-deployment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    pub preset: String,
    pub quote_char: Option<char>,
    pub escape_rule: Option<EscapeRule>,
    pub case_folding: Option<CaseFolding>,
    pub requote_foreign: Option<bool>,
    /// Added to the preset's reserved words.
    pub reserved_words: Vec<String>,
    /// Removed from the preset's reserved words.
    pub unreserved_words: Vec<String>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            preset: "ansi".to_string(),
            quote_char: None,
            escape_rule: None,
            case_folding: None,
            requote_foreign: None,
            reserved_words: Vec::new(),
            unreserved_words: Vec::new(),
        }
    }
}

impl DialectConfig {
    /// Resolve the preset and apply overrides. The result is not yet
    /// validated; [`crate::Transforms::init`] does that.
    pub fn build(&self) -> SqlPrepResult<Dialect> {
        let mut dialect = Dialect::preset(&self.preset)?;
        if let Some(quote) = self.quote_char {
            dialect = dialect.with_quote_char(quote);
        }
        if let Some(rule) = self.escape_rule {
            dialect = dialect.with_escape_rule(rule);
        }
        if let Some(folding) = self.case_folding {
            dialect = dialect.with_case_folding(folding);
        }
        if let Some(requote) = self.requote_foreign {
            dialect = dialect.with_requote_foreign(requote);
        }
        Ok(dialect
            .with_reserved_words(&self.reserved_words)
            .without_reserved_words(&self.unreserved_words))
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> SqlPrepResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load an explicit file, or the first of `./sqlprep.toml` and
    /// `<config dir>/sqlprep/config.toml` that exists. Defaults otherwise.
    pub fn load(path: Option<&Path>) -> SqlPrepResult<Self> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(SqlPrepError::Config(format!(
                        "{} not found",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match Self::discover() {
                Some(path) => path,
                None => {
                    debug!("no config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!(path = %path.display(), "loading config");
        let content = fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("sqlprep").join("config.toml"))
            .filter(|path| path.exists())
    }
}
