//! # sqlprep
//!
//! Turns raw language-model output into SQL that can be executed.
//!
//! Three transforms, all total over arbitrary input:
//!
//! | Transform        | Does                                                    |
//! |------------------|---------------------------------------------------------|
//! | [`clean`]        | strips fences, prose and terminators down to one statement |
//! | [`add_quotes`]   | quotes reserved-word and otherwise invalid identifiers  |
//! | [`remove_limit`] | drops the top-level `LIMIT` clause for dry runs         |
//!
//! The free functions use the ANSI dialect and default cleaning options.
//! Deployments build a [`Transforms`] once from configuration and share it.
//!
//! ## Quick Example
//!
//! ```
//! let raw = "Here is the query:\n```sql\nSELECT order FROM sales LIMIT 10;\n```";
//!
//! let sql = sqlprep::clean(raw);
//! assert_eq!(sql, "SELECT order FROM sales LIMIT 10");
//!
//! let (sql, report) = sqlprep::add_quotes(&sql);
//! assert_eq!(sql, "SELECT \"order\" FROM sales LIMIT 10");
//! assert_eq!(report, "quoted 'order' (reserved word)");
//!
//! assert_eq!(sqlprep::remove_limit(&sql), "SELECT \"order\" FROM sales");
//! ```

pub mod cleaner;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod limit;
pub mod quote;
pub mod transforms;

pub use transforms::{Prepared, Transforms};

pub mod prelude {
    pub use crate::cleaner::{CleanOptions, StatementPolicy};
    pub use crate::config::Config;
    pub use crate::dialect::{CaseFolding, Dialect, EscapeRule, QuoteReason};
    pub use crate::engine::{Engine, EngineConfig, ExecOptions, ExecOutcome, Session};
    pub use crate::error::*;
    pub use crate::quote::{QuoteReport, Quoted};
    pub use crate::transforms::{Prepared, Transforms};
}

/// Clean raw model output into one statement.
///
/// ```
/// assert_eq!(sqlprep::clean("```sql\nSELECT 1;\n```"), "SELECT 1");
/// assert_eq!(sqlprep::clean("no query here."), "");
/// ```
pub fn clean(raw: &str) -> String {
    cleaner::clean_result(
        raw,
        &cleaner::CleanOptions::default(),
        &lexer::LexOptions::default(),
    )
}

/// Remove the top-level `LIMIT` clause, if any.
pub fn remove_limit(sql: &str) -> String {
    limit::remove_limit(sql, &lexer::LexOptions::default())
}

/// Quote identifiers for the ANSI dialect. Returns the SQL and a report
/// that is empty when nothing changed.
pub fn add_quotes(sql: &str) -> (String, String) {
    let quoted = quote::quote_identifiers(sql, &dialect::Dialect::ansi());
    let report = quoted.report.to_string();
    (quoted.sql, report)
}
