//! The transformation capability shared by every call site.
//!
//! Built once at startup with [`Transforms::init`]. Initialization fails
//! loudly when the dialect cannot be used, so a broken deployment never
//! reaches its first request. After that every transform is total.

use serde::Serialize;
use tracing::{Span, debug, info};

use crate::cleaner::{CleanOptions, clean_result};
use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::{SqlPrepError, SqlPrepResult};
use crate::limit;
use crate::quote::{Quoted, quote_identifiers};

/// Output of the full preparation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Prepared {
    pub sql: String,
    /// Quoting report, empty when nothing was quoted.
    pub report: String,
}

/// Validated dialect and cleaning options. `Send + Sync`, share it
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Transforms {
    dialect: Dialect,
    clean: CleanOptions,
    span: Span,
}

impl Default for Transforms {
    fn default() -> Self {
        Self {
            dialect: Dialect::ansi(),
            clean: CleanOptions::default(),
            span: Span::none(),
        }
    }
}

impl Transforms {
    /// Validate `dialect` and run a sample statement through each transform.
    pub fn init(dialect: Dialect, clean: CleanOptions, span: Span) -> SqlPrepResult<Self> {
        dialect.validate()?;
        let transforms = Self {
            dialect,
            clean,
            span,
        };
        transforms.self_check()?;

        info!(
            parent: &transforms.span,
            dialect = %transforms.dialect.name,
            quote = %transforms.dialect.quote_open,
            reserved = transforms.dialect.reserved_words().count(),
            "sql transforms ready"
        );
        Ok(transforms)
    }

    pub fn from_config(config: &Config, span: Span) -> SqlPrepResult<Self> {
        Self::init(config.dialect.build()?, config.clean.clone(), span)
    }

    /// The quoter and limit remover must settle after one pass on a sample
    /// that exercises a reserved word, a qualified name and a literal.
    fn self_check(&self) -> SqlPrepResult<()> {
        let sample = self.dialect.reserved_words().next().unwrap_or("order");
        let sql = format!("SELECT t.{sample}, 'x' FROM t LIMIT 5");

        let quoted = self.quote(&sql);
        if self.quote(&quoted.sql).sql != quoted.sql || quoted.report.is_empty() {
            return Err(SqlPrepError::dialect(
                &self.dialect.name,
                format!("quoting '{sample}' does not round-trip"),
            ));
        }

        let stripped = self.remove_limit(&quoted.sql);
        if stripped.len() >= quoted.sql.len() || self.remove_limit(&stripped) != stripped {
            return Err(SqlPrepError::dialect(
                &self.dialect.name,
                "LIMIT removal does not settle on the sample statement",
            ));
        }
        Ok(())
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn clean_options(&self) -> &CleanOptions {
        &self.clean
    }

    /// Recover one executable statement from raw model output.
    pub fn clean(&self, raw: &str) -> String {
        let _guard = self.span.enter();
        clean_result(raw, &self.clean, &self.dialect.lex)
    }

    /// Drop the outermost `LIMIT` clause.
    pub fn remove_limit(&self, sql: &str) -> String {
        let _guard = self.span.enter();
        limit::remove_limit(sql, &self.dialect.lex)
    }

    /// Quote identifiers, returning the rewritten SQL and a one-line report.
    pub fn add_quotes(&self, sql: &str) -> (String, String) {
        let quoted = self.quote(sql);
        let report = quoted.report.to_string();
        (quoted.sql, report)
    }

    /// Like [`Transforms::add_quotes`] with the structured report.
    pub fn quote(&self, sql: &str) -> Quoted {
        let _guard = self.span.enter();
        quote_identifiers(sql, &self.dialect)
    }

    /// Clean, then quote, then drop the limit when preparing a dry run.
    pub fn prepare(&self, raw: &str, dry_run: bool) -> Prepared {
        let cleaned = self.clean(raw);
        let (sql, report) = self.add_quotes(&cleaned);
        let sql = if dry_run { self.remove_limit(&sql) } else { sql };
        debug!(parent: &self.span, dry_run, quoted = !report.is_empty(), "prepared statement");
        Prepared { sql, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::CaseFolding;
    use pretty_assertions::assert_eq;

    fn transforms(dialect: Dialect) -> Transforms {
        Transforms::init(dialect, CleanOptions::default(), Span::none()).unwrap()
    }

    #[test]
    fn test_every_preset_initializes() {
        for name in ["ansi", "postgres", "mysql", "sqlite", "bigquery", "snowflake", "mssql"] {
            let dialect = Dialect::preset(name).unwrap();
            assert!(Transforms::init(dialect, CleanOptions::default(), Span::none()).is_ok());
        }
    }

    #[test]
    fn test_init_rejects_unusable_dialect() {
        let dialect = Dialect::ansi().with_quote_char('\'');
        let err = Transforms::init(dialect, CleanOptions::default(), Span::none()).unwrap_err();
        assert!(matches!(err, SqlPrepError::Dialect { .. }));
    }

    #[test]
    fn test_transforms_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Transforms>();
    }

    #[test]
    fn test_prepare_pipeline() {
        let t = transforms(Dialect::ansi());
        let raw = "Here you go:\n```sql\nSELECT order, amount\nFROM sales\nLIMIT 10;\n```";

        assert_eq!(
            t.prepare(raw, false),
            Prepared {
                sql: "SELECT \"order\", amount FROM sales LIMIT 10".to_string(),
                report: "quoted 'order' (reserved word)".to_string(),
            }
        );
        assert_eq!(
            t.prepare(raw, true).sql,
            "SELECT \"order\", amount FROM sales"
        );
    }

    #[test]
    fn test_add_quotes_with_case_folding() {
        let t = transforms(Dialect::postgres().with_case_folding(CaseFolding::Lower));
        let (sql, report) = t.add_quotes("SELECT OrderId FROM sales");
        assert_eq!(sql, "SELECT \"OrderId\" FROM sales");
        assert_eq!(report, "quoted 'OrderId' (case-sensitive)");
    }

    #[test]
    fn test_empty_input_stays_empty() {
        let t = Transforms::default();
        assert_eq!(t.prepare("", true), Prepared::default());
    }
}
