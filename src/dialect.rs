//! SQL dialect rules used by the lexer and the identifier quoter.
//!
//! A [`Dialect`] fixes how identifiers are delimited and escaped, which
//! words are reserved, whether unquoted identifiers fold case, and which
//! lexical extensions (backslash escapes, dollar strings, `#` comments,
//! bracket identifiers) are recognized.
//!
//! | Preset      | Delimiters  | Embedded delimiter | Extras                      |
//! |-------------|-------------|--------------------|-----------------------------|
//! | `ansi`      | double quote| doubled            |                             |
//! | `postgres`  | double quote| doubled            | dollar strings              |
//! | `mysql`     | backtick    | doubled            | backslash escapes, `#`      |
//! | `sqlite`    | double quote| doubled            |                             |
//! | `bigquery`  | backtick    | backslash          | backslash escapes, `#`      |
//! | `snowflake` | double quote| doubled            | dollar strings              |
//! | `mssql`     | brackets    | doubled `]`        | bracket identifiers         |
//!
//! No preset folds case by default; enable it per deployment with
//! [`Dialect::with_case_folding`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{SqlPrepError, SqlPrepResult};
use crate::lexer::LexOptions;

/// Names accepted by [`Dialect::preset`].
pub const PRESETS: &str = "ansi, postgres, mysql, sqlite, bigquery, snowflake, mssql";

/// Words that must be quoted when used as identifiers in every preset.
const ANSI_RESERVED: &[&str] = &[
    "order", "group", "user", "table", "select", "from", "where", "join",
    "left", "right", "inner", "outer", "on", "and", "or", "not", "null",
    "true", "false", "limit", "offset", "as", "in", "is", "like", "between",
    "having", "union", "all", "distinct", "case", "when", "then", "else", "end",
    "create", "alter", "drop", "insert", "update", "delete", "index", "key",
    "primary", "foreign", "references", "default", "constraint", "check",
    "cross", "full", "natural", "using", "intersect", "except", "with", "into",
    "values", "set", "fetch", "for", "window", "cast", "exists", "unique",
    "column", "grant",
];

const POSTGRES_RESERVED: &[&str] = &[
    "analyse", "analyze", "array", "asymmetric", "collate", "current_role",
    "do", "initially", "lateral", "only", "placing", "returning", "some",
    "symmetric", "to", "variadic", "verbose",
];

const MYSQL_RESERVED: &[&str] = &[
    "asc", "desc", "div", "groups", "interval", "keys", "mod", "range",
    "rank", "read", "regexp", "release", "rlike", "row_number", "rows",
    "schema", "usage", "xor",
];

const SQLITE_RESERVED: &[&str] = &[
    "abort", "autoincrement", "glob", "indexed", "isnull", "notnull", "regexp",
    "vacuum",
];

const BIGQUERY_RESERVED: &[&str] = &[
    "at", "contains", "cube", "define", "enum", "escape", "exclude", "extract",
    "following", "groups", "hash", "if", "ignore", "interval", "lookup",
    "merge", "new", "no", "nulls", "of", "over", "preceding", "proto",
    "qualify", "range", "recursive", "respect", "rollup", "rows", "some",
    "struct", "tablesample", "to", "treat", "unbounded", "within",
];

const SNOWFLAKE_RESERVED: &[&str] = &[
    "account", "connection", "database", "gscluster", "ilike", "increment",
    "issue", "lateral", "minus", "organization", "qualify", "regexp", "rlike",
    "row", "rows", "sample", "schema", "some", "start", "tablesample",
    "trigger", "try_cast", "view", "whenever",
];

const MSSQL_RESERVED: &[&str] = &[
    "backup", "browse", "bulk", "clustered", "file", "identity", "kill",
    "nonclustered", "open", "percent", "pivot", "proc", "procedure", "rule",
    "save", "schema", "top", "tran", "transaction", "unpivot", "view",
];

/// Non-reserved words the quoter treats as SQL syntax rather than names.
const KEYWORDS: &[&str] = &[
    "any", "asc", "at", "bigint", "boolean", "both", "by", "cascade", "char",
    "cube", "current", "current_date", "current_time", "current_timestamp",
    "date", "day", "decimal", "desc", "describe", "double", "epoch", "escape",
    "explain", "extract", "filter", "first", "float", "following", "grouping",
    "hour", "if", "ignore", "ilike", "int", "integer", "interval", "last",
    "lateral", "leading", "localtime", "localtimestamp", "materialized",
    "merge", "minute", "month", "no", "nulls", "numeric", "of", "only",
    "ordinality", "over", "partition", "precision", "preceding", "qualify",
    "quarter", "range", "real", "recursive", "replace", "respect", "restrict",
    "rollup", "row", "rows", "second", "session_user", "sets", "show",
    "similar", "smallint", "some", "temp", "temporary", "text", "time",
    "timestamp", "top", "trailing", "truncate", "unbounded", "unknown",
    "varchar", "varying", "view", "week", "within", "without", "year", "zone",
];

/// How a delimiter character inside a quoted identifier is escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeRule {
    /// `"a""b"`
    Double,
    /// `` `a\`b` ``
    Backslash,
}

/// Case folding applied by the target engine to unquoted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFolding {
    /// Unquoted identifiers keep their spelling, or the engine is
    /// case-insensitive.
    #[default]
    None,
    /// Unquoted identifiers fold to lower case (Postgres).
    Lower,
    /// Unquoted identifiers fold to upper case (Snowflake, Oracle).
    Upper,
}

/// Why an identifier had to be quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteReason {
    ReservedWord,
    LeadingDigit,
    SpecialCharacters,
    CaseSensitive,
    /// Identifier was quoted with another dialect's delimiter.
    ForeignQuotes,
}

impl std::fmt::Display for QuoteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            QuoteReason::ReservedWord => "reserved word",
            QuoteReason::LeadingDigit => "starts with a digit",
            QuoteReason::SpecialCharacters => "special characters",
            QuoteReason::CaseSensitive => "case-sensitive",
            QuoteReason::ForeignQuotes => "non-native quotes",
        };
        write!(f, "{}", text)
    }
}

/// Quoting and lexing rules for one target SQL engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub name: String,
    pub quote_open: char,
    pub quote_close: char,
    pub escape_rule: EscapeRule,
    pub case_folding: CaseFolding,
    /// Rewrite backtick or bracket quoted identifiers to this dialect's
    /// delimiters.
    pub requote_foreign: bool,
    pub lex: LexOptions,
    reserved: BTreeSet<String>,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::ansi()
    }
}

impl Dialect {
    fn base(name: &str, extra_reserved: &[&str]) -> Self {
        let reserved = ANSI_RESERVED
            .iter()
            .chain(extra_reserved)
            .map(|w| w.to_string())
            .collect();
        Self {
            name: name.to_string(),
            quote_open: '"',
            quote_close: '"',
            escape_rule: EscapeRule::Double,
            case_folding: CaseFolding::None,
            requote_foreign: false,
            lex: LexOptions::default(),
            reserved,
        }
    }

    /// Standard SQL: double quotes, doubled escapes.
    pub fn ansi() -> Self {
        Self::base("ansi", &[])
    }

    pub fn postgres() -> Self {
        let mut dialect = Self::base("postgres", POSTGRES_RESERVED);
        dialect.lex.dollar_strings = true;
        dialect
    }

    pub fn mysql() -> Self {
        let mut dialect = Self::base("mysql", MYSQL_RESERVED);
        dialect.quote_open = '`';
        dialect.quote_close = '`';
        dialect.lex.backslash_escapes = true;
        dialect.lex.hash_comments = true;
        dialect
    }

    pub fn sqlite() -> Self {
        Self::base("sqlite", SQLITE_RESERVED)
    }

    pub fn bigquery() -> Self {
        let mut dialect = Self::base("bigquery", BIGQUERY_RESERVED);
        dialect.quote_open = '`';
        dialect.quote_close = '`';
        dialect.escape_rule = EscapeRule::Backslash;
        dialect.lex.backslash_escapes = true;
        dialect.lex.backslash_identifiers = true;
        dialect.lex.hash_comments = true;
        dialect
    }

    pub fn snowflake() -> Self {
        let mut dialect = Self::base("snowflake", SNOWFLAKE_RESERVED);
        dialect.lex.dollar_strings = true;
        dialect
    }

    pub fn mssql() -> Self {
        let mut dialect = Self::base("mssql", MSSQL_RESERVED);
        dialect.quote_open = '[';
        dialect.quote_close = ']';
        dialect.lex.bracket_identifiers = true;
        dialect
    }

    /// Look up a preset by name (case-insensitive).
    pub fn preset(name: &str) -> SqlPrepResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ansi" | "generic" => Ok(Self::ansi()),
            "postgres" | "postgresql" => Ok(Self::postgres()),
            "mysql" | "mariadb" => Ok(Self::mysql()),
            "sqlite" => Ok(Self::sqlite()),
            "bigquery" => Ok(Self::bigquery()),
            "snowflake" => Ok(Self::snowflake()),
            "mssql" | "sqlserver" | "tsql" => Ok(Self::mssql()),
            _ => Err(SqlPrepError::UnknownDialect(name.to_string(), PRESETS)),
        }
    }

    /// Use `quote` as the identifier delimiter. `[` closes with `]`.
    pub fn with_quote_char(mut self, quote: char) -> Self {
        self.quote_open = quote;
        self.quote_close = if quote == '[' { ']' } else { quote };
        if quote == '[' {
            self.lex.bracket_identifiers = true;
        }
        self
    }

    pub fn with_escape_rule(mut self, rule: EscapeRule) -> Self {
        self.escape_rule = rule;
        self.lex.backslash_identifiers = rule == EscapeRule::Backslash;
        self
    }

    pub fn with_case_folding(mut self, folding: CaseFolding) -> Self {
        self.case_folding = folding;
        self
    }

    pub fn with_requote_foreign(mut self, requote: bool) -> Self {
        self.requote_foreign = requote;
        self
    }

    /// Add words to the reserved set.
    pub fn with_reserved_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reserved
            .extend(words.into_iter().map(|w| w.as_ref().to_ascii_lowercase()));
        self
    }

    /// Remove words from the reserved set.
    pub fn without_reserved_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            self.reserved.remove(&word.as_ref().to_ascii_lowercase());
        }
        self
    }

    pub fn reserved_words(&self) -> impl Iterator<Item = &str> {
        self.reserved.iter().map(String::as_str)
    }

    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved.contains(&word.to_ascii_lowercase())
    }

    /// Reserved word or known non-reserved keyword.
    pub fn is_keyword(&self, word: &str) -> bool {
        let lower = word.to_ascii_lowercase();
        self.reserved.contains(&lower) || KEYWORDS.contains(&lower.as_str())
    }

    /// Check that the quoter can round-trip its own output under this
    /// dialect's lexing rules.
    pub fn validate(&self) -> SqlPrepResult<()> {
        match (self.quote_open, self.quote_close) {
            ('"', '"') | ('`', '`') => {}
            ('[', ']') if self.lex.bracket_identifiers => {}
            (open, close) => {
                return Err(SqlPrepError::dialect(
                    &self.name,
                    format!("identifier delimiters {open}...{close} are not recognized by the lexer"),
                ));
            }
        }

        if self.escape_rule == EscapeRule::Backslash
            && !(self.quote_open == '`' && self.lex.backslash_identifiers)
        {
            return Err(SqlPrepError::dialect(
                &self.name,
                "backslash escapes require backtick quotes lexed with backslash escapes",
            ));
        }

        if self.reserved.is_empty() {
            return Err(SqlPrepError::dialect(&self.name, "reserved word set is empty"));
        }

        if let Some(bad) = self
            .reserved
            .iter()
            .find(|w| !w.chars().all(|c| c.is_alphanumeric() || c == '_'))
        {
            return Err(SqlPrepError::dialect(
                &self.name,
                format!("reserved word '{bad}' is not a bare word"),
            ));
        }

        Ok(())
    }

    /// Why `word`, used as an identifier, needs quoting under this dialect.
    pub fn quoting_reason(&self, word: &str) -> Option<QuoteReason> {
        if self.is_reserved(word) {
            return Some(QuoteReason::ReservedWord);
        }
        if word.chars().next().is_some_and(|c| c.is_numeric()) {
            return Some(QuoteReason::LeadingDigit);
        }
        if word.chars().any(|c| !c.is_alphanumeric() && c != '_') {
            return Some(QuoteReason::SpecialCharacters);
        }
        let folds_differently = match self.case_folding {
            CaseFolding::None => false,
            CaseFolding::Lower => word.chars().any(char::is_uppercase),
            CaseFolding::Upper => word.chars().any(char::is_lowercase),
        };
        folds_differently.then_some(QuoteReason::CaseSensitive)
    }

    /// Wrap `name` in this dialect's delimiters, escaping embedded ones.
    pub fn quote(&self, name: &str) -> String {
        let close = self.quote_close;
        let escaped = match self.escape_rule {
            EscapeRule::Double => name.replace(close, &format!("{close}{close}")),
            EscapeRule::Backslash => name
                .replace('\\', "\\\\")
                .replace(close, &format!("\\{close}")),
        };
        format!("{}{}{}", self.quote_open, escaped, close)
    }
}
