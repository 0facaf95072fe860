//! Recover one executable statement from model output.
//!
//! Model answers arrive wrapped in markdown fences, triple quotes, JSON
//! envelopes or surrounding prose. Cleaning peels those layers off, picks
//! a statement, and normalizes its whitespace without touching literals.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lexer::{LexOptions, Token, TokenKind, is_ident_char, tokenize};

/// Which statement to keep when the text holds several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementPolicy {
    #[default]
    First,
    Last,
    /// Exactly one statement, anything else cleans to empty.
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub statement_policy: StatementPolicy,
    pub collapse_whitespace: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            statement_policy: StatementPolicy::First,
            collapse_whitespace: true,
        }
    }
}

/// Code fence openers. Backtick fences count anywhere, the others only
/// at the start of a line.
static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)```|^[ \t]*(?:~~~|"""|''')"#).expect("fence pattern")
});

/// Info strings that name the fence language rather than start the code.
const FENCE_LANGUAGES: &[&str] = &[
    "sql", "postgresql", "postgres", "psql", "plpgsql", "mysql", "sqlite", "tsql", "mssql",
    "bigquery", "snowflake", "json", "text", "sh",
];

/// Keywords that can open a statement.
const STATEMENT_STARTERS: &[&str] = &[
    "SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "MERGE", "CREATE", "ALTER", "DROP",
    "TRUNCATE", "EXPLAIN", "VALUES", "SHOW", "DESCRIBE", "TABLE",
];

/// Keywords that can open a continuation line of a statement.
const CLAUSE_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "JOIN", "LEFT", "RIGHT", "INNER", "OUTER",
    "FULL", "CROSS", "NATURAL", "ON", "USING", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET",
    "FETCH", "UNION", "INTERSECT", "EXCEPT", "CASE", "WHEN", "THEN", "ELSE", "END", "AS", "WITH",
    "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "RETURNING", "DISTINCT", "BY", "ASC",
    "DESC", "NULLS", "WINDOW", "OVER", "PARTITION", "QUALIFY", "FOR", "LATERAL", "EXISTS", "IN",
    "IS", "BETWEEN", "LIKE", "ILIKE", "COUNT", "SUM", "AVG", "MIN", "MAX", "CAST", "COALESCE",
    "ROWS", "RANGE", "FILTER", "TOP",
];

/// Keywords after which a statement line cannot end.
const OPERAND_KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "FROM", "WHERE", "AND", "OR", "NOT", "JOIN", "ON", "USING", "BY",
    "HAVING", "AS", "SET", "INTO", "VALUES", "WHEN", "THEN", "ELSE", "CASE", "IN", "IS", "LIKE",
    "ILIKE", "BETWEEN", "UNION", "INTERSECT", "EXCEPT", "ALL", "WITH", "OVER", "LIMIT", "OFFSET",
];

/// Clean raw model output into a single statement.
///
/// Never fails: text with nothing usable cleans to the empty string. The
/// result never contains a backtick fence marker and has no trailing
/// statement terminator.
pub fn clean_result(raw: &str, opts: &CleanOptions, lex: &LexOptions) -> String {
    let fenced = extract_fenced(raw, lex);
    let body = fenced.unwrap_or(raw);

    let candidate = match sql_from_json(body) {
        Some(sql) => sql,
        None if fenced.is_some() => body.to_string(),
        None => strip_prose(body).unwrap_or_default(),
    };

    let statement = select_statement(&candidate, opts.statement_policy, lex);
    let statement = if opts.collapse_whitespace {
        collapse_whitespace(&statement, lex)
    } else {
        statement
    };

    // An unterminated literal can swallow the final `;`.
    let cleaned = strip_fence_markers(&statement, lex);
    let cleaned = cleaned.trim().trim_end_matches(';').trim_end().to_string();
    debug!(
        raw_len = raw.len(),
        cleaned_len = cleaned.len(),
        fenced = fenced.is_some(),
        "cleaned model output"
    );
    cleaned
}

/// Body of the first code fence, up to its closing marker or end of input.
/// Markers inside string literals of a statement do not count.
fn extract_fenced<'a>(raw: &'a str, lex: &LexOptions) -> Option<&'a str> {
    let open = FENCE_OPEN
        .find_iter(raw)
        .find(|m| !marker_in_statement_literal(raw, m.start(), lex))?;
    let marker = open.as_str().trim_start();
    let after = &raw[open.end()..];

    let (info, next_line) = match after.find('\n') {
        Some(nl) => (&after[..nl], &after[nl + 1..]),
        None => (after, ""),
    };
    let info = info.trim();

    let body = if info.is_empty() || is_language_tag(info) {
        next_line
    } else {
        let first = info.split_whitespace().next().unwrap_or_default();
        if FENCE_LANGUAGES.contains(&first.to_ascii_lowercase().as_str()) {
            let skip = after.len() - after.trim_start().len() + first.len();
            after[skip..].trim_start()
        } else {
            after
        }
    };

    let tokens = tokenize(body, lex);
    let close = body
        .match_indices(marker)
        .map(|(at, _)| at)
        .find(|&at| !in_literal(&tokens, at));
    Some(match close {
        Some(close) => &body[..close],
        None => body,
    })
}

/// Whether the fence marker at byte `at` sits inside a string literal on
/// a line that starts a statement. Prose lines are never lexed, their
/// apostrophes would open bogus literals.
fn marker_in_statement_literal(raw: &str, at: usize, lex: &LexOptions) -> bool {
    let start = raw[..at].rfind('\n').map_or(0, |nl| nl + 1);
    let end = raw[at..].find('\n').map_or(raw.len(), |nl| at + nl);
    let line = &raw[start..end];
    starts_statement(line) && in_literal(&tokenize(line, lex), at - start)
}

fn in_literal(tokens: &[Token<'_>], at: usize) -> bool {
    tokens.iter().any(|t| {
        t.kind == TokenKind::String && t.terminated && t.offset < at && at < t.end()
    })
}

/// Remove backtick fence markers everywhere except inside string literals.
fn strip_fence_markers(sql: &str, lex: &LexOptions) -> String {
    if !sql.contains("```") {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len());
    for token in tokenize(sql, lex) {
        match token.kind {
            TokenKind::String => out.push_str(token.text),
            _ => out.push_str(&token.text.replace("```", "")),
        }
    }
    out
}

/// A lone info-string word such as `sql` or `postgresql`, as opposed to
/// code that starts right after the fence.
fn is_language_tag(info: &str) -> bool {
    !info.contains(char::is_whitespace)
        && info
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.'))
        && !is_statement_starter(info)
}

/// The `sql` member of a JSON object payload.
fn sql_from_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    value.get("sql")?.as_str().map(str::to_string)
}

/// Drop prose before the first statement line and after the last one.
fn strip_prose(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let (first, offset) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| statement_start(line).map(|offset| (i, offset)))?;

    let mut kept = vec![&lines[first][offset..]];
    for line in &lines[first + 1..] {
        let continued = kept
            .iter()
            .rev()
            .find(|l| !l.trim().is_empty())
            .is_some_and(|prev| expects_continuation(prev));
        if !continued && looks_like_prose(line) {
            break;
        }
        kept.push(line);
    }
    Some(kept.join("\n"))
}

/// Byte offset where a statement begins on this line, either at the
/// start or after a `label:` prefix.
fn statement_start(line: &str) -> Option<usize> {
    let indent = line.len() - line.trim_start().len();
    let text = &line[indent..];
    if starts_statement(text) && !is_sentence(text) {
        return Some(indent);
    }

    let colon = line.find(':')?;
    let rest = &line[colon + 1..];
    let rest_trimmed = rest.trim_start();
    let skip = rest.len() - rest_trimmed.len();
    (skip > 0 && starts_statement(rest_trimmed)).then_some(colon + 1 + skip)
}

fn starts_statement(text: &str) -> bool {
    let text = text.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    is_statement_starter(leading_word(text))
}

fn is_statement_starter(word: &str) -> bool {
    keyword_cased(word) && STATEMENT_STARTERS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_clause_keyword(word: &str) -> bool {
    keyword_cased(word) && CLAUSE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// SQL keywords are written all upper or all lower. Capitalized words
/// ("Select the rows...") belong to prose.
fn keyword_cased(word: &str) -> bool {
    !word.is_empty()
        && (word.chars().all(|c| c.is_ascii_uppercase())
            || word.chars().all(|c| c.is_ascii_lowercase()))
}

fn leading_word(text: &str) -> &str {
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    &text[..end]
}

/// Ends like a sentence and has more than one word.
fn is_sentence(text: &str) -> bool {
    let text = text.trim_end();
    text.ends_with(['.', '!', '?', ':']) && text.split_whitespace().count() >= 2
}

/// A statement line that stops mid-expression: a trailing comma, an open
/// parenthesis, a binary operator or a keyword still waiting for its operand.
fn expects_continuation(line: &str) -> bool {
    let text = line.trim_end();
    if text.ends_with([',', '(', '=', '<', '>', '+', '-', '/', '%', '|']) {
        return true;
    }
    let last = text.rsplit(|c: char| !is_ident_char(c)).next().unwrap_or_default();
    keyword_cased(last) && OPERAND_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(last))
}

/// Natural-language line following the statement.
fn looks_like_prose(line: &str) -> bool {
    let text = line.trim();
    let first = leading_word(text);
    if first.is_empty() || !first.starts_with(char::is_alphabetic) || is_clause_keyword(first) {
        return false;
    }
    if is_sentence(text) {
        return true;
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    // Lower-case keywords only count on lines written in lower case,
    // prose is full of "by", "on" and "in".
    let lower_line = first.chars().all(|c| !c.is_uppercase());
    let has_keyword = words.iter().any(|w| {
        is_clause_keyword(w) && (lower_line || w.chars().all(|c| c.is_ascii_uppercase()))
    });
    !has_keyword
        && words.len() >= 4
        && words.iter().all(|w| {
            w.trim_end_matches(['.', '!', '?'])
                .chars()
                .all(char::is_alphabetic)
        })
}

/// Split on top-level terminators and keep one statement per `policy`.
fn select_statement(text: &str, policy: StatementPolicy, lex: &LexOptions) -> String {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;

    for token in tokenize(text, lex) {
        if token.is_punct(";") {
            if has_code {
                statements.push(&text[start..token.offset]);
            }
            start = token.end();
            has_code = false;
        } else if !token.is_trivia() {
            has_code = true;
        }
    }
    if has_code {
        statements.push(&text[start..]);
    }

    let chosen = match policy {
        StatementPolicy::First => statements.first(),
        StatementPolicy::Last => statements.last(),
        StatementPolicy::Single if statements.len() == 1 => statements.first(),
        StatementPolicy::Single => {
            debug!(count = statements.len(), "expected a single statement");
            None
        }
    };
    chosen.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Collapse whitespace runs outside literals to one space. A run that
/// ends a line comment becomes a newline so the comment stays closed.
pub fn collapse_whitespace(sql: &str, lex: &LexOptions) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut after_line_comment = false;

    for token in tokenize(sql, lex) {
        match token.kind {
            TokenKind::Whitespace if after_line_comment => out.push('\n'),
            TokenKind::Whitespace => out.push(' '),
            _ => out.push_str(token.text),
        }
        after_line_comment = token.kind == TokenKind::LineComment;
    }

    out.trim().to_string()
}
