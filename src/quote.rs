//! Identifier quoting.
//!
//! Walks the token stream once, classifies each bare word as syntax or as a
//! name, and wraps names that the dialect cannot accept unquoted. Only bare
//! words (and, with `requote_foreign`, foreign-quoted identifiers) are ever
//! rewritten; literals and comments pass through untouched.
//!
//! Classification is positional, not grammatical:
//!
//! ```text
//! SELECT order FROM sales ORDER BY 1
//!        ──┬──             ──┬──
//!          │                 └── previous token is a name: keyword
//!          └── between SELECT and FROM: identifier
//! ```

use serde::Serialize;
use tracing::debug;

use crate::dialect::{Dialect, QuoteReason};
use crate::lexer::{Token, TokenKind, tokenize};

/// Keywords after which an operand (column, table, expression) is expected.
const EXPECTS_OPERAND: &[&str] = &[
    "SELECT", "DISTINCT", "WHERE", "AND", "OR", "NOT", "ON", "BY", "HAVING",
    "WHEN", "THEN", "ELSE", "SET", "RETURNING", "LIKE", "ILIKE", "BETWEEN",
    "WITH", "RECURSIVE", "FROM", "JOIN", "UPDATE", "INTO", "TABLE",
];

/// Punctuation after which an operand is expected.
const EXPECTS_OPERAND_PUNCT: &[&str] = &[
    ",", "(", "=", "<", ">", "<=", ">=", "<>", "!=", "+", "-", "*", "/", "%", "||",
];

/// Keywords that may directly follow an operand.
const ENDS_OPERAND: &[&str] = &[
    "FROM", "WHERE", "AS", "ASC", "DESC", "IS", "IN", "NOT", "LIKE", "ILIKE",
    "BETWEEN", "AND", "OR", "JOIN", "LEFT", "RIGHT", "INNER", "OUTER", "FULL",
    "CROSS", "NATURAL", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "UNION",
    "INTERSECT", "EXCEPT", "THEN", "ELSE", "END", "USING", "SET", "NULLS",
    "WINDOW", "FETCH", "FOR", "RETURNING", "QUALIFY",
];

/// Punctuation that may directly follow an operand.
const ENDS_OPERAND_PUNCT: &[&str] = &[
    ",", ")", ";", "=", "<", ">", "<=", ">=", "<>", "!=", "+", "-", "*", "/", "%",
    "||", "::", "]",
];

/// Keywords naming a table that follows.
const TABLE_POSITION: &[&str] = &["FROM", "JOIN", "UPDATE"];

/// Keywords that always precede a table name, even one followed by `(`.
const TABLE_DEFINITION: &[&str] = &["INTO", "TABLE"];

/// Modifiers that may sit in a table position without being a table.
const TABLE_MODIFIERS: &[&str] = &["only", "lateral", "unnest"];

/// Keyword-spelled values that are never names.
const LITERALS: &[&str] = &[
    "null", "true", "false", "default", "all", "unknown", "current_date",
    "current_time", "current_timestamp", "current_role", "session_user",
    "localtime", "localtimestamp",
];

/// Functions whose argument list contains a type name after `AS`.
const CAST_FUNCTIONS: &[&str] = &["cast", "try_cast", "safe_cast"];

fn contains_ci(list: &[&str], word: &str) -> bool {
    list.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// One quoted identifier in a [`QuoteReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteChange {
    pub identifier: String,
    pub reason: QuoteReason,
}

impl std::fmt::Display for QuoteChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.reason {
            QuoteReason::ForeignQuotes => "requoted",
            _ => "quoted",
        };
        write!(f, "{} '{}' ({})", verb, self.identifier, self.reason)
    }
}

/// Identifiers changed by the quoter, in order of first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteReport {
    pub changes: Vec<QuoteChange>,
}

impl QuoteReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn record(&mut self, identifier: &str, reason: QuoteReason) {
        if !self.changes.iter().any(|c| c.identifier == identifier) {
            self.changes.push(QuoteChange {
                identifier: identifier.to_string(),
                reason,
            });
        }
    }
}

impl std::fmt::Display for QuoteReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", change)?;
        }
        Ok(())
    }
}

/// Rewritten SQL plus what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quoted {
    pub sql: String,
    pub report: QuoteReport,
}

/// What the previous significant token left the scanner expecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role<'a> {
    Start,
    Operand,
    Keyword(&'a str),
    Punct(&'a str),
}

impl Role<'_> {
    fn expects_operand(&self) -> bool {
        match self {
            Role::Keyword(k) => contains_ci(EXPECTS_OPERAND, k),
            Role::Punct(p) => EXPECTS_OPERAND_PUNCT.contains(p),
            Role::Start | Role::Operand => false,
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Role::Keyword(k) if k.eq_ignore_ascii_case(keyword))
    }

    fn is_keyword_in(&self, list: &[&str]) -> bool {
        matches!(self, Role::Keyword(k) if contains_ci(list, k))
    }
}

/// What opened the innermost parenthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paren {
    Cast,
    Extract,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Identifier,
    Keyword,
    /// Function name, type name or date part: left alone, acts as an operand.
    Opaque,
}

struct Context<'t, 'a> {
    prev: Role<'a>,
    next: Option<&'t Token<'a>>,
    paren: Option<Paren>,
    after_open_paren: bool,
}

impl Context<'_, '_> {
    fn next_is_punct(&self, punct: &str) -> bool {
        self.next.is_some_and(|t| t.is_punct(punct))
    }

    fn next_ends_operand(&self) -> bool {
        match self.next {
            None => true,
            Some(t) => match t.kind {
                TokenKind::Punct => ENDS_OPERAND_PUNCT.contains(&t.text),
                TokenKind::Word => contains_ci(ENDS_OPERAND, t.text),
                _ => false,
            },
        }
    }
}

fn classify(word: &str, ctx: &Context<'_, '_>, dialect: &Dialect) -> Class {
    if matches!(ctx.prev, Role::Punct(".")) || ctx.next_is_punct(".") {
        return Class::Identifier;
    }
    if matches!(ctx.prev, Role::Punct("::")) {
        return Class::Opaque;
    }
    if ctx.paren == Some(Paren::Cast) && ctx.prev.is_keyword("AS") {
        return Class::Opaque;
    }
    if ctx.paren == Some(Paren::Extract) && ctx.after_open_paren {
        return Class::Opaque;
    }
    // `IF [NOT] EXISTS` guards on DDL.
    if word.eq_ignore_ascii_case("if")
        && ctx.next.is_some_and(|t| t.is_word("NOT") || t.is_word("EXISTS"))
    {
        return Class::Keyword;
    }
    if ctx.prev.is_keyword_in(TABLE_DEFINITION) && !word.eq_ignore_ascii_case("if") {
        return Class::Identifier;
    }
    if ctx.next_is_punct("(") {
        return Class::Opaque;
    }
    if !dialect.is_keyword(word) {
        return Class::Identifier;
    }
    if contains_ci(LITERALS, word) {
        return Class::Keyword;
    }
    if ctx.prev.is_keyword("AS") && !word.eq_ignore_ascii_case("not") {
        return Class::Identifier;
    }
    if ctx.prev.is_keyword_in(TABLE_POSITION) && !contains_ci(TABLE_MODIFIERS, word) {
        let alias_follows = ctx.next.is_some_and(|t| {
            (t.kind == TokenKind::Word && !dialect.is_keyword(t.text))
                || t.is_word("ON")
                || t.kind == TokenKind::QuotedIdent
        });
        if alias_follows || ctx.next_ends_operand() {
            return Class::Identifier;
        }
    }
    if ctx.prev.expects_operand() && ctx.next_ends_operand() {
        return Class::Identifier;
    }
    Class::Keyword
}

/// True when wrapping `tokens[idx]` in delimiters would merge it with an
/// adjacent token that uses the same delimiter.
fn would_fuse(tokens: &[Token<'_>], idx: usize, dialect: &Dialect) -> bool {
    let before = idx
        .checked_sub(1)
        .and_then(|i| tokens.get(i))
        .is_some_and(|t| t.text.ends_with(dialect.quote_close));
    let after = tokens
        .get(idx + 1)
        .is_some_and(|t| t.text.starts_with(dialect.quote_open));
    before || after
}

/// Unwrapped name of a backtick or bracket quoted identifier that is not
/// in this dialect's delimiters.
fn foreign_name(token: &Token<'_>, dialect: &Dialect) -> Option<String> {
    let open = token.text.chars().next()?;
    let close = match open {
        '`' => '`',
        '[' => ']',
        _ => return None,
    };
    if open == dialect.quote_open || !token.terminated || token.text.len() < 2 {
        return None;
    }
    let inner = &token.text[1..token.text.len() - 1];
    Some(inner.replace(&format!("{close}{close}"), &close.to_string()))
}

/// Quote every identifier in `sql` that `dialect` cannot accept bare.
pub fn quote_identifiers(sql: &str, dialect: &Dialect) -> Quoted {
    let tokens = tokenize(sql, &dialect.lex);
    let significant: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_trivia())
        .map(|(i, _)| i)
        .collect();

    let mut replacements: Vec<(usize, String)> = Vec::new();
    let mut report = QuoteReport::default();
    let mut prev = Role::Start;
    let mut parens: Vec<Paren> = Vec::new();

    for (pos, &idx) in significant.iter().enumerate() {
        let token = &tokens[idx];
        let before = pos.checked_sub(1).map(|p| &tokens[significant[p]]);

        prev = match token.kind {
            TokenKind::Word => {
                let ctx = Context {
                    prev,
                    next: significant.get(pos + 1).map(|&i| &tokens[i]),
                    paren: parens.last().copied(),
                    after_open_paren: before.is_some_and(|t| t.is_punct("(")),
                };
                match classify(token.text, &ctx, dialect) {
                    Class::Identifier => {
                        if let Some(reason) = dialect.quoting_reason(token.text)
                            && !would_fuse(&tokens, idx, dialect)
                        {
                            replacements.push((idx, dialect.quote(token.text)));
                            report.record(token.text, reason);
                        }
                        Role::Operand
                    }
                    Class::Keyword => Role::Keyword(token.text),
                    Class::Opaque => Role::Operand,
                }
            }
            TokenKind::QuotedIdent => {
                if dialect.requote_foreign
                    && let Some(name) = foreign_name(token, dialect)
                {
                    replacements.push((idx, dialect.quote(&name)));
                    report.record(&name, QuoteReason::ForeignQuotes);
                }
                Role::Operand
            }
            TokenKind::Punct => match token.text {
                "(" => {
                    let owner = match before {
                        Some(t) if t.kind == TokenKind::Word && contains_ci(CAST_FUNCTIONS, t.text) => {
                            Paren::Cast
                        }
                        Some(t) if t.is_word("EXTRACT") => Paren::Extract,
                        _ => Paren::Other,
                    };
                    parens.push(owner);
                    Role::Punct("(")
                }
                ")" => {
                    parens.pop();
                    Role::Operand
                }
                ";" => {
                    parens.clear();
                    Role::Start
                }
                other => Role::Punct(other),
            },
            _ => Role::Operand,
        };
    }

    if replacements.is_empty() {
        return Quoted {
            sql: sql.to_string(),
            report,
        };
    }

    let mut out = String::with_capacity(sql.len() + replacements.len() * 2);
    let mut pending = replacements.iter().peekable();
    for (idx, token) in tokens.iter().enumerate() {
        match pending.peek() {
            Some((at, text)) if *at == idx => {
                out.push_str(text);
                pending.next();
            }
            _ => out.push_str(token.text),
        }
    }

    debug!(
        dialect = %dialect.name,
        quoted = report.changes.len(),
        "quoted identifiers"
    );

    Quoted { sql: out, report }
}
