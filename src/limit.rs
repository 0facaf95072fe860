//! Top-level `LIMIT` removal for dry runs.
//!
//! Grammar of the removed clause:
//!
//! ```text
//! LIMIT <operand> [, <operand>] [OFFSET <operand> [ROW | ROWS]]
//!
//! operand := number | placeholder | ALL | NULL | ( ... )
//! ```
//!
//! A clause counts only at parenthesis depth zero and never inside a
//! literal or comment, and it must be followed by the end of the statement,
//! a `;` or a keyword that can follow `LIMIT` (`FOR UPDATE`, `UNION`, ...).
//! Anything else (open literals, unbalanced parentheses, an operand that
//! continues as an expression, more than one top-level clause) leaves the
//! input untouched.

use tracing::debug;

use crate::lexer::{LexOptions, Token, TokenKind, has_unterminated, is_ident_char, tokenize};

/// Keywords allowed right after a removable clause.
const CLAUSE_FOLLOWERS: &[&str] = &[
    "FOR",
    "FETCH",
    "UNION",
    "INTERSECT",
    "EXCEPT",
    "MINUS",
    "INTO",
    "RETURNING",
    "LOCK",
    "SETTINGS",
];

/// Token index range (inclusive) of one `LIMIT ... [OFFSET ...]` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clause {
    first: usize,
    last: usize,
}

/// Remove the last top-level `LIMIT` clause from `sql`, together with the
/// whitespace before it. Returns the input unchanged when there is none or
/// when the statement cannot be scanned unambiguously.
pub fn remove_limit(sql: &str, opts: &LexOptions) -> String {
    match strip_clause(sql, opts) {
        Some(stripped) => stripped,
        None => sql.to_string(),
    }
}

fn strip_clause(sql: &str, opts: &LexOptions) -> Option<String> {
    let tokens = tokenize(sql, opts);
    if has_unterminated(&tokens) {
        debug!("limit removal skipped: unterminated literal or comment");
        return None;
    }

    let clauses = top_level_clauses(&tokens)?;
    if clauses.iter().any(Option::is_none) {
        debug!("limit removal skipped: LIMIT not followed by a plain operand");
        return None;
    }
    let clause = (*clauses.last()?)?;
    let stripped = splice(sql, &tokens, clause);

    // Whatever remains must be limit-free, otherwise the statement had
    // competing clauses and we cannot tell which one bounds the result.
    let rescanned = tokenize(&stripped, opts);
    match top_level_clauses(&rescanned) {
        Some(rest) if rest.is_empty() => {
            debug!(removed = sql.len() - stripped.len(), "removed LIMIT clause");
            Some(stripped)
        }
        _ => {
            debug!("limit removal skipped: ambiguous LIMIT clauses");
            None
        }
    }
}

/// Every unqualified `LIMIT` at depth zero, `None` entries marking the ones
/// that do not form a removable clause. `None` overall when the parentheses
/// do not balance.
fn top_level_clauses(tokens: &[Token<'_>]) -> Option<Vec<Option<Clause>>> {
    let significant: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_trivia())
        .map(|(i, _)| i)
        .collect();

    let mut depth = 0usize;
    let mut clauses = Vec::new();

    for (pos, &idx) in significant.iter().enumerate() {
        let token = &tokens[idx];
        if token.is_punct("(") {
            depth += 1;
        } else if token.is_punct(")") {
            depth = depth.checked_sub(1)?;
        } else if depth == 0 && token.is_word("LIMIT") {
            let qualified = pos
                .checked_sub(1)
                .is_some_and(|p| tokens[significant[p]].is_punct("."));
            if qualified {
                continue;
            }
            clauses.push(clause_end(tokens, &significant, pos).map(|end| Clause {
                first: idx,
                last: significant[end],
            }));
        }
    }

    (depth == 0).then_some(clauses)
}

/// Position (in `significant`) of the last token of the clause whose
/// `LIMIT` keyword sits at `pos`.
fn clause_end(tokens: &[Token<'_>], significant: &[usize], pos: usize) -> Option<usize> {
    let at = |p: usize| significant.get(p).map(|&i| &tokens[i]);

    let mut end = operand_end(tokens, significant, pos + 1)?;

    // MySQL `LIMIT offset, count`
    if at(end + 1).is_some_and(|t| t.is_punct(",")) {
        end = operand_end(tokens, significant, end + 2)?;
    }

    if at(end + 1).is_some_and(|t| t.is_word("OFFSET")) {
        end = operand_end(tokens, significant, end + 2)?;
        if at(end + 1).is_some_and(|t| t.is_word("ROW") || t.is_word("ROWS")) {
            end += 1;
        }
    }

    match at(end + 1) {
        None => Some(end),
        Some(next) if next.is_punct(";") => Some(end),
        Some(next) if CLAUSE_FOLLOWERS.iter().any(|kw| next.is_word(kw)) => Some(end),
        Some(_) => None,
    }
}

/// Position of the last token of the operand starting at `pos`.
fn operand_end(tokens: &[Token<'_>], significant: &[usize], pos: usize) -> Option<usize> {
    let token = &tokens[*significant.get(pos)?];
    match token.kind {
        TokenKind::Number | TokenKind::Placeholder => Some(pos),
        TokenKind::Word if token.is_word("ALL") || token.is_word("NULL") => Some(pos),
        TokenKind::Punct if token.is_punct("(") => {
            let mut depth = 0usize;
            for (offset, &idx) in significant[pos..].iter().enumerate() {
                let t = &tokens[idx];
                if t.is_punct("(") {
                    depth += 1;
                } else if t.is_punct(")") {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos + offset);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

/// Cut the clause out of `sql`, taking the whitespace before it along.
fn splice(sql: &str, tokens: &[Token<'_>], clause: Clause) -> String {
    let mut first = clause.first;
    while first > 0 && tokens[first - 1].kind == TokenKind::Whitespace {
        first -= 1;
    }
    // The newline ending a line comment has to stay.
    if first > 0 && tokens[first - 1].kind == TokenKind::LineComment {
        first = clause.first;
    }

    let head = &sql[..tokens[first].offset];
    let tail = &sql[tokens[clause.last].end()..];

    let mut out = String::with_capacity(head.len() + tail.len() + 1);
    out.push_str(head);
    if head.ends_with(is_ident_char) && tail.starts_with(is_ident_char) {
        out.push(' ');
    }
    out.push_str(tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strip(sql: &str) -> String {
        remove_limit(sql, &LexOptions::default())
    }

    #[test]
    fn test_outer_limit_only() {
        assert_eq!(
            strip("SELECT * FROM (SELECT a FROM t LIMIT 5) x LIMIT 10"),
            "SELECT * FROM (SELECT a FROM t LIMIT 5) x"
        );
    }

    #[test]
    fn test_no_limit_is_identity() {
        assert_eq!(strip("SELECT a FROM t"), "SELECT a FROM t");
        assert_eq!(strip(""), "");
    }

    #[test]
    fn test_limit_with_offset() {
        assert_eq!(strip("SELECT a FROM t LIMIT 10 OFFSET 20"), "SELECT a FROM t");
        assert_eq!(strip("SELECT a FROM t limit 10 offset 20 rows"), "SELECT a FROM t");
    }

    #[test]
    fn test_mysql_offset_count() {
        assert_eq!(strip("SELECT a FROM t LIMIT 5, 10"), "SELECT a FROM t");
    }

    #[test]
    fn test_placeholder_all_and_subquery_operands() {
        assert_eq!(strip("SELECT a FROM t LIMIT $1"), "SELECT a FROM t");
        assert_eq!(strip("SELECT a FROM t LIMIT ?"), "SELECT a FROM t");
        assert_eq!(strip("SELECT a FROM t LIMIT ALL"), "SELECT a FROM t");
        assert_eq!(
            strip("SELECT a FROM t LIMIT (SELECT n FROM cfg)"),
            "SELECT a FROM t"
        );
    }

    #[test]
    fn test_trailing_content_is_kept() {
        assert_eq!(strip("SELECT a FROM t LIMIT 10;"), "SELECT a FROM t;");
        assert_eq!(
            strip("SELECT a FROM t\nLIMIT 10\nFOR UPDATE"),
            "SELECT a FROM t\nFOR UPDATE"
        );
        assert_eq!(
            strip("SELECT a FROM t LIMIT 10 -- first page"),
            "SELECT a FROM t -- first page"
        );
    }

    #[test]
    fn test_line_comment_before_limit() {
        assert_eq!(
            strip("SELECT a FROM t -- all rows\nLIMIT 10;"),
            "SELECT a FROM t -- all rows\n;"
        );
    }

    #[test]
    fn test_words_are_not_glued() {
        assert_eq!(
            strip("SELECT a FROM t LIMIT(5)FOR UPDATE"),
            "SELECT a FROM t FOR UPDATE"
        );
    }

    #[test]
    fn test_limit_inside_literals_and_names() {
        for sql in [
            "SELECT 'LIMIT 10' FROM t",
            "SELECT limit_count FROM t",
            "SELECT t.limit FROM t",
            "SELECT \"LIMIT\" FROM t",
            "SELECT a FROM t -- LIMIT 10",
            "SELECT a FROM t /* LIMIT 10 */",
        ] {
            assert_eq!(strip(sql), sql);
        }
    }

    #[test]
    fn test_incomplete_clause_unchanged() {
        assert_eq!(strip("SELECT a FROM t LIMIT"), "SELECT a FROM t LIMIT");
        assert_eq!(strip("SELECT a FROM t LIMIT x"), "SELECT a FROM t LIMIT x");
    }

    #[test]
    fn test_expression_operands_unchanged() {
        for sql in [
            "SELECT a FROM t LIMIT 10 + 5",
            "SELECT a FROM t LIMIT 10 OFFSET 10 * 2",
            "SELECT a FROM t LIMIT 5, 10 - 1",
            "SELECT a FROM t LIMIT (5) * 2",
        ] {
            assert_eq!(strip(sql), sql);
        }

        let postgres = LexOptions {
            dollar_strings: true,
            ..LexOptions::default()
        };
        assert_eq!(
            remove_limit("SELECT a FROM t LIMIT $1::int", &postgres),
            "SELECT a FROM t LIMIT $1::int"
        );
        assert_eq!(
            remove_limit("SELECT a FROM t LIMIT $1 OFFSET $2", &postgres),
            "SELECT a FROM t"
        );
    }

    #[test]
    fn test_stray_limit_blocks_removal() {
        let sql = "SELECT a FROM t LIMIT 1 + 1 UNION SELECT b FROM u LIMIT 2";
        assert_eq!(strip(sql), sql);
    }

    #[test]
    fn test_ambiguous_input_unchanged() {
        for sql in [
            "SELECT a FROM t LIMIT 10 WHERE b = 'open",
            "SELECT (a FROM t LIMIT 10",
            "SELECT a) FROM t LIMIT 10",
            "SELECT a FROM t LIMIT 1 UNION SELECT b FROM u LIMIT 2",
        ] {
            assert_eq!(strip(sql), sql);
        }
    }

    #[test]
    fn test_idempotent() {
        for sql in [
            "SELECT * FROM (SELECT a FROM t LIMIT 5) x LIMIT 10",
            "SELECT a FROM t LIMIT 10 OFFSET 5",
            "SELECT a FROM t LIMIT /* c */ LIMIT 5 5",
            "LIMIT 1",
        ] {
            let once = strip(sql);
            assert_eq!(strip(&once), once);
        }
    }
}
