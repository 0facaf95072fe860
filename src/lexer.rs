//! SQL lexer using nom.
//!
//! Splits SQL-like text into classified spans without building a syntax
//! tree. The lexer never fails: every byte of the input belongs to exactly
//! one token, and concatenating the token texts reproduces the input.
//!
//! ```text
//! SELECT "a" FROM t -- note
//! ──┬─── ─┬─ ──┬─ ┬ ───┬───
//!   │     │    │  │    └── LineComment
//!   │     │    │  └── Word
//!   │     │    └── Word
//!   │     └── QuotedIdent
//!   └── Word
//! ```
//!
//! Literals, quoted identifiers and block comments that are never closed
//! run to the end of the input and are flagged with `terminated: false`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{anychar, char, digit0, digit1, one_of, satisfy},
    combinator::{consumed, opt, recognize, value},
    error::{Error, ErrorKind},
    sequence::{pair, tuple},
    IResult,
};

/// Classification of a token span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    LineComment,
    BlockComment,
    /// String literal, including prefixed (`E'..'`) and dollar-quoted forms.
    String,
    /// Identifier wrapped in `"`, `` ` `` or `[ ]`.
    QuotedIdent,
    Number,
    /// Bare identifier or keyword.
    Word,
    /// Bind parameter or variable: `$1`, `?`, `:name`, `@name`.
    Placeholder,
    Punct,
}

/// A classified span of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the token in the input.
    pub offset: usize,
    /// False for a literal, quoted identifier or block comment that reached
    /// end of input without its closing delimiter.
    pub terminated: bool,
}

impl<'a> Token<'a> {
    /// Byte offset one past the end of the token.
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    /// Whitespace or comment.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Case-insensitive keyword match on a bare word.
    pub fn is_word(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }
}

/// Dialect-dependent lexing switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexOptions {
    /// `\'` escapes a quote inside string literals (MySQL, BigQuery).
    pub backslash_escapes: bool,
    /// `` \` `` escapes a backtick inside quoted identifiers (BigQuery).
    pub backslash_identifiers: bool,
    /// `$tag$ ... $tag$` strings (Postgres).
    pub dollar_strings: bool,
    /// `# ...` line comments (MySQL).
    pub hash_comments: bool,
    /// `[name]` identifiers (SQL Server).
    pub bracket_identifiers: bool,
}

/// Tokenize `input`. Never fails.
pub fn tokenize<'a>(input: &'a str, opts: &LexOptions) -> Vec<Token<'a>> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        let (remaining, text, kind, terminated) =
            match consumed(|i: &'a str| next_token(i, opts))(rest) {
                Ok((remaining, (text, (kind, terminated)))) if !text.is_empty() => {
                    (remaining, text, kind, terminated)
                }
                // Never leave the loop without progress.
                _ => {
                    let len = rest.chars().next().map_or(1, char::len_utf8);
                    (&rest[len..], &rest[..len], TokenKind::Punct, true)
                }
            };

        tokens.push(Token {
            kind,
            text,
            offset,
            terminated,
        });
        rest = remaining;
    }

    tokens
}

/// True when any literal, quoted identifier or comment is left open.
pub fn has_unterminated(tokens: &[Token<'_>]) -> bool {
    tokens.iter().any(|t| !t.terminated)
}

/// Characters allowed after the first character of a bare word.
pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

type Lexed<'a> = IResult<&'a str, (TokenKind, bool)>;

fn next_token<'a>(input: &'a str, opts: &LexOptions) -> Lexed<'a> {
    alt((
        value(
            (TokenKind::Whitespace, true),
            take_while1(char::is_whitespace),
        ),
        line_comment,
        |i: &'a str| hash_comment(i, opts),
        block_comment,
        |i: &'a str| string_literal(i, opts),
        |i: &'a str| dollar_string(i, opts),
        |i: &'a str| quoted_ident(i, opts),
        number,
        value((TokenKind::Word, true), word),
        value((TokenKind::Placeholder, true), placeholder),
        value((TokenKind::Punct, true), punct),
    ))(input)
}

fn reject(input: &str) -> nom::Err<Error<&str>> {
    nom::Err::Error(Error::new(input, ErrorKind::Verify))
}

/// `-- ...` up to (not including) the newline.
fn line_comment(input: &str) -> Lexed<'_> {
    value(
        (TokenKind::LineComment, true),
        pair(tag("--"), take_till(|c| c == '\n')),
    )(input)
}

fn hash_comment<'a>(input: &'a str, opts: &LexOptions) -> Lexed<'a> {
    if !opts.hash_comments {
        return Err(reject(input));
    }
    value(
        (TokenKind::LineComment, true),
        pair(char('#'), take_till(|c| c == '\n')),
    )(input)
}

fn block_comment(input: &str) -> Lexed<'_> {
    let (body, _) = tag("/*")(input)?;
    match body.find("*/") {
        Some(pos) => Ok((&body[pos + 2..], (TokenKind::BlockComment, true))),
        None => Ok(("", (TokenKind::BlockComment, false))),
    }
}

/// Scan a delimited body up to its closing `close`. A doubled `close` is an
/// escaped delimiter. Returns the remaining input and whether it closed.
fn scan_delimited(body: &str, close: char, backslash: bool) -> (&str, bool) {
    let mut chars = body.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if backslash && c == '\\' {
            chars.next();
            continue;
        }
        if c == close {
            if chars.peek().is_some_and(|&(_, next)| next == close) {
                chars.next();
                continue;
            }
            return (&body[idx + c.len_utf8()..], true);
        }
    }
    ("", false)
}

/// `'...'`, optionally prefixed with `E`, `N`, `B`, `X` or `R`.
fn string_literal<'a>(input: &'a str, opts: &LexOptions) -> Lexed<'a> {
    let (body, (prefix, _)) = pair(opt(one_of("eEnNbBxXrR")), char('\''))(input)?;
    let backslash = match prefix {
        Some('e' | 'E') => true,
        Some('r' | 'R') => false,
        _ => opts.backslash_escapes,
    };
    let (rest, terminated) = scan_delimited(body, '\'', backslash);
    Ok((rest, (TokenKind::String, terminated)))
}

/// `$$ ... $$` or `$tag$ ... $tag$`.
fn dollar_string<'a>(input: &'a str, opts: &LexOptions) -> Lexed<'a> {
    if !opts.dollar_strings {
        return Err(reject(input));
    }
    let (body, delimiter) = recognize(tuple((
        char('$'),
        opt(word),
        char('$'),
    )))(input)?;
    match body.find(delimiter) {
        Some(pos) => Ok((&body[pos + delimiter.len()..], (TokenKind::String, true))),
        None => Ok(("", (TokenKind::String, false))),
    }
}

fn quoted_ident<'a>(input: &'a str, opts: &LexOptions) -> Lexed<'a> {
    let (body, open) = one_of("\"`[")(input)?;
    let close = match open {
        '[' if !opts.bracket_identifiers => return Err(reject(input)),
        '[' => ']',
        other => other,
    };
    let backslash = open == '`' && opts.backslash_identifiers;
    let (rest, terminated) = scan_delimited(body, close, backslash);
    Ok((rest, (TokenKind::QuotedIdent, terminated)))
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

/// Numeric literal. A digit-led run of identifier characters (`1st_half`)
/// is a word instead.
fn number(input: &str) -> Lexed<'_> {
    let (rest, _) = alt((
        recognize(tuple((digit1, opt(pair(char('.'), digit0)), opt(exponent)))),
        recognize(tuple((char('.'), digit1, opt(exponent)))),
    ))(input)?;

    if rest.starts_with(is_ident_char) && input.starts_with(|c: char| c.is_ascii_digit()) {
        let (rest, _) = take_while1(is_ident_char)(input)?;
        return Ok((rest, (TokenKind::Word, true)));
    }
    Ok((rest, (TokenKind::Number, true)))
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

fn placeholder(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(char('$'), digit1)),
        recognize(pair(alt((tag("@@"), tag("@"), tag(":"))), word)),
        recognize(char('?')),
    ))(input)
}

fn punct(input: &str) -> IResult<&str, &str> {
    alt((
        tag("::"),
        tag("||"),
        tag("<="),
        tag(">="),
        tag("<>"),
        tag("!="),
        tag("->>"),
        tag("->"),
        tag("=>"),
        recognize(anychar),
    ))(input)
}
