//! Arbitrary input must never panic, and every transform must settle
//! after one application.

use pretty_assertions::assert_eq;
use sqlprep::dialect::Dialect;
use sqlprep::prelude::*;
use tracing::Span;

const GARBAGE: &[&str] = &[
    "",
    " ",
    "\0\u{1}\u{7f}",
    "'",
    "\"",
    "`",
    "[",
    "```",
    "````sql",
    "'''",
    "\"\"\"",
    "((((",
    "))))",
    "LIMIT",
    "LIMIT LIMIT LIMIT",
    "--",
    "/*",
    "*/",
    "$$",
    "$tag$ unterminated",
    ";;;;",
    "SELECT 'a",
    "SELECT \"a",
    "SELECT `a",
    "SELECT [a",
    "SELECT a FROM t LIMIT (",
    "Ünïcödé ✓ 🦀 SELECT ß FROM 表 LIMIT ٣",
    "{\"sql\": 42}",
    "{\"sql\": \"SELECT 1\"",
    "E'\\' LIMIT 1",
    "#",
    "::::",
    "@@@@",
];

fn presets() -> Vec<Transforms> {
    ["ansi", "postgres", "mysql", "sqlite", "bigquery", "snowflake", "mssql"]
        .into_iter()
        .map(|name| {
            Transforms::init(
                Dialect::preset(name).unwrap(),
                CleanOptions::default(),
                Span::none(),
            )
            .unwrap()
        })
        .collect()
}

#[test]
fn test_garbage_never_panics() {
    for transforms in presets() {
        for input in GARBAGE {
            let cleaned = transforms.clean(input);
            assert!(!cleaned.contains("```"), "fence left in {cleaned:?}");
            assert!(!cleaned.ends_with(';'), "terminator left in {cleaned:?}");

            let _ = transforms.remove_limit(input);
            let _ = transforms.add_quotes(input);
            let _ = transforms.prepare(input, true);
        }
    }
}

#[test]
fn test_quoting_is_idempotent() {
    let statements = [
        "SELECT order, user FROM sales",
        "SELECT t.order, t.\"group\" FROM t JOIN user u ON u.id = t.user_id",
        "INSERT INTO order (select, from) VALUES (1, 2)",
        "SELECT CAST(order AS integer), EXTRACT(year FROM created) FROM t",
        "SELECT `order`, [group] FROM t",
        "SELECT 1st, cost$ FROM t",
        "SELECT OrderId FROM Sales",
    ];

    for transforms in presets() {
        for sql in statements {
            let (once, _) = transforms.add_quotes(sql);
            let (twice, report) = transforms.add_quotes(&once);
            assert_eq!(twice, once, "dialect {}", transforms.dialect().name);
            assert!(report.is_empty(), "second pass reported {report:?}");
        }
    }
}

#[test]
fn test_limit_removal_is_idempotent() {
    let statements = [
        "SELECT a FROM t LIMIT 10",
        "SELECT a FROM t LIMIT 10 OFFSET 5",
        "SELECT a FROM t LIMIT 5, 10",
        "SELECT * FROM (SELECT a FROM t LIMIT 5) x LIMIT 10",
        "SELECT a FROM t LIMIT 1 UNION SELECT a FROM u LIMIT 2",
        "SELECT a FROM t -- c\nLIMIT 3",
    ];

    for transforms in presets() {
        for sql in statements {
            let once = transforms.remove_limit(sql);
            assert_eq!(transforms.remove_limit(&once), once);
        }
    }
}

#[test]
fn test_limit_expressions_are_never_cut() {
    let statements = [
        "SELECT a FROM t LIMIT 10 + 5",
        "SELECT a FROM t LIMIT 10 OFFSET 10 * 2",
        "SELECT a FROM t LIMIT (5) - 1",
        "SELECT a FROM t LIMIT ? || 'x'",
    ];

    for transforms in presets() {
        for sql in statements {
            assert_eq!(transforms.remove_limit(sql), sql, "dialect {}", transforms.dialect().name);
        }
    }
}

#[test]
fn test_continuation_lines_are_not_prose() {
    let raws = [
        ("SELECT SUM(amount),\nregion FROM sales GROUP BY region", "SELECT SUM(amount), region FROM sales GROUP BY region"),
        ("SELECT id,\n  name AS label FROM products", "SELECT id, name AS label FROM products"),
        ("SELECT a FROM t WHERE x =\n  total_due", "SELECT a FROM t WHERE x = total_due"),
    ];

    for transforms in presets() {
        for (raw, expected) in raws {
            assert_eq!(transforms.clean(raw), expected);
        }
    }
}

#[test]
fn test_clean_output_is_stable() {
    let raws = [
        "```sql\nSELECT a\nFROM t;\n```",
        "Answer: SELECT 1; SELECT 2;",
        "SELECT 'a;b'   FROM t",
    ];

    let transforms = Transforms::default();
    for raw in raws {
        let once = transforms.clean(raw);
        assert_eq!(transforms.clean(&once), once);
    }
}
