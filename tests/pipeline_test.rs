use pretty_assertions::assert_eq;
use sqlprep::dialect::Dialect;
use sqlprep::prelude::*;
use sqlprep::{add_quotes, clean, remove_limit};
use tracing::Span;

#[test]
fn test_model_answer_end_to_end() {
    let raw = "Here is the query:\n```sql\nSELECT 1\n```\nLet me know if you need changes.";
    assert_eq!(clean(raw), "SELECT 1");
}

#[test]
fn test_reserved_word_column() {
    let (sql, report) = add_quotes("SELECT order FROM sales");
    assert_eq!(sql, "SELECT \"order\" FROM sales");
    assert_eq!(report, "quoted 'order' (reserved word)");
}

#[test]
fn test_no_quoting_needed() {
    let (sql, report) = add_quotes("SELECT id, amount FROM sales WHERE amount > 10");
    assert_eq!(sql, "SELECT id, amount FROM sales WHERE amount > 10");
    assert!(report.is_empty());
}

#[test]
fn test_outer_limit_removed() {
    assert_eq!(
        remove_limit("SELECT * FROM (SELECT a FROM t LIMIT 5) x LIMIT 10"),
        "SELECT * FROM (SELECT a FROM t LIMIT 5) x"
    );
}

#[test]
fn test_expression_limit_kept() {
    for sql in [
        "SELECT a FROM t LIMIT 10 + 5",
        "SELECT a FROM t LIMIT 10 OFFSET 10 * 2",
    ] {
        assert_eq!(remove_limit(sql), sql);
    }

    let postgres = Transforms::init(Dialect::postgres(), CleanOptions::default(), Span::none())
        .unwrap();
    assert_eq!(
        postgres.remove_limit("SELECT a FROM t LIMIT $1::int"),
        "SELECT a FROM t LIMIT $1::int"
    );
}

#[test]
fn test_wrapped_select_list_survives_cleaning() {
    let raw = "Here is the query:\n```sql\nSELECT SUM(amount),\nregion FROM sales GROUP BY region\n```";
    assert_eq!(clean(raw), "SELECT SUM(amount), region FROM sales GROUP BY region");

    let raw = "SELECT id,\n  name AS label FROM products\nThis lists every product.";
    assert_eq!(clean(raw), "SELECT id, name AS label FROM products");
}

#[test]
fn test_literals_survive_every_transform() {
    let sql = "SELECT 'order LIMIT 5', \"user\" FROM t -- LIMIT 1";
    assert_eq!(remove_limit(sql), sql);
    assert_eq!(add_quotes(sql).0, sql);
    assert_eq!(clean(sql), sql);
}

#[test]
fn test_pipeline_with_configured_dialect() {
    let config = Config::from_toml_str(
        r#"
        [dialect]
        preset = "mysql"
        "#,
    )
    .unwrap();
    let transforms = Transforms::from_config(&config, Span::none()).unwrap();

    let raw = "```sql\nSELECT `key`, order\nFROM t\nLIMIT 10, 20;\n```";
    let prepared = transforms.prepare(raw, true);
    assert_eq!(prepared.sql, "SELECT `key`, `order` FROM t");
    assert_eq!(prepared.report, "quoted 'order' (reserved word)");
}

#[test]
fn test_transforms_shared_across_threads() {
    let transforms = std::sync::Arc::new(Transforms::default());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let transforms = transforms.clone();
            std::thread::spawn(move || {
                let (sql, _) = transforms.add_quotes(&format!("SELECT order FROM t{i}"));
                sql
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("SELECT \"order\" FROM t{i}"));
    }
}
