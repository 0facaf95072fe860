use std::sync::Arc;

use serde_json::json;
use sqlprep::prelude::*;
use tracing::Span;

fn engine(toml: &str) -> Engine {
    let config = Config::from_toml_str(toml).unwrap();
    let transforms = Transforms::from_config(&config, Span::none()).unwrap();
    Engine::from_config(&config.engine, Arc::new(transforms)).unwrap()
}

#[tokio::test]
async fn test_offline_dry_run_of_prepared_statement() {
    let engine = engine("[engine]\nprovider = \"offline\"\n");
    let transforms = Transforms::default();
    let prepared = transforms.prepare("```sql\nSELECT order FROM sales LIMIT 10;\n```", true);

    let outcome = engine
        .execute_sql(&prepared.sql, &Session::detached(), true, &ExecOptions::default())
        .await;
    assert!(outcome.success);
    assert_eq!(
        outcome.result,
        Some(json!({ "dry_run": true, "sql": "SELECT \"order\" FROM sales" }))
    );
}

#[tokio::test]
async fn test_empty_statement_fails_for_every_provider() {
    for provider in ["offline", "sqlx"] {
        let engine = engine(&format!("[engine]\nprovider = \"{provider}\"\n"));
        let outcome = engine
            .execute_sql("", &Session::detached(), true, &ExecOptions::default())
            .await;
        assert!(!outcome.success, "{provider} accepted an empty statement");
    }
}

#[tokio::test]
async fn test_sqlite_execution() {
    let engine = engine("[engine]\nprovider = \"sqlx\"\n\n[engine.config]\nlimit = 1\n");
    let session = Session::connect("sqlite::memory:").await.unwrap();

    let outcome = engine
        .execute_sql(
            "SELECT 1 AS n UNION ALL SELECT 2 AS n",
            &session,
            false,
            &ExecOptions::default(),
        )
        .await;
    assert!(outcome.success);
    let result = outcome.result.unwrap();
    assert_eq!(result["row_count"], json!(2));
    assert_eq!(result["truncated"], json!(true));
    assert_eq!(result["data"].as_array().unwrap().len(), 1);
    assert_eq!(result["columns"], json!(["n"]));

    let widened = engine
        .execute_sql(
            "SELECT 1 AS n UNION ALL SELECT 2 AS n",
            &session,
            false,
            &ExecOptions { limit: Some(10) },
        )
        .await;
    assert_eq!(widened.result.unwrap()["truncated"], json!(false));
}

#[tokio::test]
async fn test_sqlite_dry_run_and_failure() {
    let engine = engine("[engine]\nprovider = \"sqlx\"\n");
    let session = Session::connect("sqlite::memory:").await.unwrap();

    let plan = engine
        .execute_sql("SELECT 1 LIMIT 5", &session, true, &ExecOptions::default())
        .await;
    assert!(plan.success);
    assert_eq!(plan.result.unwrap()["dry_run"], json!(true));

    let missing = engine
        .execute_sql("SELECT * FROM missing_table", &session, false, &ExecOptions::default())
        .await;
    assert!(!missing.success);
    let error = missing.result.unwrap()["error"].as_str().unwrap().to_string();
    assert!(error.contains("missing_table"), "{error}");
}

#[tokio::test]
async fn test_sqlite_rows_keep_select_order() {
    let engine = engine("[engine]\nprovider = \"sqlx\"\n");
    let session = Session::connect("sqlite::memory:").await.unwrap();

    let outcome = engine
        .execute_sql("SELECT 2 AS b, 1 AS a", &session, false, &ExecOptions::default())
        .await;
    assert!(outcome.success);
    let result = outcome.result.unwrap();
    assert_eq!(result["columns"], json!(["b", "a"]));

    let row = result["data"][0].as_object().unwrap();
    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, ["b", "a"]);
    assert_eq!(serde_json::to_string(row).unwrap(), r#"{"b":2,"a":1}"#);
}
