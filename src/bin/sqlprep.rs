//! sqlprep — prepare model-generated SQL from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Clean a model answer
//! sqlprep clean "$(cat answer.md)"
//!
//! # Full pipeline, then explain against a database
//! cat answer.md | sqlprep exec --dry-run
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde_json::Value;
use sqlprep::dialect::PRESETS;
use sqlprep::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlprep")]
#[command(version)]
#[command(about = "Prepare model-generated SQL for execution", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlprep clean '```sql\\nSELECT 1;\\n```'
    sqlprep quote 'SELECT order FROM sales' --dialect postgres
    cat answer.md | sqlprep exec --dry-run")]
struct Cli {
    /// Config file (default: ./sqlprep.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dialect preset, overrides the config file
    #[arg(short, long, global = true)]
    dialect: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one statement from raw model output
    Clean {
        /// Input text (reads stdin when omitted)
        input: Option<String>,
    },
    /// Remove the top-level LIMIT clause
    RemoveLimit { input: Option<String> },
    /// Quote identifiers; the report goes to stderr
    Quote { input: Option<String> },
    /// Clean, quote and (for dry runs) remove LIMIT
    Prepare {
        input: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Prepare, then run through the configured engine
    Exec {
        input: Option<String>,
        /// EXPLAIN the statement instead of running it
        #[arg(long)]
        dry_run: bool,
        /// Maximum rows to return
        #[arg(short, long)]
        limit: Option<usize>,
        /// Database connection URL
        #[arg(long, env = "SQLPREP_DATABASE_URL")]
        database_url: Option<String>,
    },
    /// List dialect presets
    Dialects,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Dialects = cli.command {
        show_dialects();
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dialect) = &cli.dialect {
        config.dialect.preset = dialect.clone();
    }

    let transforms = Transforms::from_config(&config, tracing::info_span!("sqlprep"))
        .context("SQL transforms unavailable")?;

    match cli.command {
        Commands::Clean { input } => {
            let sql = transforms.clean(&read_input(input)?);
            emit(cli.format, &sql, || Value::String(sql.clone()));
        }
        Commands::RemoveLimit { input } => {
            let sql = transforms.remove_limit(&read_input(input)?);
            emit(cli.format, &sql, || Value::String(sql.clone()));
        }
        Commands::Quote { input } => {
            let quoted = transforms.quote(&read_input(input)?);
            match cli.format {
                OutputFormat::Json => print_json(&quoted),
                OutputFormat::Text => {
                    println!("{}", quoted.sql);
                    print_report(&quoted.report.to_string());
                }
            }
        }
        Commands::Prepare { input, dry_run } => {
            let prepared = transforms.prepare(&read_input(input)?, dry_run);
            match cli.format {
                OutputFormat::Json => print_json(&prepared),
                OutputFormat::Text => {
                    println!("{}", prepared.sql);
                    print_report(&prepared.report);
                }
            }
        }
        Commands::Exec {
            input,
            dry_run,
            limit,
            database_url,
        } => {
            let prepared = transforms.prepare(&read_input(input)?, dry_run);
            if !prepared.report.is_empty() {
                print_report(&prepared.report);
            }

            let engine = Engine::from_config(&config.engine, Arc::new(transforms))?;
            let url = database_url.or_else(|| config.engine.url().map(str::to_string));
            let session = match (&engine, url) {
                (Engine::Sqlx(_), Some(url)) => Session::connect(&url).await?,
                (Engine::Sqlx(_), None) => anyhow::bail!(
                    "No database URL. Use --database-url, set SQLPREP_DATABASE_URL or [engine.config] url"
                ),
                (Engine::Offline(_), _) => Session::detached(),
            };

            let outcome = engine
                .execute_sql(&prepared.sql, &session, dry_run, &ExecOptions { limit })
                .await;
            print_outcome(&prepared.sql, &outcome, cli.format);
            if !outcome.success {
                std::process::exit(2);
            }
        }
        Commands::Dialects => unreachable!(), // Handled above
    }

    Ok(())
}

/// Positional argument, or all of stdin.
fn read_input(arg: Option<String>) -> Result<String> {
    match arg {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn emit(format: OutputFormat, text: &str, json: impl FnOnce() -> Value) {
    match format {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Json => print_json(&json()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn print_report(report: &str) {
    if !report.is_empty() {
        eprintln!("{} {}", "Quoted:".cyan(), report.yellow());
    }
}

fn print_outcome(sql: &str, outcome: &ExecOutcome, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(outcome);
        return;
    }

    let result = outcome.result.as_ref().unwrap_or(&Value::Null);
    if !outcome.success {
        eprintln!("{} {}", "Failed:".red().bold(), sql.white());
        if let Some(error) = result.get("error").and_then(Value::as_str) {
            eprintln!("  {}", error.red());
        }
        return;
    }

    if let Some(plan) = result.get("plan").and_then(Value::as_array) {
        println!("{}", "Plan:".green().bold());
        format_rows(&row_columns(plan), plan);
    } else if let Some(data) = result.get("data").and_then(Value::as_array) {
        // Column order as the database reported it.
        let columns: Vec<&str> = match result.get("columns").and_then(Value::as_array) {
            Some(names) => names.iter().filter_map(Value::as_str).collect(),
            None => row_columns(data),
        };
        format_rows(&columns, data);
        println!();
        let total = result.get("row_count").and_then(Value::as_u64).unwrap_or(0);
        println!("{} row(s) returned", total.to_string().cyan());
        if result.get("truncated").and_then(Value::as_bool) == Some(true) {
            println!("{}", format!("(showing first {})", data.len()).dimmed());
        }
    } else {
        println!("{} {}", "✓ Valid:".green().bold(), sql.white());
    }
}

fn row_columns(rows: &[Value]) -> Vec<&str> {
    rows.first()
        .and_then(Value::as_object)
        .map(|first| first.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

fn format_rows(columns: &[&str], rows: &[Value]) {
    if rows.is_empty() || columns.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    let mut widths: HashMap<&str, usize> = columns.iter().map(|c| (*c, c.len())).collect();
    for row in rows.iter().filter_map(Value::as_object) {
        for (col, val) in row {
            let len = val_to_string(val).len();
            if let Some(w) = widths.get_mut(col.as_str()) {
                *w = (*w).max(len);
            }
        }
    }

    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:width$}", c, width = widths[*c]))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[*c])).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in rows.iter().filter_map(Value::as_object) {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| {
                let val = row.get(*c).map(val_to_string).unwrap_or_default();
                format!("{:width$}", val, width = widths[*c])
            })
            .collect();
        println!("{}", cells.join(" │ "));
    }
}

fn val_to_string(val: &Value) -> String {
    match val {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn show_dialects() {
    println!(
        "{:10} {:8} {:10} {}",
        "Preset".white().bold(),
        "Quote".white().bold(),
        "Escape".white().bold(),
        "Reserved".white().bold()
    );
    println!("{}", "─".repeat(44).dimmed());

    for name in PRESETS.split(", ") {
        let Ok(dialect) = Dialect::preset(name) else {
            continue;
        };
        let escape = match dialect.escape_rule {
            EscapeRule::Double => "double",
            EscapeRule::Backslash => "backslash",
        };
        println!(
            "{:10} {:8} {:10} {}",
            name.cyan().bold(),
            format!("{}name{}", dialect.quote_open, dialect.quote_close).yellow(),
            escape,
            dialect.reserved_words().count().to_string().dimmed()
        );
    }
}
