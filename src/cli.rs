// src/cli.rs

//! CLI argument parsing using `clap`.

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

use crate::types::{TaskCode, TemplateId};

/// Command-line arguments for `storeflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "storeflow",
    version,
    about = "Plan a store-opening project from a task blueprint and simulate its progress.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow config file (TOML).
    ///
    /// When omitted, the built-in store-opening blueprint is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Validate the config and print the blueprints, without simulating.
    #[arg(long)]
    pub check: bool,

    /// Project name used in the simulation.
    #[arg(long, value_name = "NAME", default_value = "Store opening")]
    pub name: String,

    /// Generate the project from this template instead of the legacy list.
    #[arg(long, value_name = "ID", value_parser = parse_template)]
    pub template: Option<TemplateId>,

    /// Project creation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_name = "DATE")]
    pub start: Option<NaiveDate>,

    /// Complete a task on a given date, e.g. `TASK-AUDIT=2024-01-15`.
    ///
    /// May be repeated; completions are applied in order and the engine
    /// settles after each one.
    #[arg(long = "complete", value_name = "CODE=DATE", value_parser = parse_completion)]
    pub completions: Vec<Completion>,

    /// Enforce the completion checks from the config.
    ///
    /// Off by default, since simulated tasks carry no evidence.
    #[arg(long)]
    pub validate: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STOREFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// One `--complete CODE=DATE` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub code: TaskCode,
    pub date: NaiveDate,
}

fn parse_completion(s: &str) -> Result<Completion, String> {
    let (code, date) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=DATE, got '{s}'"))?;
    let code = TaskCode::new(code)?;
    let date = date
        .trim()
        .parse::<NaiveDate>()
        .map_err(|e| format!("invalid date '{}': {e}", date.trim()))?;
    Ok(Completion { code, date })
}

fn parse_template(s: &str) -> Result<TemplateId, String> {
    s.trim()
        .parse::<u64>()
        .map(TemplateId)
        .map_err(|e| format!("invalid template id '{s}': {e}"))
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
