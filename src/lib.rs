// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod notify;
pub mod project;
pub mod store;
pub mod task;
pub mod types;
pub mod workflow;

use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{Blueprint, ConfigFile, ValidationMode};
use crate::engine::Dispatcher;
use crate::project::{NewProject, Project};
use crate::store::{MemoryStore, TaskStore};
use crate::types::TaskStatus;
use crate::workflow::{EngineContext, WorkflowService};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - an in-memory store seeded with one user per responsible role
/// - the background dispatcher and the workflow service
///
/// It then creates one project, applies the `--complete` arguments in order
/// (letting the engine settle after each) and prints the resulting schedule.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => load_and_validate(path)?,
        None => {
            debug!("no --config given; using the built-in store-opening blueprint");
            ConfigFile::default()
        }
    };

    if args.check {
        print_check(&cfg);
        return Ok(());
    }

    if !args.validate {
        cfg.validation.mode = ValidationMode::Off;
    }
    let engine = cfg.engine;
    let blueprint = cfg
        .catalog
        .resolve(args.template)
        .ok_or_else(|| anyhow!("template {:?} is not configured", args.template))?;

    let store = MemoryStore::new();
    for role in roles(blueprint) {
        store.add_user(&format!("{role} (simulated)"), &[role.as_str()]);
    }

    let ctx = EngineContext::in_memory(&store, cfg);
    let (dispatcher, join) = Dispatcher::spawn(ctx.clone(), engine);
    let service = WorkflowService::new(ctx, dispatcher.clone());

    let start = args.start.unwrap_or_else(|| Utc::now().date_naive());
    let mut new_project = NewProject::new(args.name.clone(), midnight(start));
    if let Some(id) = args.template {
        new_project = new_project.with_template(id);
    }
    let (project, tasks) = service.create_project(new_project, None)?;
    info!(project = %project.id, tasks = tasks.len(), start = %start, "simulating project");
    service.wait_idle().await?;

    for completion in &args.completions {
        let task = store
            .load_tasks_by_project(project.id)?
            .into_iter()
            .find(|t| t.code.as_ref() == Some(&completion.code))
            .ok_or_else(|| anyhow!("project has no task with code {}", completion.code))?;

        service.update_task_status(
            task.id,
            TaskStatus::Completed,
            None,
            midnight(completion.date),
        )?;
        service.wait_idle().await?;
    }

    print_schedule(&store, &project)?;
    let report = service.status_report(project.id, Utc::now())?;
    println!();
    println!(
        "status: {} ({}/{} tasks completed, {:.0}%, {} overdue)",
        report.current,
        report.progress.completed,
        report.progress.total,
        report.progress.percent,
        report.overdue
    );

    dispatcher.shutdown().await;
    join.await?;
    Ok(())
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Distinct responsible roles of a blueprint, sorted.
fn roles(blueprint: &Blueprint) -> BTreeSet<String> {
    blueprint
        .definitions()
        .iter()
        .filter_map(|def| def.responsible_role.clone())
        .filter(|role| !role.is_empty())
        .collect()
}

fn print_schedule(store: &MemoryStore, project: &Project) -> Result<()> {
    let tasks = store.load_tasks_by_project(project.id)?;
    println!("project {} '{}'", project.id, project.name);
    println!(
        "  {:<22} {:<12} {:<10} {:<10} {:<10}",
        "CODE", "STATUS", "START", "DEADLINE", "DONE"
    );
    for task in tasks {
        println!(
            "  {:<22} {:<12} {:<10} {:<10} {:<10}",
            task.label(),
            task.status.as_str(),
            task.planned_start_date
                .map(|d| d.date_naive().to_string())
                .unwrap_or_else(|| "-".into()),
            task.normative_deadline.date_naive().to_string(),
            task.actual_completion_date
                .map(|d| d.date_naive().to_string())
                .unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

/// `--check` output: engine settings and every blueprint.
fn print_check(cfg: &ConfigFile) {
    println!("storeflow check");
    println!("  engine.channel_capacity = {}", cfg.engine.channel_capacity);
    println!("  engine.max_concurrent_jobs = {}", cfg.engine.max_concurrent_jobs);
    println!("  validation.mode = {:?}", cfg.validation.mode);
    println!(
        "  status.construction_keywords = {:?}",
        cfg.status.construction_keywords
    );
    println!();

    print_blueprint("legacy", cfg.catalog.legacy());
    for (id, bp) in cfg.catalog.templates() {
        println!();
        print_blueprint(&format!("template {id}"), bp);
    }

    debug!("check complete (no simulation)");
}

fn print_blueprint(title: &str, bp: &Blueprint) {
    println!("{title}: {} ({} tasks)", bp.name(), bp.len());
    for def in bp.definitions() {
        println!("  - {} {} ({}d)", def.code, def.name, def.duration_days);
        if !def.depends_on.is_empty() {
            let deps: Vec<&str> = def.depends_on.iter().map(|c| c.as_str()).collect();
            println!("      depends_on: {deps:?}");
        }
        if let Some(role) = &def.responsible_role {
            println!("      responsible_role: {role}");
        }
        if let Some(reqs) = &def.requires {
            println!("      requires: {} custom check(s)", reqs.len());
        }
    }
}
