// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{
    Blueprint, BlueprintCatalog, ConfigFile, RawConfigFile, StatusSection,
};
use crate::dag::DagGraph;
use crate::errors::{Result, WorkflowError};
use crate::types::TemplateId;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WorkflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_engine(&raw)?;
        validate_status(&raw.status)?;

        let legacy = if raw.task.is_empty() {
            Blueprint::store_opening()
        } else {
            Blueprint::new_unchecked("legacy", raw.task)
        };
        validate_blueprint(&legacy)?;

        let mut catalog = BlueprintCatalog::new(legacy);
        for (key, template) in raw.template {
            let id = key.trim().parse::<u64>().map(TemplateId).map_err(|_| {
                WorkflowError::ConfigError(format!(
                    "template key '{key}' must be a numeric template id"
                ))
            })?;
            if template.task.is_empty() {
                return Err(WorkflowError::ConfigError(format!(
                    "template {id} must contain at least one [[template.{key}.task]] entry"
                )));
            }
            let name = template.name.unwrap_or_else(|| format!("template-{id}"));
            let blueprint = Blueprint::new_unchecked(name, template.task);
            validate_blueprint(&blueprint)?;
            catalog = catalog.with_template(id, blueprint);
        }

        Ok(ConfigFile::new_unchecked(
            raw.engine,
            raw.validation,
            raw.status,
            catalog,
        ))
    }
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.channel_capacity == 0 {
        return Err(WorkflowError::ConfigError(
            "[engine].channel_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.max_concurrent_jobs == 0 {
        return Err(WorkflowError::ConfigError(
            "[engine].max_concurrent_jobs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_status(status: &StatusSection) -> Result<()> {
    let mut seen = HashSet::new();
    for row in &status.stages {
        if !seen.insert(row.code.as_str()) {
            return Err(WorkflowError::ConfigError(format!(
                "[status].stages maps task '{}' more than once",
                row.code
            )));
        }
    }
    if status.construction_keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(WorkflowError::ConfigError(
            "[status].construction_keywords must not contain empty strings".to_string(),
        ));
    }
    Ok(())
}

/// Check a blueprint's structural invariants:
///
/// - unique codes, positive durations,
/// - every `depends_on` code resolves to another definition,
/// - the dependency graph is acyclic.
///
/// An authored order that is not topological is accepted, but logged: the
/// recompute pass will lag one step behind for such blueprints.
pub fn validate_blueprint(bp: &Blueprint) -> Result<()> {
    if bp.is_empty() {
        return Err(WorkflowError::ConfigError(format!(
            "blueprint '{}' must contain at least one task",
            bp.name()
        )));
    }
    validate_definitions(bp)?;
    validate_dependencies(bp)?;
    validate_dag(bp)?;

    if let Some((task, dep)) = DagGraph::from_blueprint(bp).first_out_of_order() {
        warn!(
            blueprint = bp.name(),
            task = %task,
            dependency = %dep,
            "task is listed before one of its dependencies; propagation may lag one step"
        );
    }
    Ok(())
}

fn validate_definitions(bp: &Blueprint) -> Result<()> {
    let mut seen = HashSet::new();
    for def in bp.definitions() {
        if !seen.insert(def.code.as_str()) {
            return Err(WorkflowError::ConfigError(format!(
                "blueprint '{}' defines task '{}' more than once",
                bp.name(),
                def.code
            )));
        }
        if def.duration_days == 0 {
            return Err(WorkflowError::ConfigError(format!(
                "task '{}' must have a positive duration_days (got 0)",
                def.code
            )));
        }
        if def.name.trim().is_empty() {
            return Err(WorkflowError::ConfigError(format!(
                "task '{}' must have a name",
                def.code
            )));
        }
    }
    Ok(())
}

fn validate_dependencies(bp: &Blueprint) -> Result<()> {
    for def in bp.definitions() {
        for dep in &def.depends_on {
            if dep == &def.code {
                return Err(WorkflowError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `depends_on`",
                    def.code
                )));
            }
            if !bp.contains(dep.as_str()) {
                return Err(WorkflowError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `depends_on`",
                    def.code, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(bp: &Blueprint) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for def in bp.definitions() {
        graph.add_node(def.code.as_str());
    }
    for def in bp.definitions() {
        for dep in &def.depends_on {
            graph.add_edge(dep.as_str(), def.code.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(WorkflowError::DagCycle(format!(
            "cycle detected in blueprint '{}' involving task '{}'",
            bp.name(),
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::TaskDefinition;
    use crate::types::TaskCode;

    fn code(s: &str) -> TaskCode {
        TaskCode::new(s).unwrap()
    }

    fn task(c: &str, deps: &[&str]) -> TaskDefinition {
        TaskDefinition {
            depends_on: deps.iter().map(|d| code(d)).collect(),
            ..TaskDefinition::new(code(c), c, 1)
        }
    }

    #[test]
    fn rejects_duplicate_codes() {
        let bp = Blueprint::new_unchecked("t", vec![task("A", &[]), task("A", &[])]);
        let err = validate_blueprint(&bp).unwrap_err();
        assert!(matches!(err, WorkflowError::ConfigError(msg) if msg.contains("more than once")));
    }

    #[test]
    fn rejects_zero_duration() {
        let mut a = task("A", &[]);
        a.duration_days = 0;
        let bp = Blueprint::new_unchecked("t", vec![a]);
        assert!(validate_blueprint(&bp).is_err());
    }

    #[test]
    fn rejects_self_dependency_and_cycles() {
        let bp = Blueprint::new_unchecked("t", vec![task("A", &["A"])]);
        assert!(matches!(
            validate_blueprint(&bp),
            Err(WorkflowError::ConfigError(msg)) if msg.contains("itself")
        ));

        let bp = Blueprint::new_unchecked(
            "t",
            vec![task("A", &["C"]), task("B", &["A"]), task("C", &["B"])],
        );
        assert!(matches!(validate_blueprint(&bp), Err(WorkflowError::DagCycle(_))));
    }

    #[test]
    fn accepts_non_topological_order() {
        let bp = Blueprint::new_unchecked("t", vec![task("B", &["A"]), task("A", &[])]);
        assert!(validate_blueprint(&bp).is_ok());
    }
}
