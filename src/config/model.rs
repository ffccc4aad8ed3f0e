// src/config/model.rs

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{ProjectStatus, TaskCode, TemplateId, UserId};
use crate::workflow::rules::Requirement;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// channel_capacity = 64
/// max_concurrent_jobs = 4
///
/// [validation]
/// mode = "fail_fast"
///
/// [status]
/// construction_keywords = ["construction", "renovation"]
///
/// [[task]]
/// code = "A"
/// name = "Survey"
/// duration_days = 2
///
/// [[task]]
/// code = "B"
/// name = "Design"
/// duration_days = 1
/// depends_on = ["A"]
///
/// [template.7]
/// name = "Small format"
///
/// [[template.7.task]]
/// code = "A"
/// name = "Survey"
/// duration_days = 1
/// ```
///
/// The top-level `[[task]]` list is the legacy blueprint used by projects
/// without a template. When it is empty the built-in store-opening list is
/// used instead.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub validation: ValidationSection,

    #[serde(default)]
    pub status: StatusSection,

    /// Legacy blueprint, in authored order.
    #[serde(default)]
    pub task: Vec<TaskDefinition>,

    /// Per-project-type templates keyed by template id.
    #[serde(default)]
    pub template: BTreeMap<String, RawTemplate>,
}

/// `[template.<id>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTemplate {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub task: Vec<TaskDefinition>,
}

/// Validated configuration.
///
/// Can only be obtained through `TryFrom<RawConfigFile>` (see
/// `config::validate`) or [`ConfigFile::default`], which wraps the built-in
/// store-opening blueprint.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub validation: ValidationSection,
    pub status: StatusSection,
    pub catalog: BlueprintCatalog,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        validation: ValidationSection,
        status: StatusSection,
        catalog: BlueprintCatalog,
    ) -> Self {
        Self {
            engine,
            validation,
            status,
            catalog,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            engine: EngineSection::default(),
            validation: ValidationSection::default(),
            status: StatusSection::default(),
            catalog: BlueprintCatalog::new(Blueprint::store_opening()),
        }
    }
}

/// `[engine]` section: sizing of the background dispatcher.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EngineSection {
    /// Capacity of the dispatcher's request channel. Requests that do not fit
    /// are dropped with a warning; the next trigger for the project catches
    /// up.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Maximum number of project jobs running at the same time. Jobs for a
    /// single project never run concurrently regardless of this value.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_channel_capacity() -> usize {
    64
}

fn default_max_concurrent_jobs() -> usize {
    4
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

/// How the completion validator reports unmet requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first unmet requirement.
    FailFast,
    /// Report every unmet requirement of the task.
    Aggregate,
    /// Skip completion gating entirely (what-if planning only).
    Off,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::FailFast
    }
}

/// `[validation]` section.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct ValidationSection {
    #[serde(default)]
    pub mode: ValidationMode,
}

/// `[status]` section: inputs of the project status deriver.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSection {
    /// Case-insensitive substrings of task names that mark construction or
    /// renovation work.
    #[serde(default = "default_construction_keywords")]
    pub construction_keywords: Vec<String>,

    /// Task code → project status table, in canonical stage order.
    ///
    /// When empty, the built-in store-opening table is used.
    #[serde(default)]
    pub stages: Vec<StageMapping>,
}

fn default_construction_keywords() -> Vec<String> {
    ["construction", "renovation", "repair", "rsr"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            construction_keywords: default_construction_keywords(),
            stages: Vec::new(),
        }
    }
}

/// One row of the `[status]` stage table.
#[derive(Debug, Clone, Deserialize)]
pub struct StageMapping {
    pub code: TaskCode,
    pub status: ProjectStatus,
}

/// `[[task]]` entry: one node of a blueprint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskDefinition {
    pub code: TaskCode,

    pub name: String,

    /// Normative duration in calendar days. Must be positive.
    #[serde(alias = "duration")]
    pub duration_days: u32,

    /// Codes of the tasks that must complete before this one starts.
    #[serde(default)]
    pub depends_on: Vec<TaskCode>,

    #[serde(default)]
    pub responsible_role: Option<String>,

    /// Fixed responsible user; skips role resolution when set.
    #[serde(default)]
    pub responsible_user: Option<UserId>,

    #[serde(default)]
    pub stage: Option<String>,

    #[serde(default = "default_task_type")]
    pub task_type: String,

    /// Completion requirements for this code. When present this replaces
    /// the built-in rule for the code.
    #[serde(default)]
    pub requires: Option<Vec<Requirement>>,
}

fn default_task_type() -> String {
    "user_task".to_string()
}

impl TaskDefinition {
    pub fn new(code: TaskCode, name: impl Into<String>, duration_days: u32) -> Self {
        Self {
            code,
            name: name.into(),
            duration_days,
            depends_on: Vec::new(),
            responsible_role: None,
            responsible_user: None,
            stage: None,
            task_type: default_task_type(),
            requires: None,
        }
    }
}

/// Ordered list of task definitions for one project type.
///
/// The authored order is significant: the generator and the recompute pass
/// walk it linearly and expect every task to appear after its
/// prerequisites.
#[derive(Debug, Clone)]
pub struct Blueprint {
    name: String,
    tasks: Vec<TaskDefinition>,
    index: HashMap<TaskCode, usize>,
}

impl Blueprint {
    /// Build a blueprint without checking codes or the dependency graph.
    ///
    /// Use `config::validate_blueprint` (or load through the config loader)
    /// for anything that did not come from trusted code.
    pub fn new_unchecked(name: impl Into<String>, tasks: Vec<TaskDefinition>) -> Self {
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, def)| (def.code.clone(), i))
            .collect();
        Self {
            name: name.into(),
            tasks,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definitions in authored order.
    pub fn definitions(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    pub fn definition(&self, code: &str) -> Option<&TaskDefinition> {
        self.index.get(code).map(|&i| &self.tasks[i])
    }

    /// Authored position of `code`.
    pub fn position(&self, code: &str) -> Option<usize> {
        self.index.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// The set of blueprints available to the engine: the legacy list plus
/// per-project-type templates.
#[derive(Debug, Clone)]
pub struct BlueprintCatalog {
    legacy: Blueprint,
    templates: BTreeMap<TemplateId, Blueprint>,
}

impl BlueprintCatalog {
    pub fn new(legacy: Blueprint) -> Self {
        Self {
            legacy,
            templates: BTreeMap::new(),
        }
    }

    pub fn with_template(mut self, id: TemplateId, blueprint: Blueprint) -> Self {
        self.templates.insert(id, blueprint);
        self
    }

    pub fn legacy(&self) -> &Blueprint {
        &self.legacy
    }

    pub fn template(&self, id: TemplateId) -> Option<&Blueprint> {
        self.templates.get(&id)
    }

    pub fn templates(&self) -> impl Iterator<Item = (TemplateId, &Blueprint)> {
        self.templates.iter().map(|(id, bp)| (*id, bp))
    }

    /// Blueprint a project uses: its template, or the legacy list when it
    /// has none.
    pub fn resolve(&self, template: Option<TemplateId>) -> Option<&Blueprint> {
        match template {
            Some(id) => self.template(id),
            None => Some(&self.legacy),
        }
    }
}
