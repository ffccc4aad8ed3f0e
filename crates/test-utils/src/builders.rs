#![allow(dead_code)]

use std::collections::BTreeMap;

use storeflow::config::{
    ConfigFile, EngineSection, RawConfigFile, RawTemplate, StatusSection, TaskDefinition,
    ValidationMode, ValidationSection,
};
use storeflow::types::TemplateId;
use storeflow::workflow::Requirement;

use crate::code;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Goes through `TryFrom<RawConfigFile>`, so every blueprint is validated
/// the same way a TOML file would be.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                engine: EngineSection::default(),
                validation: ValidationSection::default(),
                status: StatusSection::default(),
                task: Vec::new(),
                template: BTreeMap::new(),
            },
        }
    }

    /// Append a definition to the legacy blueprint.
    pub fn with_task(mut self, def: TaskDefinition) -> Self {
        self.config.task.push(def);
        self
    }

    pub fn with_template(mut self, id: TemplateId, name: &str, tasks: Vec<TaskDefinition>) -> Self {
        self.config.template.insert(
            id.0.to_string(),
            RawTemplate {
                name: Some(name.to_string()),
                task: tasks,
            },
        );
        self
    }

    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.config.validation.mode = mode;
        self
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.engine.max_concurrent_jobs = n;
        self
    }

    pub fn channel_capacity(mut self, n: usize) -> Self {
        self.config.engine.channel_capacity = n;
        self
    }

    pub fn construction_keywords(mut self, words: &[&str]) -> Self {
        self.config.status.construction_keywords = words.iter().map(|w| w.to_string()).collect();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskDefinition`.
pub struct DefinitionBuilder {
    def: TaskDefinition,
}

impl DefinitionBuilder {
    /// A definition named after its code.
    pub fn new(task_code: &str, duration_days: u32) -> Self {
        Self {
            def: TaskDefinition::new(code(task_code), task_code, duration_days),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.def.name = name.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.def.depends_on.push(code(dep));
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.def.responsible_role = Some(role.to_string());
        self
    }

    pub fn stage(mut self, stage: &str) -> Self {
        self.def.stage = Some(stage.to_string());
        self
    }

    pub fn requires(mut self, req: Requirement) -> Self {
        self.def.requires.get_or_insert_with(Vec::new).push(req);
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.def
    }
}
