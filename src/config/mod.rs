// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`): engine sizing,
//!   validation mode, status-deriver inputs and the task blueprints.
//! - Provide the built-in store-opening blueprint (`builtin.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate blueprint invariants like DAG correctness (`validate.rs`).

pub mod builtin;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    Blueprint, BlueprintCatalog, ConfigFile, EngineSection, RawConfigFile, RawTemplate,
    StageMapping, StatusSection, TaskDefinition, ValidationMode, ValidationSection,
};
pub use validate::validate_blueprint;
