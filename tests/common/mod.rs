#![allow(dead_code)]

pub use storeflow_test_utils::{code, day, init_tracing, ConfigFileBuilder, DefinitionBuilder, Harness};

use storeflow::config::{ConfigFile, ValidationMode};

/// `A(2)` then `B(1)` after `A`.
pub fn two_step() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task(DefinitionBuilder::new("A", 2).build())
        .with_task(DefinitionBuilder::new("B", 1).after("A").build())
        .build()
}

/// `A(1)` and `B(1)` both gate `C(1)`.
pub fn diamond() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task(DefinitionBuilder::new("A", 1).build())
        .with_task(DefinitionBuilder::new("B", 1).build())
        .with_task(DefinitionBuilder::new("C", 1).after("A").after("B").build())
        .build()
}

/// The built-in store-opening blueprint with completion checks enforced.
pub fn store_opening() -> ConfigFile {
    ConfigFileBuilder::new().validation(ValidationMode::FailFast).build()
}
