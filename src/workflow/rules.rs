// src/workflow/rules.rs

//! Completion requirements per task code.
//!
//! The built-in table covers the store-opening codes. A blueprint definition
//! can carry its own `requires` list, which replaces the built-in rule for
//! that code:
//!
//! ```toml
//! [[task]]
//! code = "TASK-LAYOUT"
//! name = "Equipment layout"
//! duration_days = 2
//! requires = [
//!   { field = "layout_agreement_date" },
//!   { document = "Technological layout (DWG)", extensions = [".dwg"] },
//! ]
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::model::Blueprint;
use crate::task::EvidenceField;
use crate::types::{KnownTask, TaskCode};

/// One completion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    /// An evidence field must be filled in.
    Field {
        field: EvidenceField,
        /// Overrides the field's default label in rejection messages.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// A project document of this type must exist, with one of the listed
    /// extensions when the list is non-empty (case-insensitive).
    Document {
        document: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        extensions: Vec<String>,
    },
}

impl Requirement {
    pub fn field(field: EvidenceField) -> Self {
        Requirement::Field { field, label: None }
    }

    pub fn document(doc_type: &str) -> Self {
        Requirement::Document {
            document: doc_type.to_string(),
            extensions: Vec::new(),
        }
    }

    pub fn document_with_ext(doc_type: &str, extensions: &[&str]) -> Self {
        Requirement::Document {
            document: doc_type.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Field { field, label } => {
                write!(f, "field '{}'", label.as_deref().unwrap_or(field.label()))
            }
            Requirement::Document {
                document,
                extensions,
            } if extensions.is_empty() => write!(f, "document '{document}'"),
            Requirement::Document {
                document,
                extensions,
            } => write!(f, "document '{document}' ({})", extensions.join(", ")),
        }
    }
}

/// Built-in completion rule of a store-opening task. An empty list means the
/// task can always be completed.
pub fn builtin_rule(task: KnownTask) -> Vec<Requirement> {
    use EvidenceField as F;
    use Requirement as R;

    match task {
        KnownTask::PrepAudit => vec![
            R::field(F::PlannedAuditDate),
            R::field(F::ProjectFolderLink),
            R::document("Technical plan"),
        ],
        KnownTask::Audit => vec![R::field(F::ActualAuditDate)],
        KnownTask::AlcoholLicense => Vec::new(),
        KnownTask::Waste => vec![
            R::field(F::WasteDocsLink),
            R::field(F::WasteAgreementDate),
            R::field(F::WasteRegistryDate),
        ],
        KnownTask::Contour => vec![
            R::field(F::ContourAgreementDate),
            R::document("Site photos"),
            R::document_with_ext("Measured plan", &[".dwg"]),
            R::document_with_ext("Preliminary contour", &[".dwg"]),
        ],
        KnownTask::Visualization => vec![
            R::field(F::VisualizationAgreementDate),
            R::document("Visualization concept"),
            R::document("Land registry extract"),
            R::document("Storefront visualization"),
        ],
        KnownTask::Logistics => vec![
            R::field(F::LogisticsNbkpEligibility),
            R::document("Access roads scheme"),
            R::document_with_ext("Logistics and access assessment", &[".pdf"]),
            R::document_with_ext("NBKP eligibility assessment", &[".pdf"]),
        ],
        KnownTask::Layout => vec![
            R::field(F::LayoutAgreementDate),
            R::document_with_ext("Technological layout (DWG)", &[".dwg"]),
            R::document_with_ext("Technological layout (PDF)", &[".pdf"]),
        ],
        KnownTask::BudgetEquipment => vec![
            R::field(F::EquipmentCostNoVat),
            R::document_with_ext("Equipment cost estimate", &[".xls", ".xlsx"]),
        ],
        KnownTask::BudgetSecurity => vec![
            R::field(F::SecurityBudgetNoVat),
            R::document("Security questionnaire"),
            R::document_with_ext("Security equipment cost estimate", &[".xls", ".xlsx"]),
        ],
        KnownTask::BudgetRsr => vec![
            R::field(F::RsrBudgetNoVat),
            R::document("Distribution sheet"),
            R::document_with_ext("Repair works budget estimate", &[".xls", ".xlsx"]),
        ],
        KnownTask::BudgetPis => vec![R::field(F::PisBudgetNoVat)],
        KnownTask::TotalBudget => vec![R::field(F::TotalBudgetNoVat)],
    }
}

/// Requirements per code for one blueprint: authored `requires` lists first,
/// then the built-in table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    overrides: HashMap<TaskCode, Vec<Requirement>>,
}

impl RuleTable {
    /// Built-in rules only.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn for_blueprint(bp: &Blueprint) -> Self {
        let overrides = bp
            .definitions()
            .iter()
            .filter_map(|def| def.requires.clone().map(|reqs| (def.code.clone(), reqs)))
            .collect();
        Self { overrides }
    }

    /// Requirements for `code`; empty when neither the blueprint nor the
    /// built-in table knows it.
    pub fn requirements(&self, code: &TaskCode) -> Vec<Requirement> {
        if let Some(reqs) = self.overrides.get(code) {
            return reqs.clone();
        }
        code.known().map(builtin_rule).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::TaskDefinition;

    #[test]
    fn requirement_lists_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            requires: Vec<Requirement>,
        }

        let w: Wrapper = toml::from_str(
            r#"
            requires = [
              { field = "layout_agreement_date" },
              { field = "total_budget_no_vat", label = "Budget" },
              { document = "Layout", extensions = [".dwg"] },
              { document = "Photos" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(
            w.requires,
            vec![
                Requirement::field(EvidenceField::LayoutAgreementDate),
                Requirement::Field {
                    field: EvidenceField::TotalBudgetNoVat,
                    label: Some("Budget".into()),
                },
                Requirement::document_with_ext("Layout", &[".dwg"]),
                Requirement::document("Photos"),
            ]
        );
    }

    #[test]
    fn authored_requires_override_builtin() {
        let layout = TaskCode::from(KnownTask::Layout);
        let def = TaskDefinition {
            requires: Some(vec![Requirement::document("Sketch")]),
            ..TaskDefinition::new(layout.clone(), "Layout", 1)
        };
        let table = RuleTable::for_blueprint(&Blueprint::new_unchecked("t", vec![def]));

        assert_eq!(table.requirements(&layout), vec![Requirement::document("Sketch")]);
        assert_eq!(
            table.requirements(&TaskCode::from(KnownTask::TotalBudget)),
            builtin_rule(KnownTask::TotalBudget)
        );
        assert!(table.requirements(&TaskCode::new("CUSTOM").unwrap()).is_empty());
    }
}
