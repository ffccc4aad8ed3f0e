// src/config/builtin.rs

//! The built-in store-opening blueprint.

use crate::config::model::{Blueprint, TaskDefinition};
use crate::types::{KnownTask, TaskCode};

const PROJECT_MANAGER: &str = "project_manager";
const SITE_MANAGER: &str = "site_manager";

fn def(
    task: KnownTask,
    name: &str,
    duration_days: u32,
    depends_on: &[KnownTask],
    role: &str,
    stage: &str,
) -> TaskDefinition {
    TaskDefinition {
        depends_on: depends_on.iter().map(|&t| TaskCode::from(t)).collect(),
        responsible_role: Some(role.to_string()),
        stage: Some(stage.to_string()),
        ..TaskDefinition::new(TaskCode::from(task), name, duration_days)
    }
}

impl Blueprint {
    /// Standard store-opening workflow used by projects without a template.
    ///
    /// Audit preparation and the object audit come first, then licensing,
    /// waste site and the planning contour branch off in parallel; design
    /// work hangs off the contour and the budget chain closes the project.
    pub fn store_opening() -> Self {
        use KnownTask::*;

        let tasks = vec![
            def(PrepAudit, "Audit preparation", 2, &[], PROJECT_MANAGER, "Initiation"),
            def(Audit, "Object audit", 1, &[PrepAudit], PROJECT_MANAGER, "Audit"),
            def(AlcoholLicense, "Alcohol license", 2, &[Audit], PROJECT_MANAGER, "Licensing"),
            def(Waste, "Waste collection site", 2, &[Audit], PROJECT_MANAGER, "Waste"),
            def(Contour, "Planning contour", 1, &[Audit], SITE_MANAGER, "Design"),
            def(Visualization, "Visualization", 1, &[Contour], PROJECT_MANAGER, "Design"),
            def(Logistics, "Logistics assessment", 2, &[Contour], SITE_MANAGER, "Logistics"),
            def(Layout, "Equipment layout", 2, &[Contour], SITE_MANAGER, "Design"),
            def(
                BudgetEquipment,
                "Equipment budget",
                2,
                &[Visualization, Layout],
                SITE_MANAGER,
                "Budget",
            ),
            def(BudgetSecurity, "Security budget", 2, &[Layout], SITE_MANAGER, "Budget"),
            def(
                BudgetRsr,
                "Repair works brief and budget",
                1,
                &[BudgetSecurity],
                SITE_MANAGER,
                "Budget",
            ),
            def(
                BudgetPis,
                "Fixtures and signage budget",
                1,
                &[BudgetRsr, BudgetEquipment],
                SITE_MANAGER,
                "Budget",
            ),
            def(TotalBudget, "Total project budget", 1, &[BudgetPis], PROJECT_MANAGER, "Budget"),
        ];

        Blueprint::new_unchecked("store-opening", tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate::validate_blueprint;

    #[test]
    fn builtin_blueprint_is_valid_and_topologically_ordered() {
        let bp = Blueprint::store_opening();
        validate_blueprint(&bp).expect("built-in blueprint must validate");
        assert_eq!(bp.len(), KnownTask::ALL.len());

        for def in bp.definitions() {
            let pos = bp.position(def.code.as_str()).unwrap();
            for dep in &def.depends_on {
                assert!(bp.position(dep.as_str()).unwrap() < pos, "{dep} after {}", def.code);
            }
        }
    }

    #[test]
    fn only_audit_preparation_is_a_root() {
        let bp = Blueprint::store_opening();
        let roots: Vec<_> = bp
            .definitions()
            .iter()
            .filter(|d| d.depends_on.is_empty())
            .map(|d| d.code.as_str())
            .collect();
        assert_eq!(roots, vec!["TASK-PREP-AUDIT"]);
    }
}
