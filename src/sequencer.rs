//! Dependency validation and execution ordering for one user's tasks.
//!
//! Pure and synchronous. Given every task configuration of one user it
//! decides which tasks survive and in what order they run:
//!
//! 1. Duplicate roles collapse: the last occurrence supplies the data and
//!    runnability, the first occurrence keeps its position.
//! 2. Tasks that are not runnable are dropped.
//! 3. Every [`DependencyRule`] is checked against the set of runnable roles
//!    as it was before any removal, so rules never cascade and their
//!    declaration order does not matter.
//! 4. Survivors are stably sorted by [`EmployeeRole::EXECUTION_ORDER`];
//!    roles outside the ordering go last in input order.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::employees::{EmployeeRole, TaskConfiguration};

/// If any dependent role is runnable, every required role must be runnable
/// too; otherwise all dependents are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyRule {
    pub name: &'static str,
    pub dependents: &'static [EmployeeRole],
    pub requires: &'static [EmployeeRole],
}

impl DependencyRule {
    /// Roles from `requires` that are absent from `present`, or `None` when
    /// the rule does not apply or is satisfied.
    fn missing(&self, present: &HashSet<EmployeeRole>) -> Option<Vec<EmployeeRole>> {
        if !self.dependents.iter().any(|role| present.contains(role)) {
            return None;
        }
        let missing: Vec<EmployeeRole> = self
            .requires
            .iter()
            .filter(|role| !present.contains(role))
            .copied()
            .collect();
        (!missing.is_empty()).then_some(missing)
    }
}

pub const DEPENDENCY_RULES: &[DependencyRule] = &[
    DependencyRule {
        name: "review-needs-creator",
        dependents: &[EmployeeRole::QaReviewer],
        requires: &[EmployeeRole::AdCreator],
    },
    DependencyRule {
        name: "copy-and-launch-together",
        dependents: &[EmployeeRole::Copywriter, EmployeeRole::AdLauncher],
        requires: &[EmployeeRole::Copywriter, EmployeeRole::AdLauncher],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The employee has no handler (unknown name).
    NoHandler,
    /// Configured, but its preconditions do not hold today.
    NotScheduled,
    /// A later block for the same role replaced this one.
    Superseded,
    MissingDependency {
        rule: &'static str,
        missing: Vec<EmployeeRole>,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoHandler => write!(f, "no handler for this employee"),
            SkipReason::NotScheduled => write!(f, "not scheduled to run today"),
            SkipReason::Superseded => write!(f, "superseded by a later block for the same role"),
            SkipReason::MissingDependency { rule, missing } => {
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                write!(f, "rule {rule}: missing {}", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTask {
    pub employee_name: String,
    pub role: EmployeeRole,
    pub reason: SkipReason,
}

impl SkippedTask {
    fn new(task: &TaskConfiguration, reason: SkipReason) -> Self {
        Self {
            employee_name: task.employee_name().to_string(),
            role: task.role(),
            reason,
        }
    }
}

/// Valid tasks in execution order, plus everything that was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub ordered: Vec<TaskConfiguration>,
    pub skipped: Vec<SkippedTask>,
}

/// Validates and orders `tasks` using [`DEPENDENCY_RULES`].
pub fn plan(tasks: Vec<TaskConfiguration>) -> ExecutionPlan {
    plan_with_rules(tasks, DEPENDENCY_RULES)
}

/// Validated tasks in execution order.
pub fn sequence(tasks: Vec<TaskConfiguration>) -> Vec<TaskConfiguration> {
    plan(tasks).ordered
}

pub fn plan_with_rules(tasks: Vec<TaskConfiguration>, rules: &[DependencyRule]) -> ExecutionPlan {
    let mut skipped = Vec::new();

    // Step 0: collapse duplicate roles. Unknown entries are distinct employees.
    let mut slots: Vec<TaskConfiguration> = Vec::with_capacity(tasks.len());
    let mut slot_of_role: HashMap<EmployeeRole, usize> = HashMap::new();
    for task in tasks {
        let role = task.role();
        if role == EmployeeRole::Unknown {
            slots.push(task);
            continue;
        }
        match slot_of_role.get(&role) {
            Some(&idx) => {
                let replaced = std::mem::replace(&mut slots[idx], task);
                skipped.push(SkippedTask::new(&replaced, SkipReason::Superseded));
            }
            None => {
                slot_of_role.insert(role, slots.len());
                slots.push(task);
            }
        }
    }

    // Step 1: runnable tasks only.
    let mut working = Vec::with_capacity(slots.len());
    for task in slots {
        if task.is_runnable() {
            working.push(task);
        } else {
            let reason = if task.config().is_none() {
                SkipReason::NoHandler
            } else {
                SkipReason::NotScheduled
            };
            skipped.push(SkippedTask::new(&task, reason));
        }
    }

    // Steps 2-3: evaluate all rules against one snapshot, then remove.
    let present: HashSet<EmployeeRole> = working.iter().map(TaskConfiguration::role).collect();
    let mut removals: HashMap<EmployeeRole, SkipReason> = HashMap::new();
    for rule in rules {
        if let Some(missing) = rule.missing(&present) {
            debug!(rule = rule.name, ?missing, "Dependency rule not satisfied");
            for role in rule.dependents {
                removals
                    .entry(*role)
                    .or_insert_with(|| SkipReason::MissingDependency {
                        rule: rule.name,
                        missing: missing.clone(),
                    });
            }
        }
    }
    let mut ordered = Vec::with_capacity(working.len());
    for task in working {
        match removals.get(&task.role()) {
            Some(reason) => skipped.push(SkippedTask::new(&task, reason.clone())),
            None => ordered.push(task),
        }
    }

    // Step 4: stable sort by execution rank.
    ordered.sort_by_key(|task| task.role().execution_rank().unwrap_or(usize::MAX));

    ExecutionPlan { ordered, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use serde_json::{Value, json};

    const WED: Weekday = Weekday::Wed;

    fn task(name: &str, block: Value, today: Weekday) -> TaskConfiguration {
        TaskConfiguration::new(name, serde_json::from_value(block).unwrap(), today)
    }

    fn marcus(today: Weekday) -> TaskConfiguration {
        task("marcus", json!({"adsPerDay": "3", "days": ["Mon", "Wed", "Fri"]}), today)
    }

    fn valentina() -> TaskConfiguration {
        task("valentina", json!({"spell": true}), WED)
    }

    fn avery() -> TaskConfiguration {
        task("avery", json!({"tone": "bold"}), WED)
    }

    fn cameron() -> TaskConfiguration {
        task("cameron", json!({"landingUrl": "https://shop.test"}), WED)
    }

    fn names(tasks: &[TaskConfiguration]) -> Vec<&str> {
        tasks.iter().map(TaskConfiguration::employee_name).collect()
    }

    fn roles(tasks: &[TaskConfiguration]) -> Vec<EmployeeRole> {
        tasks.iter().map(TaskConfiguration::role).collect()
    }

    #[test]
    fn full_roster_runs_in_fixed_order() {
        let out = sequence(vec![cameron(), valentina(), avery(), marcus(WED)]);
        assert_eq!(roles(&out), EmployeeRole::EXECUTION_ORDER.to_vec());
    }

    #[test]
    fn creator_and_reviewer_on_a_scheduled_day() {
        let out = sequence(vec![marcus(WED), valentina()]);
        assert_eq!(names(&out), vec!["marcus", "valentina"]);

        let out = sequence(vec![valentina(), marcus(WED)]);
        assert_eq!(names(&out), vec!["marcus", "valentina"]);
    }

    #[test]
    fn unscheduled_creator_takes_reviewer_with_it() {
        let tuesday_valentina = task("valentina", json!({"spell": true}), Weekday::Tue);
        let plan = plan(vec![marcus(Weekday::Tue), tuesday_valentina]);
        assert!(plan.ordered.is_empty());
        assert_eq!(plan.skipped.len(), 2);
        assert_eq!(plan.skipped[0].reason, SkipReason::NotScheduled);
        assert_eq!(
            plan.skipped[1].reason,
            SkipReason::MissingDependency {
                rule: "review-needs-creator",
                missing: vec![EmployeeRole::AdCreator],
            }
        );
    }

    #[test]
    fn reviewer_without_creator_is_removed() {
        assert!(sequence(vec![valentina()]).is_empty());
    }

    #[test]
    fn copywriter_without_launcher_removes_both() {
        let out = sequence(vec![marcus(WED), avery()]);
        assert_eq!(names(&out), vec!["marcus"]);

        let out = sequence(vec![cameron()]);
        assert!(out.is_empty());

        let out = sequence(vec![avery(), cameron()]);
        assert_eq!(names(&out), vec!["avery", "cameron"]);
    }

    #[test]
    fn non_runnable_companion_counts_as_absent() {
        let idle_launcher = task("cameron", json!({}), WED);
        let plan = plan(vec![avery(), idle_launcher]);
        // cameron is always runnable, so both survive
        assert_eq!(plan.ordered.len(), 2);

        let idle_creator = task("marcus", json!({"days": []}), WED);
        let plan = super::plan(vec![valentina(), idle_creator]);
        assert!(plan.ordered.is_empty());
    }

    #[test]
    fn output_only_contains_runnable_input_roles() {
        let input = vec![
            task("bob", json!({}), WED),
            marcus(Weekday::Sun),
            avery(),
            cameron(),
        ];
        let out = sequence(input.clone());
        for t in &out {
            assert!(t.is_runnable());
            assert!(input.iter().any(|i| i.employee_name() == t.employee_name()));
        }
        assert_eq!(names(&out), vec!["avery", "cameron"]);
    }

    #[test]
    fn unknown_roles_never_survive() {
        let plan = plan(vec![task("bob", json!({}), WED), task("alice", json!({}), WED)]);
        assert!(plan.ordered.is_empty());
        assert!(plan.skipped.iter().all(|s| s.reason == SkipReason::NoHandler));
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn sequencing_is_idempotent() {
        let input = vec![cameron(), valentina(), marcus(WED), avery()];
        let once = sequence(input.clone());
        let twice = sequence(input);
        assert_eq!(once, twice);
        assert_eq!(sequence(once.clone()), once);
    }

    #[test]
    fn duplicate_role_last_block_wins_first_position_kept() {
        // two AdLauncher blocks: the later one provides the data
        let early = task("cameron", json!({"landingUrl": "https://old.test"}), WED);
        let late = task("cameron", json!({"landingUrl": "https://new.test"}), WED);
        let plan = plan(vec![early, avery(), late.clone()]);

        assert_eq!(plan.ordered.len(), 2);
        assert_eq!(plan.ordered[1], late);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].reason, SkipReason::Superseded);
    }

    #[test]
    fn duplicate_role_uses_last_runnability() {
        let runnable = marcus(WED);
        let idle = task("marcus", json!({"days": ["Sun"]}), WED);
        let plan = plan(vec![runnable.clone(), valentina(), idle]);
        assert!(plan.ordered.is_empty());

        let plan = super::plan(vec![task("marcus", json!({"days": ["Sun"]}), WED), runnable]);
        assert_eq!(plan.ordered.len(), 1);
    }

    #[test]
    fn duplicates_collapse_without_rules() {
        let no_rules: &[DependencyRule] = &[];
        let plan = plan_with_rules(vec![avery(), task("bob", json!({}), WED), avery()], no_rules);
        assert_eq!(names(&plan.ordered), vec!["avery"]);
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn rules_are_evaluated_against_the_snapshot() {
        // reviewer needs creator; creator needs launcher. Without cascading,
        // removing the creator does not also remove the reviewer.
        const RULES: &[DependencyRule] = &[
            DependencyRule {
                name: "review-needs-creator",
                dependents: &[EmployeeRole::QaReviewer],
                requires: &[EmployeeRole::AdCreator],
            },
            DependencyRule {
                name: "creator-needs-launcher",
                dependents: &[EmployeeRole::AdCreator],
                requires: &[EmployeeRole::AdLauncher],
            },
        ];
        let forward = plan_with_rules(vec![marcus(WED), valentina()], RULES);
        assert_eq!(names(&forward.ordered), vec!["valentina"]);

        let reversed: Vec<DependencyRule> = RULES.iter().rev().copied().collect();
        let backward = plan_with_rules(vec![marcus(WED), valentina()], &reversed);
        assert_eq!(forward, backward);
    }

    #[test]
    fn skip_reason_display() {
        let reason = SkipReason::MissingDependency {
            rule: "copy-and-launch-together",
            missing: vec![EmployeeRole::AdLauncher],
        };
        assert_eq!(reason.to_string(), "rule copy-and-launch-together: missing AdLauncher");
    }
}
