//! Interface de terminal do adcrew: spinner de lote e relatórios coloridos.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] acompanha visualmente a
//! execução de um lote; as funções `print_*` exibem relatórios em texto ou
//! JSON.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::employees::EmployeeRole;
use crate::scheduler::BatchReport;
use crate::sequencer::{DEPENDENCY_RULES, ExecutionPlan, SkippedTask};

/// Indicador visual de progresso para um lote de usuários.
pub struct BatchProgress {
    pb: ProgressBar,
    total: usize,
}

impl BatchProgress {
    /// Inicia o spinner para `total` usuários.
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_length(total as u64);
        pb.set_message("processing users");
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb, total }
    }

    /// Marca um usuário como concluído.
    pub fn user_finished(&self, user_id: &str) {
        self.pb.inc(1);
        self.pb.set_message(format!("finished {user_id}"));
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
        println!("  Processed {} users", self.total);
    }
}

/// Imprime o resumo do lote: uma linha por tarefa e as falhas por usuário.
pub fn print_report(report: &BatchReport, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        return;
    }

    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let dim = Style::new().dim();

    for user in &report.users {
        println!("{}", Style::new().bold().apply_to(&user.user_id));
        if user.outcomes.is_empty() {
            println!("  {}", dim.apply_to("nothing to run"));
        }
        for outcome in &user.outcomes {
            if outcome.succeeded {
                let detail = outcome
                    .report
                    .as_ref()
                    .map(|r| r.detail.as_str())
                    .unwrap_or_default();
                println!(
                    "  {} {} ({}) {} {}",
                    green.apply_to("✓"),
                    outcome.employee_name,
                    outcome.role,
                    detail,
                    dim.apply_to(format!("{}ms", outcome.duration_ms))
                );
            } else {
                println!(
                    "  {} {} ({}) {}",
                    red.apply_to("✗"),
                    outcome.employee_name,
                    outcome.role,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    for failure in &report.failures {
        println!(
            "{} {}: {}",
            red.apply_to("✗"),
            failure.user_id,
            failure.reason
        );
    }

    println!();
    println!(
        "{} tasks succeeded, {} failed, {} users aborted",
        report.tasks_succeeded(),
        report.tasks_failed(),
        report.failures.len()
    );
}

/// Visão serializável do plano de um usuário.
#[derive(Debug, Serialize)]
pub struct PlanSummary<'a> {
    pub user_id: &'a str,
    pub ordered: Vec<String>,
    pub skipped: &'a [SkippedTask],
}

impl<'a> PlanSummary<'a> {
    pub fn new(user_id: &'a str, plan: &'a ExecutionPlan) -> Self {
        Self {
            user_id,
            ordered: plan
                .ordered
                .iter()
                .map(|t| t.employee_name().to_string())
                .collect(),
            skipped: &plan.skipped,
        }
    }
}

/// Imprime a ordem de execução e as tarefas descartadas de cada usuário.
pub fn print_plans(plans: &[PlanSummary<'_>], failures: &[(String, String)], json: bool) {
    if json {
        let value = serde_json::json!({
            "plans": plans,
            "failures": failures
                .iter()
                .map(|(user_id, reason)| serde_json::json!({"user_id": user_id, "reason": reason}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return;
    }

    let yellow = Style::new().yellow();
    let red = Style::new().red().bold();
    let dim = Style::new().dim();

    for plan in plans {
        println!("{}", Style::new().bold().apply_to(plan.user_id));
        if plan.ordered.is_empty() {
            println!("  {}", dim.apply_to("nothing to run"));
        }
        for (position, name) in plan.ordered.iter().enumerate() {
            println!("  {}. {name}", position + 1);
        }
        for skipped in plan.skipped {
            println!(
                "  {} {}: {}",
                yellow.apply_to("-"),
                skipped.employee_name,
                dim.apply_to(&skipped.reason)
            );
        }
    }
    for (user_id, reason) in failures {
        println!("{} {user_id}: {reason}", red.apply_to("✗"));
    }
}

/// Lista os funcionários, a ordem de execução e as regras de dependência.
pub fn print_roles(json: bool) {
    if json {
        let value = serde_json::json!({
            "roster": EmployeeRole::ROSTER
                .iter()
                .map(|(name, role)| serde_json::json!({"employee": name, "role": role.to_string()}))
                .collect::<Vec<_>>(),
            "execution_order": EmployeeRole::EXECUTION_ORDER
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "rules": DEPENDENCY_RULES
                .iter()
                .map(|rule| serde_json::json!({
                    "name": rule.name,
                    "dependents": rule.dependents.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "requires": rule.requires.iter().map(ToString::to_string).collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return;
    }

    let bold = Style::new().bold();
    println!("{}", bold.apply_to("Employees"));
    for (name, role) in EmployeeRole::ROSTER {
        println!("  {name:<10} {role}");
    }

    println!("{}", bold.apply_to("Execution order"));
    let order: Vec<String> = EmployeeRole::EXECUTION_ORDER
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("  {}", order.join(" -> "));

    println!("{}", bold.apply_to("Dependency rules"));
    for rule in DEPENDENCY_RULES {
        let join = |roles: &[EmployeeRole]| {
            roles
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "  {}: {} requires {}",
            rule.name,
            join(rule.dependents),
            join(rule.requires)
        );
    }
}
