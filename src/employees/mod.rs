//! The AI employee roster and per-employee task configuration.
//!
//! Each employee name resolves to an [`EmployeeRole`]. Roles with a handler
//! carry a [`RoleConfig`] built from the raw configuration block; that config
//! decides whether the task is due today and knows how to execute it.

mod ad_creator;
mod ad_launcher;
mod copywriter;
mod qa_reviewer;
pub mod raw;

use std::fmt;
use std::future::Future;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

pub use ad_creator::{AdCreatorConfig, MAX_ADS_PER_RUN};
pub use ad_launcher::{AdLauncherConfig, DEFAULT_CALL_TO_ACTION};
pub use copywriter::CopywriterConfig;
pub use qa_reviewer::{QaChecks, QaReviewerConfig, Verdict};
use raw::{RawConfig, RawMap};

use crate::error::ExecutionFailure;
use crate::services::{ExecutionContext, TaskReport};

/// The closed set of task kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmployeeRole {
    AdCreator,
    QaReviewer,
    Copywriter,
    AdLauncher,
    Unknown,
}

impl EmployeeRole {
    /// Employee names and the role each one fills.
    pub const ROSTER: [(&'static str, EmployeeRole); 4] = [
        ("marcus", EmployeeRole::AdCreator),
        ("valentina", EmployeeRole::QaReviewer),
        ("avery", EmployeeRole::Copywriter),
        ("cameron", EmployeeRole::AdLauncher),
    ];

    /// Roles in the order they must run for one user.
    pub const EXECUTION_ORDER: [EmployeeRole; 4] = [
        EmployeeRole::AdCreator,
        EmployeeRole::QaReviewer,
        EmployeeRole::Copywriter,
        EmployeeRole::AdLauncher,
    ];

    /// Exact-match lookup; anything unrecognised is [`EmployeeRole::Unknown`].
    pub fn from_employee_name(name: &str) -> Self {
        Self::ROSTER
            .iter()
            .find(|(employee, _)| *employee == name)
            .map(|(_, role)| *role)
            .unwrap_or(EmployeeRole::Unknown)
    }

    /// Position in [`EXECUTION_ORDER`](Self::EXECUTION_ORDER), `None` for
    /// roles outside the ordering.
    pub fn execution_rank(self) -> Option<usize> {
        Self::EXECUTION_ORDER.iter().position(|role| *role == self)
    }

    pub fn employee_name(self) -> Option<&'static str> {
        Self::ROSTER
            .iter()
            .find(|(_, role)| *role == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for EmployeeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmployeeRole::AdCreator => write!(f, "AdCreator"),
            EmployeeRole::QaReviewer => write!(f, "QAReviewer"),
            EmployeeRole::Copywriter => write!(f, "Copywriter"),
            EmployeeRole::AdLauncher => write!(f, "AdLauncher"),
            EmployeeRole::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Capability set shared by every role-specific configuration.
pub trait Employee: Sized {
    const ROLE: EmployeeRole;

    /// Total: missing or ill-typed fields take their defaults.
    fn from_raw(raw: &RawConfig<'_>) -> Self;

    fn is_runnable(&self, today: Weekday) -> bool;

    fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
    ) -> impl Future<Output = Result<TaskReport, ExecutionFailure>> + Send;
}

/// Role-specific configuration, one variant per role with a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleConfig {
    AdCreator(AdCreatorConfig),
    QaReviewer(QaReviewerConfig),
    Copywriter(CopywriterConfig),
    AdLauncher(AdLauncherConfig),
}

impl RoleConfig {
    /// Builds the variant for `role`, or `None` when the role has no handler.
    pub fn from_raw(role: EmployeeRole, raw: &RawMap) -> Option<Self> {
        let raw = RawConfig::new(raw);
        match role {
            EmployeeRole::AdCreator => Some(Self::AdCreator(AdCreatorConfig::from_raw(&raw))),
            EmployeeRole::QaReviewer => Some(Self::QaReviewer(QaReviewerConfig::from_raw(&raw))),
            EmployeeRole::Copywriter => Some(Self::Copywriter(CopywriterConfig::from_raw(&raw))),
            EmployeeRole::AdLauncher => Some(Self::AdLauncher(AdLauncherConfig::from_raw(&raw))),
            EmployeeRole::Unknown => None,
        }
    }

    pub fn role(&self) -> EmployeeRole {
        match self {
            Self::AdCreator(_) => AdCreatorConfig::ROLE,
            Self::QaReviewer(_) => QaReviewerConfig::ROLE,
            Self::Copywriter(_) => CopywriterConfig::ROLE,
            Self::AdLauncher(_) => AdLauncherConfig::ROLE,
        }
    }

    pub fn is_runnable(&self, today: Weekday) -> bool {
        match self {
            Self::AdCreator(c) => c.is_runnable(today),
            Self::QaReviewer(c) => c.is_runnable(today),
            Self::Copywriter(c) => c.is_runnable(today),
            Self::AdLauncher(c) => c.is_runnable(today),
        }
    }

    pub async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<TaskReport, ExecutionFailure> {
        match self {
            Self::AdCreator(c) => c.execute(ctx).await,
            Self::QaReviewer(c) => c.execute(ctx).await,
            Self::Copywriter(c) => c.execute(ctx).await,
            Self::AdLauncher(c) => c.execute(ctx).await,
        }
    }
}

/// One employee's configuration block for one user in one batch run.
///
/// Built once per batch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfiguration {
    employee_name: String,
    role: EmployeeRole,
    raw: RawMap,
    config: Option<RoleConfig>,
    runnable: bool,
}

impl TaskConfiguration {
    /// Resolves the role, builds its config and evaluates runnability for
    /// `today`. Never fails.
    pub fn new(employee_name: impl Into<String>, raw: RawMap, today: Weekday) -> Self {
        let employee_name = employee_name.into();
        let role = EmployeeRole::from_employee_name(&employee_name);
        let config = RoleConfig::from_raw(role, &raw);
        let runnable = config.as_ref().is_some_and(|c| c.is_runnable(today));
        Self {
            employee_name,
            role,
            raw,
            config,
            runnable,
        }
    }

    pub fn employee_name(&self) -> &str {
        &self.employee_name
    }

    pub fn role(&self) -> EmployeeRole {
        self.role
    }

    pub fn raw(&self) -> &RawMap {
        &self.raw
    }

    pub fn config(&self) -> Option<&RoleConfig> {
        self.config.as_ref()
    }

    pub fn is_runnable(&self) -> bool {
        self.runnable
    }
}
