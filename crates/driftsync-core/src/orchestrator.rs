//! Step orchestrator
//!
//! Sequences a batch of module invocations and enforces the
//! check-before-apply discipline: `Ok` needs no action and `Failed` is
//! never blindly "fixed", so apply runs only for `Missing` and `Drifted`
//! steps (and only when the step passes the optional label filter).
//!
//! Steps run strictly sequentially. Modules may target overlapping
//! backup-owner namespaces, and the retention logic is not safe under
//! concurrent mutation of one owner directory.

use std::collections::HashSet;

use crate::modules::{ApplyResult, CheckResult, ModuleStatus, SyncModule};

/// One unit of reconciliation work. Params are opaque to the orchestrator;
/// only the module knows how to interpret them.
pub struct OrchestratorStep {
    pub label: String,
    pub module: Box<dyn SyncModule>,
}

impl OrchestratorStep {
    pub fn new(label: impl Into<String>, module: Box<dyn SyncModule>) -> Self {
        Self {
            label: label.into(),
            module,
        }
    }
}

/// Per-step outcome: the check result, and the apply result when apply ran.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub label: String,
    pub check: CheckResult,
    pub apply: Option<ApplyResult>,
}

/// Aggregate tallies across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ok: usize,
    pub missing: usize,
    pub drifted: usize,
    pub failed: usize,
    /// Steps whose apply reported `changed: true`
    pub changed: usize,
}

/// Ordered outcomes plus the summary tally.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<StepOutcome>,
    pub summary: RunSummary,
}

impl RunReport {
    fn from_outcomes(outcomes: Vec<StepOutcome>) -> Self {
        let mut summary = RunSummary::default();
        for outcome in &outcomes {
            match outcome.check.status {
                ModuleStatus::Ok => summary.ok += 1,
                ModuleStatus::Missing => summary.missing += 1,
                ModuleStatus::Drifted => summary.drifted += 1,
                ModuleStatus::Failed => summary.failed += 1,
            }
            if outcome.apply.as_ref().is_some_and(|a| a.changed) {
                summary.changed += 1;
            }
        }
        Self { outcomes, summary }
    }
}

/// Check every step in order. Never calls apply.
pub fn run_check(steps: &[OrchestratorStep]) -> RunReport {
    let outcomes = steps
        .iter()
        .map(|step| {
            let check = step.module.check();
            tracing::debug!(label = %step.label, status = ?check.status, "checked step");
            StepOutcome {
                label: step.label.clone(),
                check,
                apply: None,
            }
        })
        .collect();
    RunReport::from_outcomes(outcomes)
}

/// Check every step and apply the ones that need it.
///
/// Apply runs if and only if the check returned `Missing` or `Drifted`
/// and the step's label passes `filter` (no filter admits every label).
/// A failing apply is recorded and the batch continues; prior successful
/// steps stay applied.
pub fn run_apply(steps: &[OrchestratorStep], filter: Option<&HashSet<String>>) -> RunReport {
    let mut outcomes = Vec::with_capacity(steps.len());

    for step in steps {
        let check = step.module.check();

        let selected = filter.is_none_or(|labels| labels.contains(&step.label));
        let actionable = matches!(check.status, ModuleStatus::Missing | ModuleStatus::Drifted);

        let apply = if selected && actionable {
            let result = step.module.apply();
            tracing::info!(
                label = %step.label,
                changed = result.changed,
                error = result.error.as_deref().unwrap_or(""),
                "applied step"
            );
            Some(result)
        } else {
            tracing::debug!(label = %step.label, status = ?check.status, "skipped apply");
            None
        };

        outcomes.push(StepOutcome {
            label: step.label.clone(),
            check,
            apply,
        });
    }

    RunReport::from_outcomes(outcomes)
}
