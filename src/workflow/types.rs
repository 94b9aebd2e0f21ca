use std::fmt;

use crate::triage::dispatcher::Dispatch;
use crate::triage::reconciler::Reconciliation;
use crate::triage::types::{FailureRecord, Mode, RemediationStatus};

/// Result of one CLI command, printed to stdout.
#[derive(Debug)]
pub enum CommandReport {
    /// `list`: every branch whose latest completed run failed.
    Failures(Vec<FailureRecord>),
    /// `analyze`/`triage` on a branch whose latest completed run did not fail.
    NoFailure { branch: String },
    /// `analyze`/`triage` ran the oracle.
    Remediation(Box<RemediationReport>),
}

#[derive(Debug)]
pub struct RemediationReport {
    pub mode: Mode,
    pub failure: FailureRecord,
    pub dispatch: Dispatch,
    /// `None` in analyze mode.
    pub reconciliation: Option<Reconciliation>,
}

impl fmt::Display for CommandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandReport::Failures(failures) if failures.is_empty() => {
                writeln!(f, "No failing branches found.")
            }
            CommandReport::Failures(failures) => {
                writeln!(f, "{} failing branch(es):", failures.len())?;
                for failure in failures {
                    writeln!(
                        f,
                        "  {}\t{}\t{}\t{}",
                        failure.branch, failure.workflow_name, failure.conclusion, failure.run_url
                    )?;
                }
                Ok(())
            }
            CommandReport::NoFailure { branch } => {
                writeln!(f, "Latest completed run on {branch} did not fail; nothing to do.")
            }
            CommandReport::Remediation(report) => fmt::Display::fmt(report, f),
        }
    }
}

impl fmt::Display for RemediationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = &self.dispatch.outcome;

        writeln!(
            f,
            "Branch: {} ({} in {}, {})",
            self.failure.branch,
            self.failure.conclusion,
            self.failure.workflow_name,
            self.failure.run_url
        )?;
        if let Some(push) = &self.dispatch.plan.push_branch {
            if outcome.is_completed() {
                writeln!(f, "Pushed to: {push}")?;
            } else {
                writeln!(f, "Push target (not pushed): {push}")?;
            }
        }
        if let Some(trace) = &outcome.trace_url {
            writeln!(f, "Trace: {trace}")?;
        }

        match &outcome.status {
            RemediationStatus::Completed => {
                writeln!(f, "\nRoot cause:\n{}", outcome.root_cause_or_status)?;
                let heading = match self.mode {
                    Mode::Analyze => "Suggested fix",
                    Mode::Triage => "Fix",
                };
                writeln!(f, "\n{heading}:\n{}", outcome.summary_or_fix)?;
            }
            RemediationStatus::Failed { .. } => {
                writeln!(f, "\n{}", outcome.root_cause_or_status)?;
                if !outcome.summary_or_fix.is_empty() {
                    writeln!(f, "{}", outcome.summary_or_fix)?;
                }
            }
        }

        if let Some(reconciliation) = &self.reconciliation {
            writeln!(f, "\n{reconciliation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::triage::dispatcher::{DispatchState, RemediationPlan};
    use crate::triage::types::{Conclusion, RemediationOutcome};

    fn report(status: RemediationStatus) -> RemediationReport {
        let plan = RemediationPlan::new(Mode::Triage, "feature/x", Utc::now());
        let final_state = match status {
            RemediationStatus::Completed => DispatchState::Completed,
            RemediationStatus::Failed { .. } => DispatchState::Failed,
        };
        RemediationReport {
            mode: Mode::Triage,
            failure: FailureRecord {
                branch: "feature/x".to_string(),
                commit_sha: "abc".to_string(),
                run_id: 1,
                workflow_name: "CI".to_string(),
                conclusion: Conclusion::Failure,
                run_url: "https://github.com/o/r/actions/runs/1".to_string(),
                created_at: Utc::now(),
            },
            dispatch: Dispatch {
                plan,
                final_state,
                outcome: RemediationOutcome {
                    branch: "feature/x".to_string(),
                    root_cause_or_status: "Remediation failed for feature/x: rejected".to_string(),
                    summary_or_fix: String::new(),
                    trace_url: None,
                    status,
                },
            },
            reconciliation: None,
        }
    }

    #[test]
    fn test_failed_remediation_does_not_claim_a_push() {
        let rendered = report(RemediationStatus::Failed {
            reason: "oracle reported an error".to_string(),
        })
        .to_string();
        assert!(!rendered.contains("Pushed to"));
        assert!(rendered.contains("Push target (not pushed): feature/x"));
    }

    #[test]
    fn test_completed_remediation_reports_push() {
        let rendered = report(RemediationStatus::Completed).to_string();
        assert!(rendered.contains("Pushed to: feature/x"));
    }
}
