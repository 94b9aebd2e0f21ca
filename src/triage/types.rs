use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Non-success terminal conclusions that count as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Failure,
    TimedOut,
    ActionRequired,
}

impl Conclusion {
    /// Parse a GitHub run conclusion. Anything that is not a failure
    /// (`success`, `neutral`, `skipped`, `cancelled`, ...) yields `None`.
    pub fn from_api(conclusion: &str) -> Option<Self> {
        match conclusion {
            "failure" => Some(Conclusion::Failure),
            "timed_out" => Some(Conclusion::TimedOut),
            "action_required" => Some(Conclusion::ActionRequired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Conclusion::Failure => "failure",
            Conclusion::TimedOut => "timed_out",
            Conclusion::ActionRequired => "action_required",
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "This branch's most recent completed run did not succeed."
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub branch: String,
    pub commit_sha: String,
    pub run_id: u64,
    pub workflow_name: String,
    pub conclusion: Conclusion,
    pub run_url: String,
    pub created_at: DateTime<Utc>,
}

/// Whether automation may push to a branch directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchClass {
    Protected,
    Unprotected,
}

impl BranchClass {
    /// Pure function of the name; never touches the network.
    pub fn classify(branch: &str) -> Self {
        match branch {
            "main" | "master" => BranchClass::Protected,
            _ => BranchClass::Unprotected,
        }
    }
}

/// A `fix/triage-{source}-{timestamp}` branch created for a protected source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixBranchRef(String);

impl FixBranchRef {
    pub fn generate(source_branch: &str, now: DateTime<Utc>) -> Self {
        Self(format!("fix/triage-{source_branch}-{}", now.timestamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FixBranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which command is driving the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report the root cause only. No pushes, no PRs.
    Analyze,
    /// Fix the failure and reconcile it into source control.
    Triage,
}

/// Terminal state of a remediation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationStatus {
    Completed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationOutcome {
    pub branch: String,
    /// Root cause on success, human-readable status on failure.
    pub root_cause_or_status: String,
    /// Fix summary on success, oracle text (if any) on failure.
    pub summary_or_fix: String,
    pub trace_url: Option<String>,
    pub status: RemediationStatus,
}

impl RemediationOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == RemediationStatus::Completed
    }
}
