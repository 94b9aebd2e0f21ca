//! Routes one detected failure to a remediation path and drives the oracle.
//!
//! ```text
//! Idle -> Analyzing ---------------> Completed | Failed
//! Idle -> RemediatingDirect -------> Completed | Failed
//! Idle -> RemediatingViaFixBranch -> Completed | Failed
//! ```
//!
//! The path is chosen from the mode and the branch name alone, before any
//! remote call. Oracle failures become a `Failed` outcome, never an `Err`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::config::AppConfig;
use crate::oracle::prompt::{self, FIX_MARKER, ROOT_CAUSE_MARKER};
use crate::oracle::{OracleMessage, OracleRequest, OracleStream, RemediationOracle};
use crate::platform::types::Repo;
use crate::triage::types::{
    BranchClass, FailureRecord, FixBranchRef, Mode, RemediationOutcome, RemediationStatus,
};

/// Accepted as an alternative to [`FIX_MARKER`].
const SUMMARY_MARKER: &str = "SUMMARY:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Analyzing,
    RemediatingDirect,
    RemediatingViaFixBranch,
    Completed,
    Failed,
}

/// Where the remediation's work lands, which decides how it is reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Analyze mode. Nothing was pushed.
    Analysis,
    /// Commits were pushed to the failing branch itself.
    Direct,
    /// Commits were pushed to a fresh fix branch off a protected branch.
    ViaFixBranch(FixBranchRef),
}

/// The path chosen for a failure, computed without network access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPlan {
    pub state: DispatchState,
    pub class: BranchClass,
    pub route: Route,
    pub checkout_branch: String,
    pub push_branch: Option<String>,
}

impl RemediationPlan {
    pub fn new(mode: Mode, branch: &str, now: DateTime<Utc>) -> Self {
        let class = BranchClass::classify(branch);

        let (state, route, push_branch) = match (mode, class) {
            (Mode::Analyze, _) => (DispatchState::Analyzing, Route::Analysis, None),
            (Mode::Triage, BranchClass::Unprotected) => (
                DispatchState::RemediatingDirect,
                Route::Direct,
                Some(branch.to_string()),
            ),
            (Mode::Triage, BranchClass::Protected) => {
                let fix = FixBranchRef::generate(branch, now);
                let push = fix.as_str().to_string();
                (
                    DispatchState::RemediatingViaFixBranch,
                    Route::ViaFixBranch(fix),
                    Some(push),
                )
            }
        };

        Self {
            state,
            class,
            route,
            checkout_branch: branch.to_string(),
            push_branch,
        }
    }
}

/// Everything the dispatcher decided and produced for one failure.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub plan: RemediationPlan,
    pub final_state: DispatchState,
    pub outcome: RemediationOutcome,
}

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub deadline: Duration,
    pub trace_base_url: Option<String>,
    pub max_log_chars: usize,
}

impl DispatcherSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            deadline: config.oracle_timeout(),
            trace_base_url: config.oracle.trace_base_url.clone(),
            max_log_chars: config.agent.max_log_chars,
        }
    }
}

pub struct RemediationDispatcher<'a> {
    oracle: &'a dyn RemediationOracle,
    settings: DispatcherSettings,
}

/// How the oracle stream ended.
enum Terminal {
    Result { is_error: bool, text: String },
    Exhausted,
    DeadlineExpired,
}

impl<'a> RemediationDispatcher<'a> {
    pub fn new(oracle: &'a dyn RemediationOracle, settings: DispatcherSettings) -> Self {
        Self { oracle, settings }
    }

    /// Run one failure through the state machine. Single use per failure.
    pub async fn dispatch(
        &self,
        repo: &Repo,
        mode: Mode,
        failure: &FailureRecord,
        logs: &str,
    ) -> Dispatch {
        let plan = RemediationPlan::new(mode, &failure.branch, Utc::now());
        log_transition(&failure.branch, DispatchState::Idle, plan.state);

        let logs = prompt::truncate_logs(logs, self.settings.max_log_chars);
        let prompt = match &plan.push_branch {
            None => prompt::system_prompt_for_analysis(repo, failure, &logs),
            Some(push) => prompt::system_prompt_for_remediation(repo, failure, &logs, push),
        };

        let request = OracleRequest {
            repo: repo.clone(),
            prompt,
            checkout_branch: plan.checkout_branch.clone(),
            push_branch: plan.push_branch.clone(),
        };

        let stream = self.oracle.run(request);
        let (session_id, terminal) = self.consume(&failure.branch, stream).await;
        let trace_url = session_id.map(|id| self.trace_url(&id));

        let outcome = match terminal {
            Terminal::Result {
                is_error: false,
                text,
            } => {
                let (root_cause, fix) = parse_result(&text);
                RemediationOutcome {
                    branch: failure.branch.clone(),
                    root_cause_or_status: root_cause,
                    summary_or_fix: fix,
                    trace_url,
                    status: RemediationStatus::Completed,
                }
            }
            Terminal::Result {
                is_error: true,
                text,
            } => failed_outcome(failure, "oracle reported an error", text, trace_url),
            Terminal::Exhausted => failed_outcome(
                failure,
                "oracle ended without a result",
                String::new(),
                trace_url,
            ),
            Terminal::DeadlineExpired => failed_outcome(
                failure,
                &format!(
                    "timed out after {}s",
                    self.settings.deadline.as_secs()
                ),
                String::new(),
                trace_url,
            ),
        };

        let final_state = if outcome.is_completed() {
            DispatchState::Completed
        } else {
            tracing::warn!(
                branch = %failure.branch,
                stage = "remediation",
                status = %outcome.root_cause_or_status,
                "Remediation failed"
            );
            DispatchState::Failed
        };
        log_transition(&failure.branch, plan.state, final_state);

        Dispatch {
            plan,
            final_state,
            outcome,
        }
    }

    /// Read messages until the first terminal one, the end of the stream,
    /// or the deadline. Returns the session id seen in `Init`, if any.
    async fn consume(&self, branch: &str, mut stream: OracleStream) -> (Option<String>, Terminal) {
        let mut session_id = None;

        let read = async {
            while let Some(message) = stream.next().await {
                match message {
                    OracleMessage::Init { session_id: id } => {
                        tracing::info!(branch = branch, session_id = %id, "Oracle session started");
                        session_id = Some(id);
                    }
                    OracleMessage::Progress { text } => {
                        tracing::debug!(branch = branch, progress = %text, "Oracle progress");
                    }
                    OracleMessage::Result { is_error, text } => {
                        return Terminal::Result { is_error, text };
                    }
                }
            }
            Terminal::Exhausted
        };

        let terminal = match tokio::time::timeout(self.settings.deadline, read).await {
            Ok(terminal) => terminal,
            Err(_) => Terminal::DeadlineExpired,
        };

        (session_id, terminal)
    }

    fn trace_url(&self, session_id: &str) -> String {
        match &self.settings.trace_base_url {
            Some(base) => format!("{}/{session_id}", base.trim_end_matches('/')),
            None => session_id.to_string(),
        }
    }
}

fn log_transition(branch: &str, from: DispatchState, to: DispatchState) {
    tracing::info!(branch = branch, from = ?from, to = ?to, "Dispatcher transition");
}

fn failed_outcome(
    failure: &FailureRecord,
    reason: &str,
    text: String,
    trace_url: Option<String>,
) -> RemediationOutcome {
    RemediationOutcome {
        branch: failure.branch.clone(),
        root_cause_or_status: format!("Remediation failed for {}: {reason}", failure.branch),
        summary_or_fix: text,
        trace_url,
        status: RemediationStatus::Failed {
            reason: reason.to_string(),
        },
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    RootCause,
    Fix,
}

/// Split the oracle's final answer into `(root cause, fix summary)`.
///
/// Sections start at lines beginning with `ROOT CAUSE:` and `FIX:` (or
/// `SUMMARY:`), optionally wrapped in markdown emphasis or headings. Without
/// markers the whole text is the summary.
pub fn parse_result(text: &str) -> (String, String) {
    let mut root_cause = Vec::new();
    let mut fix = Vec::new();
    let mut current = None;

    for line in text.lines() {
        let stripped = line.trim_start_matches(|c: char| c == '*' || c == '#' || c.is_whitespace());

        if let Some(rest) = strip_marker(stripped, ROOT_CAUSE_MARKER) {
            current = Some(Section::RootCause);
            root_cause.push(rest);
        } else if let Some(rest) =
            strip_marker(stripped, FIX_MARKER).or_else(|| strip_marker(stripped, SUMMARY_MARKER))
        {
            current = Some(Section::Fix);
            fix.push(rest);
        } else {
            match current {
                Some(Section::RootCause) => root_cause.push(line),
                Some(Section::Fix) => fix.push(line),
                None => {}
            }
        }
    }

    let root_cause = root_cause.join("\n").trim().to_string();
    let fix = fix.join("\n").trim().to_string();

    match (root_cause.is_empty(), fix.is_empty()) {
        (true, true) => (
            "Root cause not reported separately".to_string(),
            text.trim().to_string(),
        ),
        (false, true) => (root_cause, "No fix summary reported".to_string()),
        (true, false) => ("Root cause not reported separately".to_string(), fix),
        (false, false) => (root_cause, fix),
    }
}

fn strip_marker<'t>(line: &'t str, marker: &str) -> Option<&'t str> {
    line.strip_prefix(marker)
        .map(|rest| rest.trim_start_matches(|c: char| c == '*' || c.is_whitespace()))
}
