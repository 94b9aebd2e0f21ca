//! In-memory platform and scripted oracle for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;

use crate::error::{AppError, Result};
use crate::oracle::{OracleMessage, OracleRequest, OracleStream, RemediationOracle};
use crate::platform::types::{CreatePullRequest, PullRequest, Repo, WorkflowRun};
use crate::platform::Platform;

/// A completed run on `branch` with the given conclusion.
pub fn run(branch: &str, conclusion: Option<&str>) -> WorkflowRun {
    let id = 1000 + branch.len() as u64;
    WorkflowRun {
        id,
        name: "CI".to_string(),
        head_branch: branch.to_string(),
        head_sha: format!("sha-{branch}"),
        status: "completed".to_string(),
        conclusion: conclusion.map(str::to_string),
        html_url: format!("https://github.com/o/r/actions/runs/{id}"),
        created_at: Utc::now(),
    }
}

/// Every gateway call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListBranches,
    DefaultBranch,
    LatestRun(String),
    JobLogs(u64),
    FindOpenPr(String),
    CreatePr { head: String, base: String },
    Comment { pr_number: u64, body: String },
}

impl Call {
    pub fn is_pr_management(&self) -> bool {
        matches!(
            self,
            Call::FindOpenPr(_) | Call::CreatePr { .. } | Call::Comment { .. }
        )
    }
}

#[derive(Default)]
pub struct FakePlatform {
    branches: Vec<String>,
    list_branches_fails: bool,
    default_branch: Option<String>,
    runs: HashMap<String, WorkflowRun>,
    run_errors: HashSet<String>,
    logs: Option<String>,
    open_prs: HashMap<String, PullRequest>,
    pr_calls_fail: bool,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branches(mut self, branches: &[&str]) -> Self {
        self.branches = branches.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn failing_list_branches(mut self) -> Self {
        self.list_branches_fails = true;
        self
    }

    pub fn with_default_branch(mut self, branch: &str) -> Self {
        self.default_branch = Some(branch.to_string());
        self
    }

    pub fn with_run(mut self, branch: &str, conclusion: &str) -> Self {
        self.runs
            .insert(branch.to_string(), run(branch, Some(conclusion)));
        self
    }

    pub fn with_run_error(mut self, branch: &str) -> Self {
        self.run_errors.insert(branch.to_string());
        self
    }

    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = Some(logs.to_string());
        self
    }

    pub fn with_open_pr(mut self, head: &str, number: u64) -> Self {
        self.open_prs.insert(
            head.to_string(),
            PullRequest {
                number,
                html_url: format!("https://github.com/o/r/pull/{number}"),
                head_branch: head.to_string(),
                base_branch: "main".to_string(),
            },
        );
        self
    }

    pub fn failing_pr_calls(mut self) -> Self {
        self.pr_calls_fail = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pr_management_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_pr_management)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn pr_error(&self) -> Result<()> {
        if self.pr_calls_fail {
            Err(AppError::GitHubApi("502 Bad Gateway".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn list_branches(&self, _repo: &Repo) -> Result<Vec<String>> {
        self.record(Call::ListBranches);
        if self.list_branches_fails {
            return Err(AppError::GitHubApi("500 Internal Server Error".to_string()));
        }
        Ok(self.branches.clone())
    }

    async fn get_default_branch(&self, _repo: &Repo) -> Result<String> {
        self.record(Call::DefaultBranch);
        self.default_branch
            .clone()
            .ok_or_else(|| AppError::GitHubApi("404 Not Found".to_string()))
    }

    async fn get_latest_completed_run(
        &self,
        _repo: &Repo,
        branch: &str,
    ) -> Result<Option<WorkflowRun>> {
        self.record(Call::LatestRun(branch.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Let sibling tasks in the batch start before this one finishes
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.run_errors.contains(branch) {
            return Err(AppError::GitHubApi("403 rate limit exceeded".to_string()));
        }
        Ok(self.runs.get(branch).cloned())
    }

    async fn get_failed_job_logs(&self, _repo: &Repo, run_id: u64) -> Result<String> {
        self.record(Call::JobLogs(run_id));
        self.logs
            .clone()
            .ok_or_else(|| AppError::GitHubApi("410 Gone".to_string()))
    }

    async fn find_open_pull_request(
        &self,
        _repo: &Repo,
        branch: &str,
    ) -> Result<Option<PullRequest>> {
        self.record(Call::FindOpenPr(branch.to_string()));
        self.pr_error()?;
        Ok(self.open_prs.get(branch).cloned())
    }

    async fn create_pull_request(
        &self,
        _repo: &Repo,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        self.record(Call::CreatePr {
            head: pr.head_branch.clone(),
            base: pr.base_branch.clone(),
        });
        self.pr_error()?;
        Ok(PullRequest {
            number: 77,
            html_url: "https://github.com/o/r/pull/77".to_string(),
            head_branch: pr.head_branch.clone(),
            base_branch: pr.base_branch.clone(),
        })
    }

    async fn post_comment(&self, _repo: &Repo, pr_number: u64, body: &str) -> Result<()> {
        self.record(Call::Comment {
            pr_number,
            body: body.to_string(),
        });
        self.pr_error()
    }
}

/// Oracle that replays a fixed message sequence and records its requests.
pub struct ScriptedOracle {
    script: Vec<OracleMessage>,
    hang_after_script: bool,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<OracleMessage>) -> Self {
        Self {
            script,
            hang_after_script: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `init`, one progress message, then a successful result with `text`.
    pub fn succeeding(text: &str) -> Self {
        Self::new(vec![
            OracleMessage::Init {
                session_id: "sess-1".to_string(),
            },
            OracleMessage::Progress {
                text: "Reading logs".to_string(),
            },
            OracleMessage::Result {
                is_error: false,
                text: text.to_string(),
            },
        ])
    }

    /// Never sends anything after the script runs out.
    pub fn hanging(script: Vec<OracleMessage>) -> Self {
        Self {
            hang_after_script: true,
            ..Self::new(script)
        }
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl RemediationOracle for ScriptedOracle {
    fn run(&self, request: OracleRequest) -> OracleStream {
        self.requests.lock().unwrap().push(request);

        let scripted = futures::stream::iter(self.script.clone());
        if self.hang_after_script {
            scripted.chain(futures::stream::pending()).boxed()
        } else {
            scripted.boxed()
        }
    }
}
