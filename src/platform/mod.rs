pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Placeholder written in place of a job log that could not be downloaded.
pub const LOGS_UNAVAILABLE: &str = "Logs unavailable";

#[async_trait]
pub trait Platform: Send + Sync {
    /// List every branch of the repository, in the order the API returns them.
    async fn list_branches(&self, repo: &Repo) -> Result<Vec<String>>;

    /// Get the repository's default branch.
    async fn get_default_branch(&self, repo: &Repo) -> Result<String>;

    /// Get the most recent completed workflow run on a branch.
    async fn get_latest_completed_run(
        &self,
        repo: &Repo,
        branch: &str,
    ) -> Result<Option<WorkflowRun>>;

    /// Download the logs of every failed job in a run, concatenated into one
    /// section per job. Jobs whose log cannot be fetched get [`LOGS_UNAVAILABLE`].
    async fn get_failed_job_logs(&self, repo: &Repo, run_id: u64) -> Result<String>;

    /// Find an open pull request whose head is `branch`.
    async fn find_open_pull_request(
        &self,
        repo: &Repo,
        branch: &str,
    ) -> Result<Option<PullRequest>>;

    /// Create a pull request.
    async fn create_pull_request(
        &self,
        repo: &Repo,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest>;

    /// Post a comment on a PR.
    async fn post_comment(&self, repo: &Repo, pr_number: u64, body: &str) -> Result<()>;
}
