use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::{Platform, LOGS_UNAVAILABLE};

use super::mapper::{self, JobsPayload, RunPayload, RunsPayload};

const DEFAULT_API_URL: &str = "https://api.github.com";

pub struct GitHubPlatform {
    client: Octocrab,
    /// Plain HTTP client for log downloads, which redirect to blob storage.
    http: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Serialize)]
struct RunsQuery<'a> {
    branch: &'a str,
    status: &'a str,
    per_page: u8,
}

#[derive(Serialize)]
struct JobsQuery<'a> {
    filter: &'a str,
    per_page: u8,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut builder = Octocrab::builder().personal_token(config.token.clone());
        if config.api_url.is_some() {
            builder = builder
                .base_uri(api_url.as_str())
                .map_err(|e| AppError::Config(format!("Invalid GitHub API URL: {e}")))?;
        }
        let client = builder
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("triage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            http,
            api_url,
            token: config.token.clone(),
        })
    }

    /// Token used for git operations against the same host.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Conclusion of a single run, or `"unknown"` if it cannot be fetched.
    async fn run_conclusion(&self, repo: &Repo, run_id: u64) -> String {
        let url = format!("/repos/{}/{}/actions/runs/{run_id}", repo.owner, repo.name);
        match self.client.get::<RunPayload, _, ()>(&url, None).await {
            Ok(run) => run.conclusion.unwrap_or_else(|| "unknown".to_string()),
            Err(e) => {
                tracing::warn!(repo = %repo, run_id, error = %e, "Failed to fetch run");
                "unknown".to_string()
            }
        }
    }

    async fn download_job_log(&self, repo: &Repo, job_id: u64) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/actions/jobs/{job_id}/logs",
            self.api_url, repo.owner, repo.name
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::GitHubApi(format!(
                "Log download for job {job_id} returned {status}"
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn list_branches(&self, repo: &Repo) -> Result<Vec<String>> {
        let first_page = self
            .client
            .repos(&repo.owner, &repo.name)
            .list_branches()
            .per_page(100)
            .send()
            .await?;

        let branches = self.client.all_pages(first_page).await?;

        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn get_default_branch(&self, repo: &Repo) -> Result<String> {
        let repository = self.client.repos(&repo.owner, &repo.name).get().await?;

        repository
            .default_branch
            .ok_or_else(|| AppError::GitHubApi(format!("{repo} has no default branch")))
    }

    async fn get_latest_completed_run(
        &self,
        repo: &Repo,
        branch: &str,
    ) -> Result<Option<WorkflowRun>> {
        let url = format!("/repos/{}/{}/actions/runs", repo.owner, repo.name);
        let query = RunsQuery {
            branch,
            status: "completed",
            per_page: 1,
        };

        let runs: RunsPayload = self
            .client
            .get(&url, Some(&query))
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to list workflow runs: {e}")))?;

        Ok(runs
            .workflow_runs
            .into_iter()
            .next()
            .map(mapper::map_workflow_run))
    }

    async fn get_failed_job_logs(&self, repo: &Repo, run_id: u64) -> Result<String> {
        let url = format!(
            "/repos/{}/{}/actions/runs/{run_id}/jobs",
            repo.owner, repo.name
        );
        let query = JobsQuery {
            filter: "latest",
            per_page: 100,
        };

        let jobs: JobsPayload = self
            .client
            .get(&url, Some(&query))
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to list jobs: {e}")))?;

        let mut sections = Vec::new();
        for job in jobs.jobs.iter().filter(|j| j.failed()) {
            let log = match self.download_job_log(repo, job.id).await {
                Ok(log) => log,
                Err(e) => {
                    tracing::warn!(
                        repo = %repo,
                        run_id,
                        job = %job.name,
                        error = %e,
                        "Failed to download job log"
                    );
                    LOGS_UNAVAILABLE.to_string()
                }
            };
            sections.push(mapper::render_job_section(&job.name, &log));
        }

        if sections.is_empty() {
            let conclusion = self.run_conclusion(repo, run_id).await;
            tracing::warn!(repo = %repo, run_id, conclusion = %conclusion, "No failed jobs with logs");
            return Ok(mapper::render_missing_logs(run_id, &conclusion, &jobs.jobs));
        }

        Ok(sections.join("\n"))
    }

    async fn find_open_pull_request(
        &self,
        repo: &Repo,
        branch: &str,
    ) -> Result<Option<PullRequest>> {
        let page = self
            .client
            .pulls(&repo.owner, &repo.name)
            .list()
            .state(octocrab::params::State::Open)
            .head(format!("{}:{branch}", repo.owner))
            .per_page(1)
            .send()
            .await?;

        Ok(page.items.into_iter().next().map(mapper::map_pull_request))
    }

    async fn create_pull_request(
        &self,
        repo: &Repo,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let created = self
            .client
            .pulls(&repo.owner, &repo.name)
            .create(&pr.title, &pr.head_branch, &pr.base_branch)
            .body(&pr.body)
            .send()
            .await?;

        Ok(mapper::map_pull_request(created))
    }

    async fn post_comment(&self, repo: &Repo, pr_number: u64, body: &str) -> Result<()> {
        self.client
            .issues(&repo.owner, &repo.name)
            .create_comment(pr_number, body)
            .await?;

        Ok(())
    }
}
