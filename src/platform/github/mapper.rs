use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::platform::{types, LOGS_UNAVAILABLE};

/// `GET /repos/{owner}/{repo}/actions/runs` response body.
#[derive(Debug, Deserialize)]
pub struct RunsPayload {
    #[serde(default)]
    pub workflow_runs: Vec<RunPayload>,
}

#[derive(Debug, Deserialize)]
pub struct RunPayload {
    pub id: u64,
    pub name: Option<String>,
    pub head_branch: Option<String>,
    pub head_sha: String,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

/// `GET /repos/{owner}/{repo}/actions/runs/{run_id}/jobs` response body.
#[derive(Debug, Deserialize)]
pub struct JobsPayload {
    #[serde(default)]
    pub jobs: Vec<JobPayload>,
}

#[derive(Debug, Deserialize)]
pub struct JobPayload {
    pub id: u64,
    pub name: String,
    pub conclusion: Option<String>,
}

impl JobPayload {
    /// Jobs of a `timed_out` run usually conclude `timed_out` or `cancelled`.
    pub fn failed(&self) -> bool {
        matches!(
            self.conclusion.as_deref(),
            Some("failure" | "timed_out" | "cancelled")
        )
    }
}

/// Map a workflow run payload to our platform run type.
pub fn map_workflow_run(run: RunPayload) -> types::WorkflowRun {
    types::WorkflowRun {
        id: run.id,
        name: run.name.unwrap_or_else(|| "unnamed workflow".to_string()),
        head_branch: run.head_branch.unwrap_or_default(),
        head_sha: run.head_sha,
        status: run.status.unwrap_or_default(),
        conclusion: run.conclusion,
        html_url: run.html_url,
        created_at: run.created_at,
    }
}

pub fn map_pull_request(pr: octocrab::models::pulls::PullRequest) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        head_branch: pr.head.ref_field.clone(),
        base_branch: pr.base.ref_field.clone(),
    }
}

/// Render one log section per failed job.
pub fn render_job_section(job_name: &str, log: &str) -> String {
    format!("=== Job: {job_name} ===\n{}\n", log.trim_end())
}

/// Stand-in section when a run has no failed job to show logs for.
pub fn render_missing_logs(run_id: u64, run_conclusion: &str, jobs: &[JobPayload]) -> String {
    let jobs = if jobs.is_empty() {
        "none reported".to_string()
    } else {
        jobs.iter()
            .map(|j| format!("{}={}", j.name, j.conclusion.as_deref().unwrap_or("pending")))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "=== Run {run_id} ({run_conclusion}) ===\n{}: no failed job logs. Jobs: {jobs}\n",
        LOGS_UNAVAILABLE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_workflow_run_from_api_json() {
        let payload: RunsPayload = serde_json::from_value(serde_json::json!({
            "total_count": 1,
            "workflow_runs": [{
                "id": 42,
                "name": "CI",
                "head_branch": "main",
                "head_sha": "abc123",
                "status": "completed",
                "conclusion": "failure",
                "html_url": "https://github.com/o/r/actions/runs/42",
                "created_at": "2024-05-01T12:00:00Z"
            }]
        }))
        .unwrap();

        let run = map_workflow_run(payload.workflow_runs.into_iter().next().unwrap());
        assert_eq!(run.id, 42);
        assert_eq!(run.name, "CI");
        assert_eq!(run.conclusion.as_deref(), Some("failure"));
        assert_eq!(run.head_sha, "abc123");
    }

    #[test]
    fn test_missing_run_name_gets_placeholder() {
        let run: RunPayload = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": null,
            "head_branch": null,
            "head_sha": "def",
            "status": "completed",
            "conclusion": null,
            "html_url": "https://github.com/o/r/actions/runs/7",
            "created_at": "2024-05-01T12:00:00Z"
        }))
        .unwrap();

        let run = map_workflow_run(run);
        assert_eq!(run.name, "unnamed workflow");
        assert!(run.conclusion.is_none());
    }

    #[test]
    fn test_only_failure_jobs_count_as_failed() {
        let jobs: JobsPayload = serde_json::from_value(serde_json::json!({
            "jobs": [
                { "id": 1, "name": "build", "conclusion": "success" },
                { "id": 2, "name": "test", "conclusion": "failure" },
                { "id": 3, "name": "lint", "conclusion": null },
                { "id": 4, "name": "e2e", "conclusion": "timed_out" },
                { "id": 5, "name": "deploy", "conclusion": "cancelled" },
                { "id": 6, "name": "docs", "conclusion": "skipped" }
            ]
        }))
        .unwrap();

        let failed: Vec<_> = jobs.jobs.iter().filter(|j| j.failed()).map(|j| j.id).collect();
        assert_eq!(failed, vec![2, 4, 5]);
    }

    #[test]
    fn test_missing_logs_section_names_run_conclusion() {
        let section = render_missing_logs(42, "action_required", &[]);
        assert!(section.contains("Run 42 (action_required)"));
        assert!(section.contains(LOGS_UNAVAILABLE));
        assert!(section.contains("none reported"));

        let jobs: JobsPayload = serde_json::from_value(serde_json::json!({
            "jobs": [
                { "id": 1, "name": "build", "conclusion": "success" },
                { "id": 2, "name": "gate", "conclusion": null }
            ]
        }))
        .unwrap();
        let section = render_missing_logs(42, "action_required", &jobs.jobs);
        assert!(section.contains("build=success, gate=pending"));
    }
}
