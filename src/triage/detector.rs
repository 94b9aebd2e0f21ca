use futures::future::join_all;

use crate::platform::types::{Repo, WorkflowRun};
use crate::platform::Platform;
use crate::triage::types::{Conclusion, FailureRecord};

/// Report a failure if the branch's most recent completed run did not succeed.
///
/// Only the latest completed run counts: a failure followed by a success is
/// never reported. Gateway errors are logged and treated as "no failure".
pub async fn detect_failure(
    platform: &dyn Platform,
    repo: &Repo,
    branch: &str,
) -> Option<FailureRecord> {
    let run = match platform.get_latest_completed_run(repo, branch).await {
        Ok(Some(run)) => run,
        Ok(None) => {
            tracing::debug!(repo = %repo, branch = branch, "No completed runs");
            return None;
        }
        Err(e) => {
            tracing::warn!(
                repo = %repo,
                branch = branch,
                stage = "latest_run",
                error = %e,
                "Failed to fetch latest run, treating branch as healthy"
            );
            return None;
        }
    };

    let failure = failure_from_run(branch, &run);
    if let Some(failure) = &failure {
        tracing::info!(
            repo = %repo,
            branch = branch,
            run_id = failure.run_id,
            conclusion = %failure.conclusion,
            "Latest run failed"
        );
    }
    failure
}

/// Build a failure record from a completed run, if its conclusion is a failure.
pub fn failure_from_run(branch: &str, run: &WorkflowRun) -> Option<FailureRecord> {
    let conclusion = Conclusion::from_api(run.conclusion.as_deref()?)?;

    Some(FailureRecord {
        branch: branch.to_string(),
        commit_sha: run.head_sha.clone(),
        run_id: run.id,
        workflow_name: run.name.clone(),
        conclusion,
        run_url: run.html_url.clone(),
        created_at: run.created_at,
    })
}

/// Detect failures across branches in sequential batches of `batch_size`.
///
/// Detectors inside a batch run concurrently. Each returns its own result and
/// results are collected after the batch joins, so the output follows
/// branch order.
pub async fn scan_failures(
    platform: &dyn Platform,
    repo: &Repo,
    branches: &[String],
    batch_size: usize,
) -> Vec<FailureRecord> {
    let mut failures = Vec::new();

    for (batch_index, batch) in branches.chunks(batch_size.max(1)).enumerate() {
        tracing::debug!(batch = batch_index, size = batch.len(), "Scanning batch");

        let results = join_all(
            batch
                .iter()
                .map(|branch| detect_failure(platform, repo, branch)),
        )
        .await;

        failures.extend(results.into_iter().flatten());
    }

    tracing::info!(
        repo = %repo,
        scanned = branches.len(),
        failed = failures.len(),
        "Scan complete"
    );
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run, FakePlatform};

    fn repo() -> Repo {
        Repo::parse("o/r").unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_success_never_produces_record() {
        assert!(failure_from_run("main", &run("main", Some("success"))).is_none());
        assert!(failure_from_run("main", &run("main", Some("cancelled"))).is_none());
        assert!(failure_from_run("main", &run("main", None)).is_none());
    }

    #[test]
    fn test_failure_record_copies_run_fields() {
        let failed = run("main", Some("timed_out"));
        let record = failure_from_run("main", &failed).unwrap();
        assert_eq!(record.branch, "main");
        assert_eq!(record.run_id, failed.id);
        assert_eq!(record.commit_sha, failed.head_sha);
        assert_eq!(record.conclusion, Conclusion::TimedOut);
        assert_eq!(record.run_url, failed.html_url);
    }

    #[tokio::test]
    async fn test_latest_success_masks_older_failures() {
        // The gateway only ever returns the newest completed run
        let platform = FakePlatform::new().with_run("main", "success");
        assert!(detect_failure(&platform, &repo(), "main").await.is_none());
    }

    #[tokio::test]
    async fn test_branch_without_runs_is_healthy() {
        let platform = FakePlatform::new();
        assert!(detect_failure(&platform, &repo(), "main").await.is_none());
    }

    #[tokio::test]
    async fn test_one_branch_error_does_not_abort_scan() {
        let platform = FakePlatform::new()
            .with_run("a", "failure")
            .with_run_error("b")
            .with_run("c", "action_required");

        let failures = scan_failures(&platform, &repo(), &names(&["a", "b", "c"]), 3).await;
        let branches: Vec<_> = failures.iter().map(|f| f.branch.as_str()).collect();
        assert_eq!(branches, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_batches_bound_concurrency_and_keep_order() {
        let branches: Vec<String> = (0..7).map(|i| format!("b{i}")).collect();
        let mut platform = FakePlatform::new();
        for b in &branches {
            platform = platform.with_run(b, "failure");
        }

        let failures = scan_failures(&platform, &repo(), &branches, 3).await;

        assert_eq!(platform.max_in_flight(), 3);
        let found: Vec<_> = failures.into_iter().map(|f| f.branch).collect();
        assert_eq!(found, branches);
    }

    #[tokio::test]
    async fn test_scenario_a_only_main_reported() {
        let platform = FakePlatform::new()
            .with_branches(&["main", "feature/x"])
            .with_run("main", "failure")
            .with_run("feature/x", "success");

        let failures =
            scan_failures(&platform, &repo(), &names(&["main", "feature/x"]), 3).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].branch, "main");
    }
}
