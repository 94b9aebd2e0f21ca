use crate::oracle::RemediationOracle;
use crate::platform::types::Repo;
use crate::platform::{Platform, LOGS_UNAVAILABLE};
use crate::triage::detector;
use crate::triage::dispatcher::{DispatcherSettings, RemediationDispatcher};
use crate::triage::reconciler::PrReconciler;
use crate::triage::types::Mode;
use crate::workflow::types::{CommandReport, RemediationReport};

const FALLBACK_BRANCH: &str = "main";

/// Run `analyze` or `triage` against one branch.
///
/// Detect, dispatch and reconcile run strictly in sequence. Without an
/// explicit branch the repository's default branch is used.
pub async fn remediate(
    platform: &dyn Platform,
    oracle: &dyn RemediationOracle,
    settings: &DispatcherSettings,
    repo: &Repo,
    branch: Option<&str>,
    mode: Mode,
) -> CommandReport {
    let branch = match branch {
        Some(branch) => branch.to_string(),
        None => default_branch(platform, repo).await,
    };

    let Some(failure) = detector::detect_failure(platform, repo, &branch).await else {
        tracing::info!(repo = %repo, branch = %branch, "No failure to remediate");
        return CommandReport::NoFailure { branch };
    };

    let logs = match platform.get_failed_job_logs(repo, failure.run_id).await {
        Ok(logs) => logs,
        Err(e) => {
            tracing::warn!(
                repo = %repo,
                branch = %branch,
                run_id = failure.run_id,
                stage = "job_logs",
                error = %e,
                "Failed to fetch job logs"
            );
            LOGS_UNAVAILABLE.to_string()
        }
    };

    let dispatch = RemediationDispatcher::new(oracle, settings.clone())
        .dispatch(repo, mode, &failure, &logs)
        .await;

    let reconciliation = match mode {
        Mode::Analyze => None,
        Mode::Triage => Some(
            PrReconciler::new(platform)
                .reconcile(repo, &failure, &dispatch.outcome, &dispatch.plan.route)
                .await,
        ),
    };

    CommandReport::Remediation(Box::new(RemediationReport {
        mode,
        failure,
        dispatch,
        reconciliation,
    }))
}

async fn default_branch(platform: &dyn Platform, repo: &Repo) -> String {
    match platform.get_default_branch(repo).await {
        Ok(branch) => branch,
        Err(e) => {
            tracing::warn!(
                repo = %repo,
                stage = "default_branch",
                error = %e,
                fallback = FALLBACK_BRANCH,
                "Failed to get default branch"
            );
            FALLBACK_BRANCH.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{Call, FakePlatform, ScriptedOracle};
    use crate::triage::reconciler::Reconciliation;

    const ANSWER: &str = "ROOT CAUSE: missing feature flag\nFIX: enabled the `json` feature";

    fn repo() -> Repo {
        Repo::parse("owner/repo").unwrap()
    }

    fn settings() -> DispatcherSettings {
        DispatcherSettings {
            deadline: Duration::from_secs(5),
            trace_base_url: None,
            max_log_chars: 10_000,
        }
    }

    fn unwrap_remediation(report: CommandReport) -> RemediationReport {
        match report {
            CommandReport::Remediation(report) => *report,
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scenario_b_protected_branch_gets_fix_pr() {
        let platform = FakePlatform::new()
            .with_run("main", "failure")
            .with_logs("error: could not compile");
        let oracle = ScriptedOracle::succeeding(ANSWER);

        let report = unwrap_remediation(
            remediate(&platform, &oracle, &settings(), &repo(), Some("main"), Mode::Triage).await,
        );

        let push = oracle.requests()[0].push_branch.clone().unwrap();
        let suffix = push.strip_prefix("fix/triage-main-").unwrap();
        assert!(!suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()));

        assert_eq!(
            platform.pr_management_calls(),
            vec![Call::CreatePr {
                head: push,
                base: "main".to_string()
            }]
        );
        assert!(matches!(
            report.reconciliation,
            Some(Reconciliation::PullRequestCreated { number: 77, .. })
        ));
    }

    #[tokio::test]
    async fn test_scenario_c_open_pr_gets_one_comment() {
        let platform = FakePlatform::new()
            .with_run("feature/x", "failure")
            .with_logs("test failed")
            .with_open_pr("feature/x", 5);
        let oracle = ScriptedOracle::succeeding(ANSWER);

        let report = unwrap_remediation(
            remediate(
                &platform,
                &oracle,
                &settings(),
                &repo(),
                Some("feature/x"),
                Mode::Triage,
            )
            .await,
        );

        let calls = platform.calls();
        let comments = calls
            .iter()
            .filter(|c| matches!(c, Call::Comment { pr_number: 5, .. }))
            .count();
        assert_eq!(comments, 1);
        assert!(!calls.iter().any(|c| matches!(c, Call::CreatePr { .. })));
        assert_eq!(
            report.reconciliation,
            Some(Reconciliation::Commented { pr_number: 5 })
        );
    }

    #[tokio::test]
    async fn test_scenario_d_no_pr_means_no_pr_writes() {
        let platform = FakePlatform::new()
            .with_run("feature/x", "failure")
            .with_logs("test failed");
        let oracle = ScriptedOracle::succeeding(ANSWER);

        let report = unwrap_remediation(
            remediate(
                &platform,
                &oracle,
                &settings(),
                &repo(),
                Some("feature/x"),
                Mode::Triage,
            )
            .await,
        );

        assert_eq!(
            oracle.requests()[0].push_branch.as_deref(),
            Some("feature/x")
        );
        // Only the lookup; nothing is created or commented
        assert_eq!(
            platform.pr_management_calls(),
            vec![Call::FindOpenPr("feature/x".to_string())]
        );
        assert_eq!(report.reconciliation, Some(Reconciliation::NoAction));
    }

    #[tokio::test]
    async fn test_analyze_defaults_branch_and_skips_prs() {
        let platform = FakePlatform::new()
            .with_default_branch("develop")
            .with_run("develop", "failure")
            .with_logs("boom");
        let oracle = ScriptedOracle::succeeding(ANSWER);

        let report = unwrap_remediation(
            remediate(&platform, &oracle, &settings(), &repo(), None, Mode::Analyze).await,
        );

        let request = &oracle.requests()[0];
        assert_eq!(request.checkout_branch, "develop");
        assert!(request.push_branch.is_none());
        assert!(report.reconciliation.is_none());
        assert!(platform.pr_management_calls().is_empty());
        assert_eq!(
            report.dispatch.outcome.root_cause_or_status,
            "missing feature flag"
        );
    }

    #[tokio::test]
    async fn test_default_branch_error_falls_back_to_main() {
        let platform = FakePlatform::new();
        let oracle = ScriptedOracle::succeeding(ANSWER);

        let report = remediate(&platform, &oracle, &settings(), &repo(), None, Mode::Analyze).await;

        assert!(matches!(report, CommandReport::NoFailure { ref branch } if branch == "main"));
        assert!(platform.calls().contains(&Call::LatestRun("main".to_string())));
        assert!(oracle.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_logs_use_placeholder() {
        let platform = FakePlatform::new().with_run("main", "failure");
        let oracle = ScriptedOracle::succeeding(ANSWER);

        remediate(&platform, &oracle, &settings(), &repo(), Some("main"), Mode::Analyze).await;

        assert!(oracle.requests()[0].prompt.contains(LOGS_UNAVAILABLE));
    }
}
