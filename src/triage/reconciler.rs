use crate::platform::types::{CreatePullRequest, Repo};
use crate::platform::Platform;
use crate::triage::dispatcher::Route;
use crate::triage::types::{FailureRecord, RemediationOutcome};

/// What the reconciler did with a remediation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// A new PR from the fix branch into the protected branch.
    PullRequestCreated { number: u64, url: String },
    /// A comment on the open PR whose head is the remediated branch.
    Commented { pr_number: u64 },
    /// Direct push with no open PR to comment on.
    NoAction,
    /// Nothing to reconcile (analysis, or the remediation failed).
    Skipped { reason: String },
    /// A PR call failed. The pushed commits are left where they are.
    Errored { stage: &'static str, error: String },
}

impl std::fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reconciliation::PullRequestCreated { number, url } => {
                write!(f, "Opened PR #{number}: {url}")
            }
            Reconciliation::Commented { pr_number } => {
                write!(f, "Commented on PR #{pr_number}")
            }
            Reconciliation::NoAction => f.write_str("Pushed directly; no open PR to update"),
            Reconciliation::Skipped { reason } => write!(f, "No PR action ({reason})"),
            Reconciliation::Errored { stage, error } => {
                write!(f, "PR {stage} failed: {error}")
            }
        }
    }
}

/// Turns a completed remediation into exactly one PR-side effect.
pub struct PrReconciler<'a> {
    platform: &'a dyn Platform,
}

impl<'a> PrReconciler<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        Self { platform }
    }

    pub async fn reconcile(
        &self,
        repo: &Repo,
        failure: &FailureRecord,
        outcome: &RemediationOutcome,
        route: &Route,
    ) -> Reconciliation {
        if !outcome.is_completed() {
            return Reconciliation::Skipped {
                reason: "remediation failed".to_string(),
            };
        }

        let result = match route {
            Route::Analysis => Reconciliation::Skipped {
                reason: "analysis only".to_string(),
            },
            Route::ViaFixBranch(fix) => {
                let request = CreatePullRequest {
                    title: format!("fix(ci): repair failing run on {}", failure.branch),
                    body: pull_request_body(failure, outcome),
                    head_branch: fix.as_str().to_string(),
                    base_branch: failure.branch.clone(),
                };
                match self.platform.create_pull_request(repo, &request).await {
                    Ok(pr) => Reconciliation::PullRequestCreated {
                        number: pr.number,
                        url: pr.html_url,
                    },
                    Err(e) => Reconciliation::Errored {
                        stage: "create",
                        error: e.to_string(),
                    },
                }
            }
            Route::Direct => self.comment_on_open_pr(repo, failure, outcome).await,
        };

        match &result {
            Reconciliation::Errored { stage, error } => tracing::error!(
                repo = %repo,
                branch = %failure.branch,
                stage = stage,
                error = %error,
                "PR reconciliation failed"
            ),
            other => tracing::info!(
                repo = %repo,
                branch = %failure.branch,
                result = %other,
                "PR reconciliation done"
            ),
        }
        result
    }

    async fn comment_on_open_pr(
        &self,
        repo: &Repo,
        failure: &FailureRecord,
        outcome: &RemediationOutcome,
    ) -> Reconciliation {
        let pr = match self.platform.find_open_pull_request(repo, &failure.branch).await {
            Ok(Some(pr)) => pr,
            Ok(None) => return Reconciliation::NoAction,
            Err(e) => {
                return Reconciliation::Errored {
                    stage: "lookup",
                    error: e.to_string(),
                }
            }
        };

        let body = fix_comment(failure, outcome);
        match self.platform.post_comment(repo, pr.number, &body).await {
            Ok(()) => Reconciliation::Commented {
                pr_number: pr.number,
            },
            Err(e) => Reconciliation::Errored {
                stage: "comment",
                error: e.to_string(),
            },
        }
    }
}

fn trace_line(outcome: &RemediationOutcome) -> String {
    match &outcome.trace_url {
        Some(url) => format!("**Trace:** {url}\n"),
        None => String::new(),
    }
}

pub fn pull_request_body(failure: &FailureRecord, outcome: &RemediationOutcome) -> String {
    format!(
        "Automated fix for the failing `{workflow}` run on `{branch}`.\n\n\
         **Failed run:** {run_url}\n\
         **Failing commit:** `{sha}`\n\
         {trace}\n\
         ### Root cause\n\n{root}\n\n\
         ### Fix\n\n{fix}\n",
        workflow = failure.workflow_name,
        branch = failure.branch,
        run_url = failure.run_url,
        sha = failure.commit_sha,
        trace = trace_line(outcome),
        root = outcome.root_cause_or_status,
        fix = outcome.summary_or_fix,
    )
}

pub fn fix_comment(failure: &FailureRecord, outcome: &RemediationOutcome) -> String {
    format!(
        "Pushed a fix for the failing `{workflow}` run ({run_url}) at `{sha}`.\n\n\
         {trace}\n\
         {fix}\n",
        workflow = failure.workflow_name,
        run_url = failure.run_url,
        sha = failure.commit_sha,
        trace = trace_line(outcome),
        fix = outcome.summary_or_fix,
    )
}
