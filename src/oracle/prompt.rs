use crate::platform::types::Repo;
use crate::triage::types::FailureRecord;

/// Section markers the oracle is asked to end its answer with.
pub const ROOT_CAUSE_MARKER: &str = "ROOT CAUSE:";
pub const FIX_MARKER: &str = "FIX:";

pub fn system_prompt_for_analysis(repo: &Repo, failure: &FailureRecord, logs: &str) -> String {
    format!(
        r#"You are a CI triage engineer working on repository `{repo}`.

The most recent completed CI run on branch `{branch}` did not succeed.

{failure_section}

## Instructions
1. Read the failure logs and identify the first real error.
2. Explore the codebase to find the code responsible.
3. Explain the root cause and what change would fix it.

## Guidelines
- Do not modify any files. This is an analysis only.
- Distinguish the real error from follow-on noise in the logs.
- If the failure is infrastructure-related (runner outage, network, expired secret), say so.

## Answer format
End your answer with exactly these two sections:

{ROOT_CAUSE_MARKER} <one paragraph>
{FIX_MARKER} <the change you recommend>"#,
        branch = failure.branch,
        failure_section = failure_section(failure, logs),
    )
}

pub fn system_prompt_for_remediation(
    repo: &Repo,
    failure: &FailureRecord,
    logs: &str,
    push_branch: &str,
) -> String {
    let branch_note = if push_branch == failure.branch {
        format!("Your changes will be committed and pushed to `{push_branch}`.")
    } else {
        format!(
            "`{}` is protected. Your changes will be committed to the new branch `{push_branch}` and proposed through a pull request.",
            failure.branch
        )
    };

    format!(
        r#"You are a CI triage engineer working on repository `{repo}`.

The most recent completed CI run on branch `{branch}` did not succeed. Your task is to fix it.

{failure_section}

## Instructions
1. Read the failure logs and identify the first real error.
2. Explore the codebase to find the code responsible.
3. Make the smallest change that makes the run pass.
4. Re-read the files you modified to verify the change.

{branch_note}

## Guidelines
- Fix the cause, not the symptom. Do not disable or skip failing tests.
- Follow the existing code style and patterns in the repository.
- Do not modify CI workflow files unless the workflow itself is broken.
- If the failure is not fixable in code, change nothing and explain why.

## Answer format
End your answer with exactly these two sections:

{ROOT_CAUSE_MARKER} <one paragraph>
{FIX_MARKER} <what you changed>"#,
        branch = failure.branch,
        failure_section = failure_section(failure, logs),
    )
}

fn failure_section(failure: &FailureRecord, logs: &str) -> String {
    format!(
        "## Failed run\n- Workflow: {}\n- Conclusion: {}\n- Commit: {}\n- Run: {}\n\n## Failure logs\n```\n{}\n```",
        failure.workflow_name,
        failure.conclusion,
        failure.commit_sha,
        failure.run_url,
        logs.trim_end(),
    )
}

/// Keep the last `max_chars` characters of a log. Errors sit at the end.
pub fn truncate_logs(logs: &str, max_chars: usize) -> String {
    let total = logs.chars().count();
    if total <= max_chars {
        return logs.to_string();
    }

    let tail: String = logs.chars().skip(total - max_chars).collect();
    format!("[... {} characters truncated ...]\n{tail}", total - max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::types::Conclusion;

    fn failure(branch: &str) -> FailureRecord {
        FailureRecord {
            branch: branch.to_string(),
            commit_sha: "abc123".to_string(),
            run_id: 9,
            workflow_name: "CI".to_string(),
            conclusion: Conclusion::Failure,
            run_url: "https://github.com/o/r/actions/runs/9".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_truncate_keeps_tail() {
        let logs = "aaaaabbbbb";
        let truncated = truncate_logs(logs, 5);
        assert!(truncated.ends_with("bbbbb"));
        assert!(truncated.contains("5 characters truncated"));
        assert_eq!(truncate_logs(logs, 10), logs);
    }

    #[test]
    fn test_truncate_is_char_boundary_safe() {
        let logs = "ééééé";
        assert!(truncate_logs(logs, 2).ends_with("éé"));
    }

    #[test]
    fn test_remediation_prompt_names_fix_branch_for_protected() {
        let repo = Repo::parse("o/r").unwrap();
        let prompt =
            system_prompt_for_remediation(&repo, &failure("main"), "boom", "fix/triage-main-1");
        assert!(prompt.contains("`main` is protected"));
        assert!(prompt.contains("fix/triage-main-1"));
        assert!(prompt.contains(FIX_MARKER));
    }

    #[test]
    fn test_analysis_prompt_forbids_edits() {
        let repo = Repo::parse("o/r").unwrap();
        let prompt = system_prompt_for_analysis(&repo, &failure("feature/x"), "boom");
        assert!(prompt.contains("Do not modify any files"));
        assert!(prompt.contains("boom"));
        assert!(prompt.contains("abc123"));
    }
}
