use crate::platform::types::Repo;
use crate::platform::Platform;
use crate::triage::{detector, scanner};
use crate::workflow::types::CommandReport;

/// Scan the selected branches and report every failing one.
pub async fn list_failures(
    platform: &dyn Platform,
    repo: &Repo,
    patterns: &[String],
    batch_size: usize,
) -> CommandReport {
    let branches = scanner::resolve_branches(platform, repo, patterns).await;
    let failures = detector::scan_failures(platform, repo, &branches, batch_size).await;
    CommandReport::Failures(failures)
}
