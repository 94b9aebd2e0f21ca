use std::path::Path;

use git2::{
    build::RepoBuilder, BranchType, Cred, FetchOptions, IndexAddOption, PushOptions,
    RemoteCallbacks, Repository, Signature,
};

use crate::error::{AppError, Result};

const BOT_NAME: &str = "CI Triage Bot";
const BOT_EMAIL: &str = "ci-triage[bot]@users.noreply.github.com";

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` and names git would refuse.
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    if !git2::Branch::name_is_valid(name)? {
        return Err(AppError::Git(format!("Invalid branch name: {name}")));
    }
    Ok(())
}

fn callbacks(token: &str) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    callbacks
}

/// Build `FetchOptions` that authenticate via credential callback.
/// The token is captured by the closure and never written to disk.
fn make_fetch_options(token: &str) -> FetchOptions<'_> {
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(callbacks(token));
    opts
}

/// Build `PushOptions` that record every ref the server refused.
///
/// libgit2 returns `Ok` from `Remote::push` even when a pre-receive hook or
/// branch protection rejects the update; the status only arrives here.
fn make_push_options<'a>(token: &'a str, rejected: &'a mut Vec<String>) -> PushOptions<'a> {
    let mut remote_callbacks = callbacks(token);
    remote_callbacks.push_update_reference(move |refname, status| {
        if let Some(status) = status {
            rejected.push(format!("push of {refname} rejected: {status}"));
        }
        Ok(())
    });

    let mut opts = PushOptions::new();
    opts.remote_callbacks(remote_callbacks);
    opts
}

fn check_push_rejections(rejected: &[String]) -> Result<()> {
    if rejected.is_empty() {
        Ok(())
    } else {
        Err(AppError::Git(rejected.join("; ")))
    }
}

fn checkout_local(repo: &Repository, branch_name: &str) -> Result<()> {
    let refname = format!("refs/heads/{branch_name}");
    let obj = repo.revparse_single(&refname)?;
    repo.checkout_tree(&obj, None)?;
    repo.set_head(&refname)?;
    Ok(())
}

/// Clone a repository into the target directory.
///
/// The remote URL stored in `.git/config` is the plain URL (no credentials).
pub async fn clone(url: &str, target: &Path, token: &str) -> Result<()> {
    if !url.starts_with("https://") {
        return Err(AppError::Git(format!(
            "Expected HTTPS clone URL, got: {url}"
        )));
    }

    let url = url.to_string();
    let target = target.to_path_buf();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        RepoBuilder::new()
            .fetch_options(make_fetch_options(&token))
            .clone(&url, &target)?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Clone task panicked: {e}")))?
}

/// Fetch a remote branch and check it out as a local branch of the same name.
///
/// The clone's default branch already exists locally; it is reused as-is.
pub async fn fetch_and_checkout(dir: &Path, branch_name: &str, token: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;

        if repo.find_branch(&branch_name, BranchType::Local).is_err() {
            let mut remote = repo.find_remote("origin")?;
            let refspec = format!("+refs/heads/{branch_name}:refs/remotes/origin/{branch_name}");
            remote.fetch(&[&refspec], Some(&mut make_fetch_options(&token)), None)?;

            let remote_ref = format!("refs/remotes/origin/{branch_name}");
            let commit = repo.find_reference(&remote_ref)?.peel_to_commit()?;
            repo.branch(&branch_name, &commit, false)?;
        }

        checkout_local(&repo, &branch_name)
    })
    .await
    .map_err(|e| AppError::Git(format!("Fetch-and-checkout task panicked: {e}")))?
}

/// Create a new branch at HEAD and check it out.
pub async fn create_branch(dir: &Path, branch_name: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let commit = repo.head()?.peel_to_commit()?;
        repo.branch(&branch_name, &commit, false)?;
        checkout_local(&repo, &branch_name)
    })
    .await
    .map_err(|e| AppError::Git(format!("Create-branch task panicked: {e}")))?
}

/// Name of the branch HEAD points at.
pub async fn current_branch(dir: &Path) -> Result<String> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let head = repo.head()?;
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| AppError::Git("HEAD is not a named branch".to_string()))
    })
    .await
    .map_err(|e| AppError::Git(format!("Current-branch task panicked: {e}")))?
}

/// Stage every change and commit it. Returns the new commit id.
pub async fn commit_all(dir: &Path, message: &str) -> Result<String> {
    let dir = dir.to_path_buf();
    let message = message.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        // Pick up deletions too
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let sig = Signature::now(BOT_NAME, BOT_EMAIL)?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let parent = repo.head()?.peel_to_commit()?;
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?;
        Ok(oid.to_string())
    })
    .await
    .map_err(|e| AppError::Git(format!("Commit task panicked: {e}")))?
}

/// Push a local branch to the same name on origin. Never forces.
pub async fn push(dir: &Path, branch_name: &str, token: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut remote = repo.find_remote("origin")?;
        let refspec = format!("refs/heads/{branch_name}:refs/heads/{branch_name}");
        let mut rejected = Vec::new();
        remote.push(&[&refspec], Some(&mut make_push_options(&token, &mut rejected)))?;
        check_push_rejections(&rejected)
    })
    .await
    .map_err(|e| AppError::Git(format!("Push task panicked: {e}")))?
}

/// Check if there are any staged or unstaged changes.
pub async fn has_changes(dir: &Path) -> Result<bool> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let statuses = repo.statuses(None)?;
        Ok(!statuses.is_empty())
    })
    .await
    .map_err(|e| AppError::Git(format!("Has-changes task panicked: {e}")))?
}
