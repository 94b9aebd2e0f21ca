use std::path::{Component, Path, PathBuf};

use crate::config::WorkspaceConfig;
use crate::error::{AppError, Result};
use crate::workspace::git;

/// Manages workspace directories for oracle runs.
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

/// A checked-out workspace ready for the agent to work in.
#[derive(Debug)]
pub struct Workspace {
    pub path: PathBuf,
    /// Branch the agent's commits land on.
    pub branch: String,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
        }
    }

    /// Clean up an existing workspace directory and ensure its parent exists.
    async fn prepare_workspace_dir(path: &Path) -> Result<()> {
        if path.exists() {
            tokio::fs::remove_dir_all(path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to clean workspace: {e}")))?;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create workspace dir: {e}")))?;
        }
        Ok(())
    }

    /// Clone the repo and check out `checkout_branch`. When `work_branch`
    /// differs, it is created from the checkout and becomes HEAD.
    pub async fn setup(
        &self,
        clone_url: &str,
        token: &str,
        repo_full_name: &str,
        checkout_branch: &str,
        work_branch: &str,
        session_id: &str,
    ) -> Result<Workspace> {
        let workspace_path = self.workspace_path(repo_full_name, work_branch, session_id);

        Self::prepare_workspace_dir(&workspace_path).await?;

        git::clone(clone_url, &workspace_path, token).await?;
        git::fetch_and_checkout(&workspace_path, checkout_branch, token).await?;

        if work_branch != checkout_branch {
            git::create_branch(&workspace_path, work_branch).await?;
        }

        Ok(Workspace {
            path: workspace_path,
            branch: work_branch.to_string(),
        })
    }

    /// Commit and push changes from the workspace to its branch.
    ///
    /// Returns the new commit id, or `None` when there was nothing to commit.
    pub async fn finalize(
        &self,
        workspace: &Workspace,
        commit_message: &str,
        token: &str,
    ) -> Result<Option<String>> {
        if !git::has_changes(&workspace.path).await? {
            tracing::info!(branch = %workspace.branch, "No changes to commit");
            return Ok(None);
        }

        // The agent has no git tools, but HEAD drifting would push the wrong branch
        let head = git::current_branch(&workspace.path).await?;
        if head != workspace.branch {
            return Err(AppError::Workspace(format!(
                "HEAD is on '{head}', expected '{}'",
                workspace.branch
            )));
        }

        let commit = git::commit_all(&workspace.path, commit_message).await?;
        git::push(&workspace.path, &workspace.branch, token).await?;

        Ok(Some(commit))
    }

    /// Clean up a workspace directory.
    pub async fn cleanup(&self, workspace: &Workspace) -> Result<()> {
        if workspace.path.exists() {
            tokio::fs::remove_dir_all(&workspace.path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to cleanup workspace: {e}")))?;
        }
        Ok(())
    }

    fn workspace_path(&self, repo_full_name: &str, branch: &str, session_id: &str) -> PathBuf {
        let safe_name = repo_full_name.replace('/', "__");
        let safe_branch = branch.replace('/', "__");
        self.base_dir
            .join(format!("{safe_name}__{safe_branch}__{session_id}"))
    }

    /// Verify a path is within the workspace (path traversal protection).
    pub fn verify_path(workspace_root: &Path, requested_path: &Path) -> Result<PathBuf> {
        if requested_path.is_absolute()
            || requested_path
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(AppError::Workspace(format!(
                "Path traversal detected: {} is outside workspace",
                requested_path.display()
            )));
        }

        let full_path = workspace_root.join(requested_path);

        // Canonicalize to resolve symlinks. For new files, canonicalize the parent.
        let canonical = if full_path.exists() {
            full_path
                .canonicalize()
                .map_err(|e| AppError::Workspace(format!("Failed to resolve path: {e}")))?
        } else {
            let parent = full_path
                .parent()
                .ok_or_else(|| AppError::Workspace("Invalid file path".to_string()))?;

            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Workspace(format!("Failed to create directory: {e}")))?;
            }

            let canonical_parent = parent
                .canonicalize()
                .map_err(|e| AppError::Workspace(format!("Failed to resolve path: {e}")))?;

            let file_name = full_path
                .file_name()
                .ok_or_else(|| AppError::Workspace("Invalid file name".to_string()))?;

            canonical_parent.join(file_name)
        };

        let canonical_root = workspace_root
            .canonicalize()
            .map_err(|e| AppError::Workspace(format!("Failed to resolve workspace root: {e}")))?;

        if !canonical.starts_with(&canonical_root) {
            return Err(AppError::Workspace(format!(
                "Path traversal detected: {} is outside workspace",
                requested_path.display()
            )));
        }

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_path_is_flat_and_unique_per_session() {
        let mgr = WorkspaceManager::new(&WorkspaceConfig {
            base_dir: PathBuf::from("/tmp/ws"),
        });
        let a = mgr.workspace_path("o/r", "fix/triage-main-1", "s1");
        let b = mgr.workspace_path("o/r", "fix/triage-main-1", "s2");
        assert_eq!(a, PathBuf::from("/tmp/ws/o__r__fix__triage-main-1__s1"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_path_rejects_traversal_without_creating_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir(&root).unwrap();

        assert!(WorkspaceManager::verify_path(&root, Path::new("../outside/x.txt")).is_err());
        assert!(!tmp.path().join("outside").exists());
        assert!(WorkspaceManager::verify_path(&root, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_verify_path_accepts_nested_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let resolved = WorkspaceManager::verify_path(tmp.path(), Path::new("a/b/c.rs")).unwrap();
        assert!(resolved.ends_with("a/b/c.rs"));
    }
}
