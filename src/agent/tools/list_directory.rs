use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::claude::ToolDefinition;
use crate::agent::tools::{require_param, verified_path, Tool, ToolOutput};
use crate::error::{AppError, Result};

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_directory".to_string(),
            description: "List a directory. Returns names with a trailing '/' for directories. Hidden entries except .github are skipped.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Relative path to the directory from the repository root. Use '.' for the root."
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, workspace_root: &Path, input: serde_json::Value) -> Result<ToolOutput> {
        let path_str = require_param!(input, "path");

        let full_path = match verified_path(workspace_root, path_str) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };

        if !full_path.is_dir() {
            return Ok(ToolOutput::Error(format!("Directory not found: {path_str}")));
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&full_path)
            .await
            .map_err(|e| AppError::Workspace(format!("Failed to read directory: {e}")))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| AppError::Workspace(format!("Failed to read directory entry: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            // CI workflows live under .github, which is worth seeing
            if name.starts_with('.') && name != ".github" {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to get file type: {e}")))?
                .is_dir();
            entries.push(if is_dir { format!("{name}/") } else { name });
        }

        entries.sort();

        if entries.is_empty() {
            Ok(ToolOutput::Success("Directory is empty".to_string()))
        } else {
            Ok(ToolOutput::Success(entries.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_github_dir_but_not_git() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        std::fs::create_dir(tmp.path().join(".github")).unwrap();
        std::fs::write(tmp.path().join("Cargo.toml"), "").unwrap();

        let output = ListDirectoryTool
            .execute(tmp.path(), json!({ "path": "." }))
            .await
            .unwrap();

        match output {
            ToolOutput::Success(text) => {
                assert_eq!(text, ".github/\nCargo.toml");
            }
            ToolOutput::Error(e) => panic!("unexpected error: {e}"),
        }
    }
}
