pub mod create_file;
pub mod delete_file;
pub mod list_directory;
pub mod read_file;
pub mod search_code;
pub mod write_file;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::agent::claude::ToolDefinition;
use crate::error::Result;
use crate::workspace::WorkspaceManager;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, workspace_root: &Path, input: serde_json::Value)
        -> Result<ToolOutput>;
}

#[derive(Debug)]
pub enum ToolOutput {
    /// Normal text result returned to Claude.
    Success(String),
    /// Error result returned to Claude (the agent can recover).
    Error(String),
}

/// Pull a required string parameter out of the tool input, or return a
/// recoverable [`ToolOutput::Error`] from the enclosing `execute`.
macro_rules! require_param {
    ($input:expr, $name:literal) => {
        match $input[$name].as_str() {
            Some(value) => value,
            None => {
                return Ok($crate::agent::tools::ToolOutput::Error(format!(
                    "Missing '{}' parameter",
                    $name
                )))
            }
        }
    };
}
pub(crate) use require_param;

/// Resolve a tool-supplied path inside the workspace, or a tool error.
pub fn verified_path(workspace_root: &Path, path: &str) -> std::result::Result<PathBuf, ToolOutput> {
    WorkspaceManager::verify_path(workspace_root, Path::new(path))
        .map_err(|e| ToolOutput::Error(format!("Invalid path: {e}")))
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Tools that can only inspect the checkout.
    pub fn read_only(max_file_size: usize, max_search_results: usize) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(read_file::ReadFileTool::new(max_file_size)),
            Box::new(list_directory::ListDirectoryTool),
            Box::new(search_code::SearchCodeTool::new(max_search_results)),
        ];

        Self { tools }
    }

    /// Read-only tools plus file modification.
    pub fn with_write_access(max_file_size: usize, max_search_results: usize) -> Self {
        let mut registry = Self::read_only(max_file_size, max_search_results);
        registry.tools.push(Box::new(write_file::WriteFileTool));
        registry.tools.push(Box::new(create_file::CreateFileTool));
        registry.tools.push(Box::new(delete_file::DeleteFileTool));
        registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }
}
