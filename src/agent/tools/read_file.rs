use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::claude::ToolDefinition;
use crate::agent::tools::{require_param, verified_path, Tool, ToolOutput};
use crate::error::{AppError, Result};

pub struct ReadFileTool {
    max_file_size: usize,
}

impl ReadFileTool {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read a file from the repository. Optionally restrict to a 1-based inclusive line range, e.g. around a line number from a stack trace.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Relative path to the file from the repository root"
                    },
                    "start_line": {
                        "type": "integer",
                        "description": "Optional: first line to return (1-based)"
                    },
                    "end_line": {
                        "type": "integer",
                        "description": "Optional: last line to return (inclusive)"
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

        if !full_path.is_file() {
            return Ok(ToolOutput::Error(format!("File not found: {path_str}")));
        }

        let metadata = tokio::fs::metadata(&full_path)
            .await
            .map_err(|e| AppError::Workspace(format!("Failed to read file metadata: {e}")))?;

        if metadata.len() as usize > self.max_file_size {
            return Ok(ToolOutput::Error(format!(
                "File is too large ({} bytes, max {} bytes)",
                metadata.len(),
                self.max_file_size
            )));
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(e) => return Ok(ToolOutput::Error(format!("Failed to read file: {e}"))),
        };

        let start = input["start_line"].as_u64();
        let end = input["end_line"].as_u64();
        if start.is_none() && end.is_none() {
            return Ok(ToolOutput::Success(content));
        }

        Ok(select_lines(&content, start.unwrap_or(1), end))
    }
}

/// Numbered lines `start..=end` (1-based).
fn select_lines(content: &str, start: u64, end: Option<u64>) -> ToolOutput {
    let start = start.max(1);
    if let Some(end) = end {
        if end < start {
            return ToolOutput::Error(format!("end_line {end} is before start_line {start}"));
        }
    }

    let selected: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i as u64 + 1, line))
        .filter(|(n, _)| *n >= start && end.map_or(true, |end| *n <= end))
        .map(|(n, line)| format!("{n:>5} | {line}"))
        .collect();

    if selected.is_empty() {
        ToolOutput::Error(format!("No lines in range starting at {start}"))
    } else {
        ToolOutput::Success(selected.join("\n"))
    }
}
