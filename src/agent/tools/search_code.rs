use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::claude::ToolDefinition;
use crate::agent::tools::{require_param, verified_path, Tool, ToolOutput};
use crate::error::Result;

const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "target", ".venv", "vendor", "dist"];

pub struct SearchCodeTool {
    max_results: usize,
}

impl SearchCodeTool {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_code".to_string(),
            description: "Search the repository with grep. Returns matching lines with file paths and line numbers. Use it to locate symbols, test names and error messages from the CI log.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Search pattern (grep-compatible regex)"
                    },
                    "path": {
                        "type": "string",
                        "description": "Optional: restrict search to this subdirectory (relative to repo root)"
                    },
                    "include": {
                        "type": "string",
                        "description": "Optional: file glob pattern to include (e.g., '*.rs', '*.py')"
                    }
                },
                "required": ["pattern"]
            }),
        }
    }

    async fn execute(&self, workspace_root: &Path, input: serde_json::Value) -> Result<ToolOutput> {
        let pattern = require_param!(input, "pattern");

        let search_dir = match input["path"].as_str() {
            Some(path) => match verified_path(workspace_root, path) {
                Ok(p) => p,
                Err(e) => return Ok(e),
            },
            None => workspace_root.to_path_buf(),
        };

        if !search_dir.is_dir() {
            return Ok(ToolOutput::Error(format!(
                "Search directory does not exist: {}",
                input["path"].as_str().unwrap_or(".")
            )));
        }

        let mut args = vec!["-rn".to_string(), "--max-count=5".to_string()];

        if let Some(include) = input["include"].as_str() {
            args.push(format!("--include={include}"));
        }
        args.extend(EXCLUDED_DIRS.iter().map(|d| format!("--exclude-dir={d}")));

        args.push("-e".to_string());
        args.push(pattern.to_string());
        args.push(".".to_string());

        let output = tokio::process::Command::new("grep")
            .args(&args)
            .current_dir(&search_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                Ok(ToolOutput::Success(limit_matches(&stdout, self.max_results)))
            }
            Err(e) => Ok(ToolOutput::Error(format!("Search failed: {e}"))),
        }
    }
}

fn limit_matches(stdout: &str, max_results: usize) -> String {
    if stdout.trim().is_empty() {
        return "No matches found".to_string();
    }

    let total = stdout.lines().count();
    let shown = stdout.lines().take(max_results).collect::<Vec<_>>().join("\n");

    if total > max_results {
        format!("{shown}\n\n... ({} more matches truncated)", total - max_results)
    } else {
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_matches_truncates() {
        let stdout = "a:1:x\nb:2:x\nc:3:x\n";
        let limited = limit_matches(stdout, 2);
        assert!(limited.starts_with("a:1:x\nb:2:x"));
        assert!(limited.contains("1 more matches truncated"));
    }

    #[test]
    fn test_limit_matches_empty() {
        assert_eq!(limit_matches("", 5), "No matches found");
    }
}
