use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

use crate::agent::claude::ClaudeClient;
use crate::agent::engine::{AgentEngine, AgentOutcome};
use crate::agent::tools::ToolRegistry;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::oracle::{OracleMessage, OracleRequest, OracleStream, RemediationOracle};
use crate::workspace::{Workspace, WorkspaceManager};

/// Oracle backed by the Claude tool-use loop running in a fresh clone.
///
/// With a push target, the agent may edit files and its changes are
/// committed and pushed to that branch once it finishes.
pub struct AgentOracle {
    config: Arc<AppConfig>,
    token: String,
}

impl AgentOracle {
    pub fn new(config: Arc<AppConfig>, token: impl Into<String>) -> Self {
        Self {
            config,
            token: token.into(),
        }
    }
}

impl RemediationOracle for AgentOracle {
    fn run(&self, request: OracleRequest) -> OracleStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Arc::clone(&self.config);
        let token = self.token.clone();

        tokio::spawn(async move {
            let session_id = Uuid::new_v4().to_string();
            let _ = tx.send(OracleMessage::Init {
                session_id: session_id.clone(),
            });

            let terminal = match run_session(&config, &token, &request, &session_id, &tx).await {
                Ok(text) => OracleMessage::Result {
                    is_error: false,
                    text,
                },
                Err(e) => {
                    tracing::warn!(
                        repo = %request.repo,
                        branch = %request.checkout_branch,
                        session_id = %session_id,
                        error = %e,
                        "Oracle session failed"
                    );
                    OracleMessage::Result {
                        is_error: true,
                        text: e.to_string(),
                    }
                }
            };
            let _ = tx.send(terminal);
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })
        .boxed()
    }
}

async fn run_session(
    config: &AppConfig,
    token: &str,
    request: &OracleRequest,
    session_id: &str,
    tx: &UnboundedSender<OracleMessage>,
) -> Result<String> {
    let work_branch = request
        .push_branch
        .as_deref()
        .unwrap_or(&request.checkout_branch);

    let workspace_mgr = WorkspaceManager::new(&config.workspace);
    let workspace = workspace_mgr
        .setup(
            &request.repo.clone_url(),
            token,
            &request.repo.full_name(),
            &request.checkout_branch,
            work_branch,
            session_id,
        )
        .await?;

    let result = drive_agent(config, token, request, &workspace_mgr, &workspace, tx).await;

    if let Err(e) = workspace_mgr.cleanup(&workspace).await {
        tracing::warn!(path = %workspace.path.display(), error = %e, "Failed to clean up workspace");
    }

    result
}

async fn drive_agent(
    config: &AppConfig,
    token: &str,
    request: &OracleRequest,
    workspace_mgr: &WorkspaceManager,
    workspace: &Workspace,
    tx: &UnboundedSender<OracleMessage>,
) -> Result<String> {
    let tools = if request.push_branch.is_some() {
        ToolRegistry::with_write_access(
            config.agent.max_file_size_bytes,
            config.agent.max_search_results,
        )
    } else {
        ToolRegistry::read_only(
            config.agent.max_file_size_bytes,
            config.agent.max_search_results,
        )
    };
    let engine = AgentEngine::new(
        ClaudeClient::from_config(&config.claude),
        tools,
        config.claude.max_turns,
    );

    let initial_message = if request.push_branch.is_some() {
        "Fix the failing CI run. Start with the failure logs, then explore the repository."
    } else {
        "Find the root cause of the failing CI run. Start with the failure logs, then explore the repository."
    };

    let outcome = engine
        .run(
            &request.prompt,
            &workspace.path,
            initial_message,
            || tx.is_closed(),
            |text| {
                let _ = tx.send(OracleMessage::Progress {
                    text: text.to_string(),
                });
            },
        )
        .await;

    match outcome {
        AgentOutcome::Completed { summary } => {
            let Some(push_branch) = request.push_branch.as_deref() else {
                return Ok(summary);
            };

            let message = commit_message(&request.checkout_branch, &summary);
            match workspace_mgr.finalize(workspace, &message, token).await? {
                Some(commit) => {
                    tracing::info!(
                        repo = %request.repo,
                        branch = push_branch,
                        commit = %commit,
                        "Pushed fix"
                    );
                    Ok(summary)
                }
                None => Err(AppError::Agent(format!(
                    "Agent finished without changing any files.\n\n{summary}"
                ))),
            }
        }
        AgentOutcome::TurnLimitReached => Err(AppError::Agent(format!(
            "Agent reached the maximum of {} turns without finishing",
            config.claude.max_turns
        ))),
        AgentOutcome::RateLimited { message } => Err(AppError::ClaudeRateLimited(message)),
        AgentOutcome::Cancelled => Err(AppError::Agent("Oracle run was abandoned".to_string())),
        AgentOutcome::Failed { error } => Err(AppError::Agent(error)),
    }
}

fn commit_message(branch: &str, summary: &str) -> String {
    let body = summary.trim();
    if body.is_empty() {
        format!("fix(ci): repair failing run on {branch}")
    } else {
        format!("fix(ci): repair failing run on {branch}\n\n{body}")
    }
}
