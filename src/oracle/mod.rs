//! The remediation oracle: an opaque process that analyzes a CI failure and,
//! when given a push target, commits a fix itself.
//!
//! The core only sees a stream of [`OracleMessage`]s. [`agent::AgentOracle`]
//! drives Claude in a local checkout; tests use a scripted stream instead.

pub mod agent;
pub mod prompt;

use futures::stream::BoxStream;

use crate::platform::types::Repo;

/// One message emitted by an oracle run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleMessage {
    /// First message of a run; carries the session/trace id.
    Init { session_id: String },
    /// Incremental text while the run is in progress.
    Progress { text: String },
    /// Terminal message. Nothing after it is consumed.
    Result { is_error: bool, text: String },
}

/// What the oracle is asked to do.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub repo: Repo,
    pub prompt: String,
    /// Branch the oracle checks out and reads.
    pub checkout_branch: String,
    /// Branch the oracle commits and pushes to. `None` means read-only analysis.
    pub push_branch: Option<String>,
}

pub type OracleStream = BoxStream<'static, OracleMessage>;

pub trait RemediationOracle: Send + Sync {
    fn run(&self, request: OracleRequest) -> OracleStream;
}
