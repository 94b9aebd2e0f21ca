pub mod git;
mod manager;

pub use manager::{Workspace, WorkspaceManager};
