pub mod agent;
pub mod config;
pub mod error;
pub mod oracle;
pub mod platform;
pub mod triage;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
mod testing;
