//! The three commands: `list`, `analyze` and `triage`.

mod list;
mod remediate;
pub mod types;

pub use list::list_failures;
pub use remediate::remediate;
