//! Detect → dispatch → reconcile.

pub mod detector;
pub mod dispatcher;
pub mod reconciler;
pub mod scanner;
pub mod types;
