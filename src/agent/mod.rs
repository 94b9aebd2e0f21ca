pub mod claude;
pub mod engine;
pub mod tools;
