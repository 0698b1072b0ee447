pub mod engine;
pub mod prompt;
pub mod repair;
pub mod retry;
