pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{GeminiModel, TeacherClient};
pub use app::{router, AppState, Classroom};
pub use config::ServerConfig;
pub use core::engine::TeacherEngine;
pub use domain::model::{Lesson, Level};
pub use utils::error::{ClientError, Result, TeacherError};
