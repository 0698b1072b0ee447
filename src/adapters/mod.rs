// Adapters layer: concrete implementations for external systems (upstream model, backend API).

pub mod gemini;
pub mod teacher_client;

pub use gemini::GeminiModel;
pub use teacher_client::TeacherClient;
