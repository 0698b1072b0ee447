// App layer: the HTTP surface and the headless classroom built on top of the core.

pub mod board;
pub mod server;
pub mod session;

pub use server::{router, AppState};
pub use session::Classroom;
