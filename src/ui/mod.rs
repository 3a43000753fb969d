mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::{App, CaptureEnvironment};
pub use terminal::run_app;
