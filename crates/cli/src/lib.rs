#![deny(unsafe_code)]

pub mod app;
pub mod error;
pub mod settings;
pub mod terminal;

pub use app::{QUIT_COMMAND, run};
pub use error::{AppError, AppResult};
pub use settings::{AppSettings, SettingsError, SettingsResult};
pub use terminal::TerminalView;
