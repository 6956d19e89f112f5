//! Core of the yuyi tray translator: settings, the window visibility owner,
//! the hotkey/tray dispatch loops and the chat-completion translator.
//!
//! The desktop shell (window, tray icon, global hotkey, clipboard) lives in
//! the binary behind the `desktop` feature.

pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod logger;
pub mod translator;
pub mod visibility;

pub use app::{App, Clipboard};
pub use config::{Config, ConfigStore};
pub use drivers::TrayAction;
pub use error::TranslateError;
pub use translator::{split_results, TranslationRequest, Translator};
pub use visibility::{VisibilityController, WindowEvent, WindowSurface};
