//! Data model, configuration and workspace state for OmniStudio.

pub mod conversation;
pub mod error;
pub mod message;
pub mod models;
pub mod project;
pub mod secrets;
pub mod settings;

pub use error::{Result, StudioError};
pub use project::{initialize_project, verify_project_initialized};
