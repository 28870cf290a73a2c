//! Project configuration (`buildship.toml`)

pub mod config;
pub mod loader;
pub mod validator;

pub use config::ProjectConfig;
