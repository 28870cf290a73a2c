//! Request and response models shared between the CLI and the Buildship build API

pub mod models;

pub use models::*;
