//! Buildship CLI Library
//!
//! Project packaging, upload and build supervision for `buildship deploy`.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod files;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod logstream;
pub mod project;
pub mod storage;
pub mod ui;
pub mod upload;
pub mod utils;
pub mod version;
