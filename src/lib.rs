//! Per-user virtual filesystem over an S3-compatible bucket.

pub mod archive;
pub mod config;
pub mod directory;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod path;
pub mod resource;
pub mod server;
pub mod storage;

pub use error::{Error, Result};
