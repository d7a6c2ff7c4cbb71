//! Shared configuration schema and error type for pixelbot crates.

pub mod config;
pub mod error;

pub use error::{Error, Result};
