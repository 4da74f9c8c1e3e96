//! Fedvid Core Library
//!
//! This crate provides the domain models, error taxonomy, and configuration
//! shared across all fedvid components.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{FederationConfig, StorageConfig, VideoServiceConfig};
pub use error::{AppError, StoreError};
