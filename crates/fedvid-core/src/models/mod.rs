//! Data models for the application
//!
//! Domain entities plus the federation wire payloads, organized by area.

mod author;
mod federation;
mod tag;
mod video;

// Re-export all models for convenient imports
pub use author::*;
pub use federation::*;
pub use tag::*;
pub use video::*;
