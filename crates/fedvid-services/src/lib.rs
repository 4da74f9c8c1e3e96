//! Fedvid services
//!
//! The mutation pipeline over the store, file store, and federation
//! layers. This crate exposes the entry points the HTTP layer calls:
//! [`VideoService`] for create/update/delete and [`ViewAccounting`] for
//! the view side channel.

pub mod services;

pub use services::pipeline::{Pipeline, Step};
pub use services::video::{ViewAccounting, VideoService};
