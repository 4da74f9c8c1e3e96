//! Fedvid file storage
//!
//! File placement for staged uploads and their canonical, identity-derived
//! names. The pipeline renames a staged upload in place once the store has
//! assigned the video identity; until then the staged path is exclusively
//! owned by the attempt that placed it.

pub mod local;
pub mod traits;

pub use local::LocalFileStore;
pub use traits::{FileStore, FileStoreError, FileStoreResult};
