//! Store abstraction
//!
//! The mutation pipeline only ever talks to these two traits. The store is
//! assumed to be ACID-capable and to expose SERIALIZABLE isolation; it is
//! responsible for classifying its failures into [`StoreError`] so the
//! retry executor can tell a recoverable serialization conflict from a
//! fatal error.

use async_trait::async_trait;

use fedvid_core::models::{Author, Tag, Video, VideoDraft, VideoUpdate};
use fedvid_core::StoreError;

/// A single open SERIALIZABLE transaction.
///
/// All row locks live in the store, not in this process. The handle is
/// exclusively owned by one attempt; a retry always starts from a fresh
/// one, never reuses a rolled-back handle.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Find-or-create an author keyed by (name, pod_id). `None` pod_id
    /// denotes a local author.
    async fn find_or_create_author(
        &mut self,
        name: &str,
        pod_id: Option<i64>,
    ) -> Result<Author, StoreError>;

    /// Find-or-create tags by name. Input order is irrelevant; duplicates
    /// are collapsed. Never creates a second row for an existing name.
    async fn find_or_create_tags(&mut self, names: &[String]) -> Result<Vec<Tag>, StoreError>;

    async fn get_author(&mut self, id: i64) -> Result<Option<Author>, StoreError>;

    async fn get_video(&mut self, id: i64) -> Result<Option<Video>, StoreError>;

    /// Persist a draft. The store assigns the identity here; this is the
    /// first point at which the canonical filename exists.
    async fn insert_video(&mut self, draft: &VideoDraft) -> Result<Video, StoreError>;

    /// Apply only the supplied fields; absent fields keep their current
    /// values. Tag changes go through [`Self::set_video_tags`].
    async fn update_video(&mut self, id: i64, fields: &VideoUpdate) -> Result<Video, StoreError>;

    /// Replace the tag association set of a video.
    async fn set_video_tags(&mut self, video_id: i64, tag_ids: &[i64]) -> Result<(), StoreError>;

    async fn get_video_tags(&mut self, video_id: i64) -> Result<Vec<Tag>, StoreError>;

    /// Commit. Surfaces `SerializationConflict` when the store aborts the
    /// transaction at its commit-time validation.
    async fn commit(self) -> Result<(), StoreError>;

    /// Roll back. Idempotent from the caller's perspective: a rollback
    /// failure is logged, never returned, and the transaction is gone
    /// either way.
    async fn rollback(self);
}

/// Handle to the store itself.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTransaction + Send + 'static;

    /// Open a SERIALIZABLE transaction. Fails `Unavailable` when the store
    /// cannot start one.
    async fn begin_serializable(&self) -> Result<Self::Tx, StoreError>;

    /// Read a video outside any transaction.
    async fn get_video(&self, id: i64) -> Result<Option<Video>, StoreError>;

    /// Increment the view counter directly at the store (`views = views +
    /// 1`), never through a read-modify-write of an in-memory copy.
    async fn increment_views(&self, video_id: i64) -> Result<(), StoreError>;

    /// Delete a video row (tag associations cascade).
    async fn delete_video(&self, video_id: i64) -> Result<(), StoreError>;
}
