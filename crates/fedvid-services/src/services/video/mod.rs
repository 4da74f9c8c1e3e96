//! Video mutation service
//!
//! Entry points for the HTTP layer. Each mutation runs as an ordered
//! pipeline inside one SERIALIZABLE transaction, wrapped in the
//! conflict-retry executor; the input is cloned per attempt so a retry
//! never sees state mutated by a rolled-back attempt.

pub mod create;
pub mod update;
pub mod views;

pub use views::ViewAccounting;

use std::sync::Arc;

use fedvid_core::models::{StagedFile, Video, VideoCreate, VideoUpdate};
use fedvid_core::{AppError, VideoServiceConfig};
use fedvid_db::{retry_on_conflict, Store};
use fedvid_federation::FederationBroadcaster;
use fedvid_storage::FileStore;

pub struct VideoService<S: Store> {
    store: Arc<S>,
    files: Arc<dyn FileStore>,
    federation: Arc<FederationBroadcaster>,
    config: VideoServiceConfig,
}

impl<S: Store> VideoService<S> {
    pub fn new(
        store: Arc<S>,
        files: Arc<dyn FileStore>,
        federation: Arc<FederationBroadcaster>,
        config: VideoServiceConfig,
    ) -> Self {
        Self {
            store,
            files,
            federation,
            config,
        }
    }

    /// Create a video from validated input and a staged upload.
    ///
    /// Returns the committed row, or a definitive error: either nothing
    /// was persisted and no required broadcast went out, or everything
    /// was. Retried (bounded by `max_commit_retries`) only on
    /// serialization conflicts.
    pub async fn create_video(
        &self,
        input: VideoCreate,
        staged: StagedFile,
    ) -> Result<Video, AppError> {
        let pipeline = create::build_pipeline::<S::Tx>();

        let video = retry_on_conflict(
            self.store.as_ref(),
            self.config.max_commit_retries,
            "create video",
            |tx| {
                // Fresh copy of the draft input per attempt.
                let mut ctx = create::CreateContext {
                    tx: Some(tx),
                    input: input.clone(),
                    staged: staged.clone(),
                    files: self.files.clone(),
                    federation: self.federation.clone(),
                    transcoding_enabled: self.config.transcoding_enabled,
                    author: None,
                    tags: Vec::new(),
                    draft: None,
                    video: None,
                    renamed_to: None,
                };
                let pipeline = &pipeline;

                async move {
                    match pipeline.run(&mut ctx).await {
                        Ok(()) => Ok(ctx
                            .video
                            .take()
                            .expect("persist step ran before commit")),
                        Err(err) => Err(create::finalize_failure(ctx, err).await),
                    }
                }
            },
        )
        .await?;

        tracing::info!(video_id = video.id, name = %video.name, "video created");
        Ok(video)
    }

    /// Apply a partial update. Fields absent from `update` are left
    /// untouched. The current row is re-fetched inside each attempt's
    /// transaction, never carried across a retry.
    pub async fn update_video(&self, id: i64, update: VideoUpdate) -> Result<Video, AppError> {
        let pipeline = update::build_pipeline::<S::Tx>();

        let video = retry_on_conflict(
            self.store.as_ref(),
            self.config.max_commit_retries,
            "update video",
            |tx| {
                let mut ctx = update::UpdateContext {
                    tx: Some(tx),
                    video_id: id,
                    update: update.clone(),
                    federation: self.federation.clone(),
                    video: None,
                    tags: None,
                };
                let pipeline = &pipeline;

                async move {
                    match pipeline.run(&mut ctx).await {
                        Ok(()) => Ok(ctx.video.take().expect("apply step ran before commit")),
                        Err(err) => Err(update::finalize_failure(ctx, err).await),
                    }
                }
            },
        )
        .await?;

        tracing::info!(video_id = video.id, "video updated");
        Ok(video)
    }

    pub async fn get_video(&self, id: i64) -> Result<Video, AppError> {
        self.store
            .get_video(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("video {id}")))
    }

    /// Delete a video row and its canonical file. The file removal is
    /// best-effort once the row is gone.
    pub async fn delete_video(&self, id: i64) -> Result<(), AppError> {
        let video = self.get_video(id).await?;

        self.store.delete_video(id).await?;

        if let Err(e) = self.files.remove(&video.filename()).await {
            tracing::warn!(video_id = id, error = %e, "could not remove video file");
        }

        tracing::info!(video_id = id, "video removed");
        Ok(())
    }
}
