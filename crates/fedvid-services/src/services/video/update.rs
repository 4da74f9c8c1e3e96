//! Video update pipeline
//!
//! Differs from creation in three ways: tag resolution only runs when the
//! request supplies tags, persistence touches only the supplied fields,
//! and there is no file rename since the identity (and therefore the
//! filename) is already stable. The current row is fetched inside the
//! transaction so every retry validates against fresh state.

use std::sync::Arc;

use async_trait::async_trait;

use fedvid_core::models::{RemoteVideo, Tag, Video, VideoUpdate};
use fedvid_core::{AppError, StoreError};
use fedvid_db::StoreTransaction;
use fedvid_federation::FederationBroadcaster;

use crate::services::pipeline::{Pipeline, Step};

pub(crate) struct UpdateContext<T: StoreTransaction> {
    pub tx: Option<T>,
    pub video_id: i64,
    pub update: VideoUpdate,
    pub federation: Arc<FederationBroadcaster>,
    /// Current row after `FetchVideo`, updated row after `ApplyFields`.
    pub video: Option<Video>,
    /// Resolved only when the request supplied tags.
    pub tags: Option<Vec<Tag>>,
}

struct FetchVideo;

#[async_trait]
impl<T: StoreTransaction> Step<UpdateContext<T>> for FetchVideo {
    fn name(&self) -> &'static str {
        "fetch-video"
    }

    async fn run(&self, ctx: &mut UpdateContext<T>) -> Result<(), AppError> {
        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        let video = tx
            .get_video(ctx.video_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("video {}", ctx.video_id)))?;
        ctx.video = Some(video);
        Ok(())
    }
}

struct ResolveTags;

#[async_trait]
impl<T: StoreTransaction> Step<UpdateContext<T>> for ResolveTags {
    fn name(&self) -> &'static str {
        "resolve-tags"
    }

    async fn run(&self, ctx: &mut UpdateContext<T>) -> Result<(), AppError> {
        let Some(names) = &ctx.update.tags else {
            return Ok(());
        };

        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        ctx.tags = Some(tx.find_or_create_tags(names).await?);
        Ok(())
    }
}

struct ApplyFields;

#[async_trait]
impl<T: StoreTransaction> Step<UpdateContext<T>> for ApplyFields {
    fn name(&self) -> &'static str {
        "apply-fields"
    }

    async fn run(&self, ctx: &mut UpdateContext<T>) -> Result<(), AppError> {
        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        ctx.video = Some(tx.update_video(ctx.video_id, &ctx.update).await?);
        Ok(())
    }
}

struct AssociateTags;

#[async_trait]
impl<T: StoreTransaction> Step<UpdateContext<T>> for AssociateTags {
    fn name(&self) -> &'static str {
        "associate-tags"
    }

    async fn run(&self, ctx: &mut UpdateContext<T>) -> Result<(), AppError> {
        let Some(tags) = &ctx.tags else {
            return Ok(());
        };
        let tag_ids: Vec<i64> = tags.iter().map(|t| t.id).collect();

        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        tx.set_video_tags(ctx.video_id, &tag_ids).await?;
        Ok(())
    }
}

struct BroadcastUpdate;

#[async_trait]
impl<T: StoreTransaction> Step<UpdateContext<T>> for BroadcastUpdate {
    fn name(&self) -> &'static str {
        "broadcast-update"
    }

    async fn run(&self, ctx: &mut UpdateContext<T>) -> Result<(), AppError> {
        let video = ctx.video.clone().expect("fields applied");

        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        let tags = match &ctx.tags {
            Some(tags) => tags.clone(),
            None => tx.get_video_tags(ctx.video_id).await?,
        };
        let author = tx
            .get_author(video.author_id)
            .await?
            .ok_or_else(|| {
                StoreError::Backend(format!("author {} not found", video.author_id))
            })?;

        let remote = RemoteVideo::from_video(&video, &author.name, &tags);
        ctx.federation.broadcast_update(&remote).await?;
        Ok(())
    }
}

struct Commit;

#[async_trait]
impl<T: StoreTransaction> Step<UpdateContext<T>> for Commit {
    fn name(&self) -> &'static str {
        "commit"
    }

    async fn run(&self, ctx: &mut UpdateContext<T>) -> Result<(), AppError> {
        let tx = ctx.tx.take().expect("transaction already consumed");
        tx.commit().await?;
        Ok(())
    }
}

pub(crate) fn build_pipeline<T: StoreTransaction + 'static>() -> Pipeline<UpdateContext<T>> {
    Pipeline::new(vec![
        Box::new(FetchVideo) as Box<dyn Step<UpdateContext<T>>>,
        Box::new(ResolveTags),
        Box::new(ApplyFields),
        Box::new(AssociateTags),
        Box::new(BroadcastUpdate),
        Box::new(Commit),
    ])
}

/// Roll back a failed attempt. Updates have no filesystem side effects to
/// undo; the rollback itself never raises.
pub(crate) async fn finalize_failure<T: StoreTransaction>(
    mut ctx: UpdateContext<T>,
    err: AppError,
) -> AppError {
    if let Some(tx) = ctx.tx.take() {
        tx.rollback().await;
    }
    err
}
