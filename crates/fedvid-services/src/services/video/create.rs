//! Video creation pipeline
//!
//! Ordered steps: resolve author, resolve tags, build the draft, persist
//! it (identity is assigned here), rename the staged file to the
//! identity-derived name, associate tags, broadcast the add event, commit.
//! The draft never learns its filename before persistence because the
//! filename does not exist until the store assigns the identity.

use std::sync::Arc;

use async_trait::async_trait;

use fedvid_core::models::{
    Author, RemoteVideo, StagedFile, Tag, Video, VideoCreate, VideoDraft,
};
use fedvid_core::AppError;
use fedvid_db::StoreTransaction;
use fedvid_federation::FederationBroadcaster;
use fedvid_storage::FileStore;

use crate::services::pipeline::{Pipeline, Step};

pub(crate) struct CreateContext<T: StoreTransaction> {
    pub tx: Option<T>,
    pub input: VideoCreate,
    pub staged: StagedFile,
    pub files: Arc<dyn FileStore>,
    pub federation: Arc<FederationBroadcaster>,
    pub transcoding_enabled: bool,
    pub author: Option<Author>,
    pub tags: Vec<Tag>,
    pub draft: Option<VideoDraft>,
    pub video: Option<Video>,
    /// Canonical name the staged file was renamed to, so a failed attempt
    /// can put it back.
    pub renamed_to: Option<String>,
}

struct ResolveAuthor;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for ResolveAuthor {
    fn name(&self) -> &'static str {
        "resolve-author"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        // None pod id: the uploader is always an author on this pod.
        let author = tx
            .find_or_create_author(&ctx.input.author_name, None)
            .await?;
        ctx.author = Some(author);
        Ok(())
    }
}

struct ResolveTags;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for ResolveTags {
    fn name(&self) -> &'static str {
        "resolve-tags"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        ctx.tags = tx.find_or_create_tags(&ctx.input.tags).await?;
        Ok(())
    }
}

struct BuildDraft;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for BuildDraft {
    fn name(&self) -> &'static str {
        "build-draft"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        let author = ctx.author.as_ref().expect("author resolved");

        ctx.draft = Some(VideoDraft {
            name: ctx.input.name.clone(),
            extname: ctx.staged.extname.clone(),
            category: ctx.input.category,
            licence: ctx.input.licence,
            language: ctx.input.language,
            nsfw: ctx.input.nsfw,
            description: ctx.input.description.clone(),
            duration: ctx.staged.duration,
            author_id: author.id,
            origin_pod_id: None,
            remote_id: None,
        });

        Ok(())
    }
}

struct PersistDraft;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for PersistDraft {
    fn name(&self) -> &'static str {
        "persist-draft"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        let draft = ctx.draft.as_ref().expect("draft built");
        ctx.video = Some(tx.insert_video(draft).await?);
        Ok(())
    }
}

struct PlaceFile;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for PlaceFile {
    fn name(&self) -> &'static str {
        "place-file"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        let canonical = ctx.video.as_ref().expect("video persisted").filename();

        ctx.files.rename(&ctx.staged.name, &canonical).await?;
        ctx.renamed_to = Some(canonical);
        Ok(())
    }
}

struct AssociateTags;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for AssociateTags {
    fn name(&self) -> &'static str {
        "associate-tags"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        let video_id = ctx.video.as_ref().expect("video persisted").id;
        let tag_ids: Vec<i64> = ctx.tags.iter().map(|t| t.id).collect();

        let tx = ctx.tx.as_mut().expect("transaction already consumed");
        tx.set_video_tags(video_id, &tag_ids).await?;
        Ok(())
    }
}

struct BroadcastAdd;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for BroadcastAdd {
    fn name(&self) -> &'static str {
        "broadcast-add"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        // The transcoding job announces the video once the final file
        // extension is known.
        if ctx.transcoding_enabled {
            tracing::debug!("transcoding enabled, add broadcast deferred");
            return Ok(());
        }

        let video = ctx.video.as_ref().expect("video persisted");
        let author = ctx.author.as_ref().expect("author resolved");
        let remote = RemoteVideo::from_video(video, &author.name, &ctx.tags);

        ctx.federation.broadcast_add(&remote).await?;
        Ok(())
    }
}

struct Commit;

#[async_trait]
impl<T: StoreTransaction> Step<CreateContext<T>> for Commit {
    fn name(&self) -> &'static str {
        "commit"
    }

    async fn run(&self, ctx: &mut CreateContext<T>) -> Result<(), AppError> {
        let tx = ctx.tx.take().expect("transaction already consumed");
        tx.commit().await?;
        Ok(())
    }
}

pub(crate) fn build_pipeline<T: StoreTransaction + 'static>() -> Pipeline<CreateContext<T>> {
    Pipeline::new(vec![
        Box::new(ResolveAuthor) as Box<dyn Step<CreateContext<T>>>,
        Box::new(ResolveTags),
        Box::new(BuildDraft),
        Box::new(PersistDraft),
        Box::new(PlaceFile),
        Box::new(AssociateTags),
        Box::new(BroadcastAdd),
        Box::new(Commit),
    ])
}

/// Roll back a failed attempt and undo its visible side effects.
///
/// The staged file goes back under its staged name so the next attempt
/// (or the upload layer's cleanup) finds it where it was. If that rename
/// fails the error escalates to a fatal filesystem error: retrying
/// against a missing staged file would be worse.
pub(crate) async fn finalize_failure<T: StoreTransaction>(
    mut ctx: CreateContext<T>,
    err: AppError,
) -> AppError {
    if let Some(tx) = ctx.tx.take() {
        tx.rollback().await;
    }

    if let Some(canonical) = ctx.renamed_to.take() {
        if let Err(undo) = ctx.files.rename(&canonical, &ctx.staged.name).await {
            tracing::error!(
                staged = %ctx.staged.name,
                canonical = %canonical,
                error = %undo,
                "failed to restore staged file after rollback"
            );
            return AppError::Filesystem(format!(
                "could not restore staged upload {}: {undo}",
                ctx.staged.name
            ));
        }
    }

    err
}
