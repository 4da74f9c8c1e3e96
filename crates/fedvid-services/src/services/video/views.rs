//! View accounting side channel
//!
//! Views are incidental counters: the increment goes straight to the
//! store (no read-modify-write of an in-memory copy, which would lose
//! updates under concurrency), outside any transaction, and the
//! federation delta is fire-and-forget. Nothing here ever changes the
//! outcome the caller sees, beyond the increment's own latency.

use std::sync::Arc;

use fedvid_core::models::Video;
use fedvid_core::AppError;
use fedvid_db::Store;
use fedvid_federation::FederationBroadcaster;

pub struct ViewAccounting<S: Store> {
    store: Arc<S>,
    federation: Arc<FederationBroadcaster>,
}

impl<S: Store> ViewAccounting<S> {
    pub fn new(store: Arc<S>, federation: Arc<FederationBroadcaster>) -> Self {
        Self { store, federation }
    }

    /// Record one view and return the video for the response.
    ///
    /// Owned video: increment locally, then push the delta to peers in the
    /// background. Federated mirror: no local increment, just a view event
    /// to the origin pod. Counter and broadcast failures are logged and
    /// swallowed.
    pub async fn record_view(&self, video_id: i64) -> Result<Video, AppError> {
        let video = self
            .store
            .get_video(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("video {video_id}")))?;

        if video.is_owned() {
            if let Err(e) = self.store.increment_views(video_id).await {
                tracing::error!(video_id, error = %e, "cannot add view to video");
                return Ok(video);
            }

            let federation = self.federation.clone();
            let views = video.views + 1;
            tokio::spawn(async move {
                federation.broadcast_quick_update(video_id, views).await;
            });
        } else if let Some((pod_id, remote_id)) = video.origin_pod_id.zip(video.remote_id) {
            let federation = self.federation.clone();
            tokio::spawn(async move {
                federation.send_view_event(pod_id, remote_id).await;
            });
        } else {
            tracing::warn!(video_id, "federated video without origin reference");
        }

        Ok(video)
    }
}
