//! Federation broadcaster
//!
//! Two delivery disciplines, on purpose. `broadcast_add` and
//! `broadcast_update` participate in the caller's transaction boundary:
//! any failed peer fails the whole call so the enclosing mutation rolls
//! back, keeping local and remote state from diverging. The delta and
//! event forms are best-effort: failures are logged per peer and never
//! reach the caller, since incidental counters tolerate loss.

use std::sync::Arc;
use std::time::Duration;

use fedvid_core::models::{FederationEvent, RemoteVideo};
use fedvid_core::FederationConfig;

use crate::registry::PeerRegistry;
use crate::transport::{FederationError, PeerTransport};

pub struct FederationBroadcaster {
    registry: Arc<dyn PeerRegistry>,
    transport: Arc<dyn PeerTransport>,
    request_timeout: Duration,
}

impl FederationBroadcaster {
    pub fn new(
        registry: Arc<dyn PeerRegistry>,
        transport: Arc<dyn PeerTransport>,
        config: &FederationConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }

    /// Announce a newly created video to every peer. Required delivery:
    /// the first failed peer aborts and the error propagates.
    #[tracing::instrument(skip(self, video), fields(remote_id = video.remote_id))]
    pub async fn broadcast_add(&self, video: &RemoteVideo) -> Result<(), FederationError> {
        self.deliver_required(FederationEvent::AddVideo {
            video: video.clone(),
        })
        .await
    }

    /// Announce updated video metadata to every peer. Required delivery.
    #[tracing::instrument(skip(self, video), fields(remote_id = video.remote_id))]
    pub async fn broadcast_update(&self, video: &RemoteVideo) -> Result<(), FederationError> {
        self.deliver_required(FederationEvent::UpdateVideo {
            video: video.clone(),
        })
        .await
    }

    /// Push a view-count delta to every peer. Best-effort.
    pub async fn broadcast_quick_update(&self, remote_id: i64, views: i64) {
        self.deliver_best_effort(FederationEvent::QuickUpdateViews { remote_id, views })
            .await;
    }

    /// Notify the origin pod of a federated video about a local view.
    /// Best-effort.
    pub async fn send_view_event(&self, origin_pod_id: i64, remote_id: i64) {
        let Some(peer) = self.registry.find_peer(origin_pod_id).await else {
            tracing::warn!(origin_pod_id, "origin pod not in peer registry");
            return;
        };

        let event = FederationEvent::ViewEvent { remote_id };
        if let Err(e) = self.transport.send(&peer, &event, self.request_timeout).await {
            tracing::warn!(
                peer = %peer.url,
                error = %e,
                "best-effort view event dropped"
            );
        }
    }

    async fn deliver_required(&self, event: FederationEvent) -> Result<(), FederationError> {
        let peers = self.registry.list_peers().await;

        for peer in &peers {
            self.transport
                .send(peer, &event, self.request_timeout)
                .await
                .map_err(|e| {
                    tracing::warn!(
                        peer = %peer.url,
                        event = event.kind(),
                        error = %e,
                        "required broadcast failed"
                    );
                    e
                })?;
        }

        tracing::info!(
            event = event.kind(),
            peer_count = peers.len(),
            "event delivered to all peers"
        );

        Ok(())
    }

    async fn deliver_best_effort(&self, event: FederationEvent) {
        for peer in self.registry.list_peers().await {
            if let Err(e) = self.transport.send(&peer, &event, self.request_timeout).await {
                tracing::warn!(
                    peer = %peer.url,
                    event = event.kind(),
                    error = %e,
                    "best-effort delivery dropped"
                );
            }
        }
    }
}
