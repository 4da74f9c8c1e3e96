//! Peer transport
//!
//! The HTTP transport posts serialized events to a peer's remote-events
//! endpoint with a per-request timeout. Transport security (signatures,
//! TLS policy) is out of scope here.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use fedvid_core::models::FederationEvent;
use fedvid_core::AppError;

use crate::registry::PeerAddress;

/// Peer delivery errors
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("peer {peer} timed out")]
    Timeout { peer: String },

    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    #[error("peer {peer} rejected event with status {status}")]
    Rejected { peer: String, status: u16 },

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("transport setup failed: {0}")]
    Transport(String),
}

impl From<FederationError> for AppError {
    fn from(err: FederationError) -> Self {
        AppError::FederationRequired(err.to_string())
    }
}

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Deliver one event to one peer, waiting at most `timeout`.
    async fn send(
        &self,
        peer: &PeerAddress,
        event: &FederationEvent,
        timeout: Duration,
    ) -> Result<(), FederationError>;
}

/// reqwest-based transport.
pub struct HttpPeerTransport {
    client: Client,
}

impl HttpPeerTransport {
    pub fn new() -> Result<Self, FederationError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| FederationError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn send(
        &self,
        peer: &PeerAddress,
        event: &FederationEvent,
        timeout: Duration,
    ) -> Result<(), FederationError> {
        let url = format!("{}/api/remote/events", peer.url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FederationError::Timeout {
                        peer: peer.url.clone(),
                    }
                } else {
                    FederationError::Unreachable {
                        peer: peer.url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FederationError::Rejected {
                peer: peer.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
