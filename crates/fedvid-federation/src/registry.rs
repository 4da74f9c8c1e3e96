//! Peer registry
//!
//! Peer discovery is out of scope; the registry is the seam where a
//! dynamic pod table would plug in. The static implementation is built
//! from configuration.

use async_trait::async_trait;

use fedvid_core::FederationConfig;

/// A reachable peer pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub id: i64,
    /// Base URL, e.g. "https://pod.example.com".
    pub url: String,
}

#[async_trait]
pub trait PeerRegistry: Send + Sync {
    async fn list_peers(&self) -> Vec<PeerAddress>;

    /// Look up a single peer by pod id, for events addressed to the
    /// origin pod of a federated video.
    async fn find_peer(&self, pod_id: i64) -> Option<PeerAddress>;
}

/// Configuration-backed registry. Pod ids are assigned by position
/// (1-based) in the configured peer list.
pub struct StaticPeerRegistry {
    peers: Vec<PeerAddress>,
}

impl StaticPeerRegistry {
    pub fn new(peers: Vec<PeerAddress>) -> Self {
        Self { peers }
    }

    pub fn from_config(config: &FederationConfig) -> Self {
        let peers = config
            .peers
            .iter()
            .enumerate()
            .map(|(i, url)| PeerAddress {
                id: (i + 1) as i64,
                url: url.clone(),
            })
            .collect();

        Self { peers }
    }
}

#[async_trait]
impl PeerRegistry for StaticPeerRegistry {
    async fn list_peers(&self) -> Vec<PeerAddress> {
        self.peers.clone()
    }

    async fn find_peer(&self, pod_id: i64) -> Option<PeerAddress> {
        self.peers.iter().find(|p| p.id == pod_id).cloned()
    }
}
