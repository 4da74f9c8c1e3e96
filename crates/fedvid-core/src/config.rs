//! Configuration module
//!
//! Explicit configuration for the mutation pipeline, federation delivery,
//! and local file placement. Everything has a sensible default and can be
//! overridden from the environment.

use std::env;

use anyhow::Context;

const MAX_COMMIT_RETRIES: u32 = 5;
const FEDERATION_TIMEOUT_SECS: u64 = 10;

/// Video mutation service configuration
#[derive(Clone, Debug)]
pub struct VideoServiceConfig {
    /// Upper bound on attempts when the store reports serialization
    /// conflicts. Other failures never re-enter the loop.
    pub max_commit_retries: u32,
    /// When transcoding is enabled the add broadcast is deferred to the
    /// transcoding job (the file extension may still change), so the
    /// create pipeline skips the synchronous broadcast.
    pub transcoding_enabled: bool,
}

impl Default for VideoServiceConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: MAX_COMMIT_RETRIES,
            transcoding_enabled: false,
        }
    }
}

impl VideoServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();

        Ok(Self {
            max_commit_retries: env::var("MAX_COMMIT_RETRIES")
                .map(|v| v.parse::<u32>())
                .unwrap_or(Ok(defaults.max_commit_retries))
                .context("MAX_COMMIT_RETRIES must be an integer")?,
            transcoding_enabled: env::var("TRANSCODING_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.transcoding_enabled),
        })
    }
}

/// Federation delivery configuration
#[derive(Clone, Debug)]
pub struct FederationConfig {
    /// Per-request upper bound on how long a peer delivery may take.
    pub request_timeout_seconds: u64,
    /// Peer base URLs, e.g. "https://pod.example.com".
    pub peers: Vec<String>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: FEDERATION_TIMEOUT_SECS,
            peers: Vec::new(),
        }
    }
}

impl FederationConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();

        let peers = env::var("FEDERATION_PEERS")
            .map(|v| {
                v.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.peers);

        Ok(Self {
            request_timeout_seconds: env::var("FEDERATION_TIMEOUT_SECONDS")
                .map(|v| v.parse::<u64>())
                .unwrap_or(Ok(defaults.request_timeout_seconds))
                .context("FEDERATION_TIMEOUT_SECONDS must be an integer")?,
            peers,
        })
    }
}

/// Local storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Base directory holding both staged uploads and canonical video files.
    pub storage_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_root: "/var/lib/fedvid/videos".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Self {
            storage_root: env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| Self::default().storage_root),
        })
    }
}
