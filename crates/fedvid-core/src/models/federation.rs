use serde::{Deserialize, Serialize};

use super::{Tag, Video};

/// Full-object wire representation of a video, as sent to peers for add
/// and update events. Peers key mirrored rows on `remote_id`, the id the
/// origin pod assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteVideo {
    pub remote_id: i64,
    pub name: String,
    pub extname: String,
    pub category: i32,
    pub licence: i32,
    pub language: Option<i32>,
    pub nsfw: bool,
    pub description: String,
    pub duration: i32,
    pub author: String,
    pub tags: Vec<String>,
}

impl RemoteVideo {
    pub fn from_video(video: &Video, author_name: &str, tags: &[Tag]) -> Self {
        Self {
            remote_id: video.id,
            name: video.name.clone(),
            extname: video.extname.clone(),
            category: video.category,
            licence: video.licence,
            language: video.language,
            nsfw: video.nsfw,
            description: video.description.clone(),
            duration: video.duration,
            author: author_name.to_string(),
            tags: tags.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Outbound federation message.
///
/// `AddVideo` and `UpdateVideo` are delivered synchronously inside the
/// mutation transaction; the delta and event forms are always best-effort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FederationEvent {
    AddVideo { video: RemoteVideo },
    UpdateVideo { video: RemoteVideo },
    /// Lightweight counter delta ("quick-and-dirty update").
    QuickUpdateViews { remote_id: i64, views: i64 },
    /// Discrete view notification addressed to the origin pod of a
    /// federated video.
    ViewEvent { remote_id: i64 },
}

impl FederationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FederationEvent::AddVideo { .. } => "add-video",
            FederationEvent::UpdateVideo { .. } => "update-video",
            FederationEvent::QuickUpdateViews { .. } => "quick-update-views",
            FederationEvent::ViewEvent { .. } => "view-event",
        }
    }
}
