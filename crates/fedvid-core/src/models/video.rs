use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted video row.
///
/// `id` is assigned by the store at persistence time; nothing may derive
/// state from it earlier. The on-disk filename is always computed from the
/// identity and is never stored separately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: i64,
    pub name: String,
    /// File extension including the leading dot, e.g. ".webm".
    pub extname: String,
    /// Opaque enumerants; their meaning lives in the HTTP layer.
    pub category: i32,
    pub licence: i32,
    pub language: Option<i32>,
    pub nsfw: bool,
    pub description: String,
    /// Duration in seconds, probed from the uploaded file.
    pub duration: i32,
    pub views: i64,
    pub author_id: i64,
    /// Origin pod for federated mirrors; `None` means this pod authored it.
    /// Mirrors always carry `remote_id` as well.
    pub origin_pod_id: Option<i64>,
    /// The id the origin pod assigned, for federated mirrors.
    pub remote_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Video {
    /// Canonical on-disk filename, bound to the assigned identity.
    pub fn filename(&self) -> String {
        format!("{}{}", self.id, self.extname)
    }

    /// Whether this pod authored the video (vs. a federated mirror).
    pub fn is_owned(&self) -> bool {
        self.origin_pod_id.is_none()
    }
}

/// In-memory candidate built by the pipeline before persistence.
#[derive(Debug, Clone)]
pub struct VideoDraft {
    pub name: String,
    pub extname: String,
    pub category: i32,
    pub licence: i32,
    pub language: Option<i32>,
    pub nsfw: bool,
    pub description: String,
    pub duration: i32,
    pub author_id: i64,
    pub origin_pod_id: Option<i64>,
    pub remote_id: Option<i64>,
}

/// Validated creation input, as handed over by the HTTP layer.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoCreate {
    pub name: String,
    pub category: i32,
    pub licence: i32,
    pub language: Option<i32>,
    pub nsfw: bool,
    pub description: String,
    pub tags: Vec<String>,
    /// Username of the authenticated uploader.
    pub author_name: String,
}

/// Partial update. `None` fields are left untouched, never reset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoUpdate {
    pub name: Option<String>,
    pub category: Option<i32>,
    pub licence: Option<i32>,
    pub language: Option<i32>,
    pub nsfw: Option<bool>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl VideoUpdate {
    /// True when no persisted column would change (tags aside).
    pub fn is_field_noop(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.licence.is_none()
            && self.language.is_none()
            && self.nsfw.is_none()
            && self.description.is_none()
    }
}

/// Reference to an upload already staged under the storage root.
///
/// The staged path is exclusively owned by the attempt that placed it until
/// the pipeline renames it to the canonical name.
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Name relative to the storage root, e.g. "abc123.webm".
    pub name: String,
    /// Extension including the leading dot, carried into the draft.
    pub extname: String,
    /// Duration in seconds, probed at upload time.
    pub duration: i32,
}
