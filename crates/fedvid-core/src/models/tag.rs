use serde::{Deserialize, Serialize};

/// Name-unique tag, resolved with find-or-create semantics inside the
/// active transaction so concurrent resolutions cannot insert duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}
