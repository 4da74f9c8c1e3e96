use serde::{Deserialize, Serialize};

/// Video author, keyed by (name, pod_id). A `None` pod_id means the author
/// lives on this pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub pod_id: Option<i64>,
}

impl Author {
    pub fn is_local(&self) -> bool {
        self.pod_id.is_none()
    }
}
