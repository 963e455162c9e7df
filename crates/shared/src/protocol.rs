use serde::{Deserialize, Serialize};

use crate::domain::Sample;

/// Opaque token marking how much of the update stream a client has
/// consumed. Monotonically advancing; owned by the sync engine for the
/// lifetime of a session, never stored durably.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UpdateCursor(pub u64);

/// Body of `POST /message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum MessageRequest {
    GetData,
    Update { data: Sample },
}

/// Full corpus snapshot plus the cursor to poll from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub data: Vec<Sample>,
    #[serde(rename = "nextId")]
    pub next_id: UpdateCursor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    pub response: SnapshotPayload,
}

/// Positional in-place replacement of one sample. `index` is the slot's
/// position in the corpus, not the sample's stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub index: usize,
    pub id: u64,
    pub entry: Sample,
}

/// Body of `GET /getupdates`. Exactly one of `data`/`updates` is
/// populated for the snapshot-vs-patch branches; both absent is the
/// heartbeat case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesPayload {
    #[serde(rename = "nextId")]
    pub next_id: UpdateCursor,
    pub data: Option<Vec<Sample>>,
    pub updates: Option<Vec<PatchEntry>>,
}

impl UpdatesPayload {
    pub fn heartbeat(next_id: UpdateCursor) -> Self {
        Self {
            next_id,
            data: None,
            updates: None,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.data.is_none() && self.updates.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesEnvelope {
    pub response: UpdatesPayload,
}

/// Acknowledgment for an update submission. The body is not
/// interpreted beyond being well-formed JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckEnvelope {
    pub response: serde_json::Value,
}
