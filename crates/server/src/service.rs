//! Review service state: the corpus, an update log bounded to the last
//! 500 entries, and the branch logic that decides whether a polling
//! client gets patches, a full snapshot (it fell behind the bounded
//! log), or a heartbeat.

use std::{
    collections::{HashMap, VecDeque},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use shared::{
    domain::Sample,
    protocol::{PatchEntry, SnapshotPayload, UpdateCursor, UpdatesPayload},
};
use thiserror::Error;
use tracing::{info, warn};

/// Updates retained for incremental polling; clients whose cursor
/// predates the retained window get a full snapshot instead.
const UPDATE_BACKLOG: usize = 500;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no sample with url {0:?}")]
    UnknownUrl(String),
}

pub struct ReviewService {
    data: Vec<Sample>,
    updates: VecDeque<PatchEntry>,
    next_update_id: u64,
    idx_by_url: HashMap<String, usize>,
}

impl ReviewService {
    pub fn new(data: Vec<Sample>) -> Self {
        let idx_by_url = data
            .iter()
            .enumerate()
            .map(|(position, sample)| (sample.url.clone(), position))
            .collect();
        Self {
            data,
            updates: VecDeque::with_capacity(UPDATE_BACKLOG),
            next_update_id: 0,
            idx_by_url,
        }
    }

    /// Loads the corpus from `<data_dir>/index` and folds previously
    /// archived verdicts back in.
    pub fn from_data_dir(data_dir: &Path) -> Result<Self> {
        let index_path = data_dir.join("index");
        let raw = fs::read_to_string(&index_path)
            .with_context(|| format!("failed to read corpus index {}", index_path.display()))?;
        let data: Vec<Sample> = serde_json::from_str(&raw)
            .with_context(|| format!("malformed corpus index {}", index_path.display()))?;
        let mut service = Self::new(data);

        let archive_dir = data_dir.join("archive");
        if archive_dir.is_dir() {
            let mut restored = 0usize;
            for entry in fs::read_dir(&archive_dir)? {
                let path = entry?.path();
                if !path.is_file() {
                    continue;
                }
                match fs::read_to_string(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|raw| serde_json::from_str::<Vec<Sample>>(&raw).map_err(Into::into))
                {
                    Ok(archived) => restored += service.restore_archived_verdicts(&archived),
                    Err(err) => {
                        warn!(path = %path.display(), %err, "skipping unreadable archive");
                    }
                }
            }
            info!(restored, "restored archived verdicts");
        }

        Ok(service)
    }

    fn restore_archived_verdicts(&mut self, archived: &[Sample]) -> usize {
        let mut restored = 0;
        for sample in archived {
            if sample.verdict.is_none() {
                continue;
            }
            let Some(&position) = self.idx_by_url.get(&sample.url) else {
                continue;
            };
            if self.data[position].index != sample.index {
                warn!(
                    url = %sample.url,
                    live_index = self.data[position].index.0,
                    archived_index = sample.index.0,
                    "archived sample identity disagrees with the corpus; skipping"
                );
                continue;
            }
            self.data[position].verdict = sample.verdict;
            restored += 1;
        }
        restored
    }

    pub fn data(&self) -> &[Sample] {
        &self.data
    }

    pub fn snapshot(&self) -> SnapshotPayload {
        SnapshotPayload {
            data: self.data.clone(),
            next_id: UpdateCursor(self.next_update_id),
        }
    }

    /// Replaces the sample addressed by the entry's url and appends a
    /// positional patch to the update log.
    pub fn apply_update(&mut self, entry: Sample) -> Result<(), ServiceError> {
        let Some(&position) = self.idx_by_url.get(&entry.url) else {
            return Err(ServiceError::UnknownUrl(entry.url));
        };
        self.data[position] = entry.clone();
        if self.updates.len() == UPDATE_BACKLOG {
            self.updates.pop_front();
        }
        self.updates.push_back(PatchEntry {
            index: position,
            id: self.next_update_id,
            entry,
        });
        self.next_update_id += 1;
        Ok(())
    }

    /// Everything the client with `cursor` has not yet seen: patches
    /// when its cursor is inside the retained window, a full snapshot
    /// when it fell behind, a heartbeat when it is caught up.
    pub fn updates_since(&self, cursor: UpdateCursor) -> UpdatesPayload {
        let mut payload = UpdatesPayload::heartbeat(cursor);
        if let (Some(first), Some(last)) = (self.updates.front(), self.updates.back()) {
            payload.next_id = UpdateCursor(last.id + 1);
            if first.id > cursor.0 {
                payload.data = Some(self.data.clone());
            } else if last.id >= cursor.0 {
                let skip = (cursor.0 - first.id) as usize;
                payload.updates = Some(self.updates.iter().skip(skip).cloned().collect());
            }
        }
        payload
    }

    /// Id of the newest applied update, if any; drives the archiver's
    /// has-changes check.
    pub fn last_update_id(&self) -> Option<u64> {
        self.next_update_id.checked_sub(1)
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
