//! Generational on-disk archives of the corpus. Each save lands in the
//! youngest generation; when a generation overflows, entries spaced too
//! closely are deleted and the oldest survivor promotes to the next
//! generation, so disk usage stays bounded while coverage thins out
//! with age.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use shared::domain::Sample;
use tracing::{info, warn};

const GENERATION_COUNT: usize = 4;
/// Minimum spacing (in save ticks) between entries a generation keeps.
const GENERATION_DELTAS: [u64; GENERATION_COUNT] = [0, 10, 100, 1000];
const MAX_GENERATION_LEN: usize = 5;

#[derive(Debug, Clone)]
struct ArchiveEntry {
    last_id: u64,
    path: PathBuf,
    tick: u64,
}

pub struct Archiver {
    dir: PathBuf,
    generations: Vec<Vec<ArchiveEntry>>,
    tick: u64,
    last_saved_id: Option<u64>,
}

impl Archiver {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create archive dir {}", dir.display()))?;
        Ok(Self {
            dir,
            generations: vec![Vec::new(); GENERATION_COUNT],
            tick: 0,
            last_saved_id: None,
        })
    }

    /// Writes a timestamped snapshot when the update stream has moved
    /// since the previous save, then rebalances the generations.
    /// Returns the path written, if any.
    pub fn save_if_changed(
        &mut self,
        data: &[Sample],
        last_update_id: Option<u64>,
    ) -> Result<Option<PathBuf>> {
        let Some(last_id) = last_update_id else {
            return Ok(None);
        };
        if self.last_saved_id.is_some_and(|saved| saved >= last_id) {
            return Ok(None);
        }

        let stamp = chrono::Local::now().format("%Y-%m-%d-%H:%M:%S");
        let path = self
            .dir
            .join(format!("archive-{stamp}-{:04}.json", self.tick));
        let raw = serde_json::to_string_pretty(data).context("failed to serialize corpus")?;
        fs::write(&path, raw)
            .with_context(|| format!("failed to write archive {}", path.display()))?;
        info!(path = %path.display(), last_id, "archived corpus");

        self.generations[0].push(ArchiveEntry {
            last_id,
            path: path.clone(),
            tick: self.tick,
        });
        self.tick += 1;
        self.last_saved_id = Some(last_id);
        self.rebalance();
        Ok(Some(path))
    }

    fn rebalance(&mut self) {
        for generation in 0..GENERATION_COUNT {
            if self.generations[generation].len() <= MAX_GENERATION_LEN {
                continue;
            }
            let promoted = Self::clean_generation(
                &mut self.generations[generation],
                GENERATION_DELTAS[generation],
            );
            if let Some(entry) = promoted {
                if generation + 1 < GENERATION_COUNT {
                    self.generations[generation + 1].push(entry);
                }
                // Past the last generation the record is simply
                // forgotten; the file stays on disk.
            }
        }
    }

    /// Deletes the first entry spaced closer than `delta` to its
    /// predecessor; when the spacing is everywhere sufficient, pops the
    /// oldest entry for promotion instead.
    fn clean_generation(generation: &mut Vec<ArchiveEntry>, delta: u64) -> Option<ArchiveEntry> {
        for i in 0..generation.len().saturating_sub(1) {
            if generation[i + 1].tick - generation[i].tick < delta {
                let evicted = generation.remove(i + 1);
                if let Err(err) = fs::remove_file(&evicted.path) {
                    warn!(path = %evicted.path.display(), %err, "failed to delete stale archive");
                }
                return None;
            }
        }
        Some(generation.remove(0))
    }

    #[cfg(test)]
    fn generation_lens(&self) -> Vec<usize> {
        self.generations.iter().map(Vec::len).collect()
    }
}

/// Lists archive files currently present under `dir`, for tests and
/// startup diagnostics.
pub fn archive_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
#[path = "tests/archive_tests.rs"]
mod tests;
