//! In-memory ordered sample sequence. Positions are fixed after the
//! first full load; snapshots replace the whole sequence, patches
//! mutate one slot in place. Single writer (the session), many readers.

use shared::{
    domain::{Sample, SampleIndex, Verdict, VerdictCounts},
    protocol::PatchEntry,
};
use tracing::warn;

#[derive(Debug, Default)]
pub struct SampleStore {
    samples: Vec<Sample>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Sample> {
        self.samples.get(position)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Full snapshot replacement. The incoming order becomes the fixed
    /// position order for the rest of the session.
    pub fn replace_all(&mut self, samples: Vec<Sample>) {
        self.samples = samples;
    }

    /// Positional in-place replacement. Patches are idempotent: applying
    /// the same patch twice leaves the store identical to applying it
    /// once. A patch whose embedded url disagrees with the local slot
    /// means the two views diverged; the server copy wins either way.
    pub fn apply_patch(&mut self, patch: &PatchEntry) {
        let Some(slot) = self.samples.get_mut(patch.index) else {
            warn!(
                position = patch.index,
                len = self.samples.len(),
                "patch position out of range; dropping patch"
            );
            return;
        };
        if slot.url != patch.entry.url {
            warn!(
                position = patch.index,
                local_url = %slot.url,
                patch_url = %patch.entry.url,
                "patch disagrees with local sample; adopting server copy"
            );
        }
        *slot = patch.entry.clone();
    }

    /// Sets or clears the verdict at `position`, returning a clone of
    /// the updated sample for submission.
    pub fn set_verdict(&mut self, position: usize, verdict: Option<Verdict>) -> Option<Sample> {
        let slot = self.samples.get_mut(position)?;
        slot.verdict = verdict;
        Some(slot.clone())
    }

    /// Smallest position strictly after `from` whose verdict is unset.
    pub fn next_unrated(&self, from: usize) -> Option<usize> {
        self.samples
            .iter()
            .enumerate()
            .skip(from + 1)
            .find(|(_, sample)| sample.verdict.is_none())
            .map(|(position, _)| position)
    }

    /// Resolves a sample's stable identity to its current position.
    pub fn position_of_index(&self, index: SampleIndex) -> Option<usize> {
        self.samples
            .iter()
            .position(|sample| sample.index == index)
    }

    pub fn counts(&self) -> VerdictCounts {
        VerdictCounts::tally(&self.samples)
    }
}
