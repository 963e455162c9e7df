//! Navigation over the sample store: clamped positional movement,
//! the auto-advance policy, fragment resolution by stable identity,
//! and the read-ahead plan for image prefetch.

use shared::domain::SampleIndex;
use tracing::debug;

use crate::store::SampleStore;

/// Out-of-range sentinel returned by [`Navigator::next_target`] when no
/// candidate remains. Callers treat it as "stay put".
pub const NO_TARGET: i64 = -1;

#[derive(Debug)]
pub struct Navigator {
    position: usize,
    auto_advance: bool,
}

impl Navigator {
    pub fn new(auto_advance: bool) -> Self {
        Self {
            position: 0,
            auto_advance,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn set_auto_advance(&mut self, auto_advance: bool) {
        self.auto_advance = auto_advance;
    }

    /// Clamps `target` to `[0, len - 1]` and moves there. Returns the
    /// position actually taken. An empty store pins the position at 0.
    pub fn move_to(&mut self, store: &SampleStore, target: usize) -> usize {
        self.position = target.min(store.len().saturating_sub(1));
        self.position
    }

    pub fn move_next(&mut self, store: &SampleStore) -> usize {
        self.move_to(store, self.position.saturating_add(1))
    }

    pub fn move_previous(&mut self, store: &SampleStore) -> usize {
        self.move_to(store, self.position.saturating_sub(1))
    }

    /// Where a verdict-driven advance should land, starting from
    /// `from`. Sequential mode: the next position (the caller's
    /// `move_to` clamp handles the end of the corpus). Auto-advance
    /// mode: the first unrated sample after `from`, or [`NO_TARGET`]
    /// when every remaining sample is rated.
    pub fn next_target(&self, store: &SampleStore, from: usize) -> i64 {
        if !self.auto_advance {
            return from as i64 + 1;
        }
        match store.next_unrated(from) {
            Some(position) => position as i64,
            None => NO_TARGET,
        }
    }
}

/// Resolves a URL-fragment value to a position. The fragment carries a
/// sample's stable `index`, not a position, so it survives reloads and
/// snapshot replaces as long as that identity still exists. Any failure
/// resolves to `None`; callers fall back silently.
pub fn resolve_fragment(store: &SampleStore, fragment: &str) -> Option<usize> {
    let index = fragment.trim().trim_start_matches('#').parse::<u64>().ok()?;
    let position = store.position_of_index(SampleIndex(index));
    if position.is_none() {
        debug!(fragment, "fragment matches no sample; falling back");
    }
    position
}

/// Strips any directory prefix from a stored image reference; the
/// service only serves `/images/<basename>`.
pub fn image_basename(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// Image basenames worth warming after landing on `position`: the next
/// positional sample and the next unrated sample, so both sequential
/// and skip-ahead review feel instantaneous.
pub fn prefetch_plan(store: &SampleStore, position: usize) -> Vec<String> {
    let mut plan = Vec::new();
    let mut push_sample = |p: usize| {
        if let Some(sample) = store.get(p) {
            plan.push(image_basename(&sample.screenshot).to_string());
            plan.push(image_basename(&sample.distilled).to_string());
        }
    };
    push_sample(position + 1);
    if let Some(unrated) = store.next_unrated(position) {
        if unrated != position + 1 {
            push_sample(unrated);
        }
    }
    plan
}
