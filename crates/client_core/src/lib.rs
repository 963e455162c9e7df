//! Review client core: the sample store, the sync engine that keeps it
//! converged with the review service through an incremental update
//! protocol, and the navigation/recording surface the UI drives.
//!
//! Everything runs on the tokio event loop; the session mutex
//! serializes UI callbacks, poll completions, and submit
//! acknowledgments, so the store has a single logical writer. At most
//! one poll is in flight at a time; submits are not throttled, and each
//! edit's navigation waits only on its own acknowledgment.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use rand::Rng;
use shared::{
    domain::{Sample, SampleIndex, Verdict, VerdictCounts},
    protocol::{SnapshotPayload, UpdateCursor},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod backoff;
pub mod nav;
pub mod prefetch;
pub mod store;
pub mod transport;

pub use backoff::{PollBackoff, POLL_CEILING, POLL_FLOOR, POLL_MULTIPLIER};
pub use nav::{Navigator, NO_TARGET};
pub use prefetch::ImagePrefetcher;
pub use store::SampleStore;
pub use transport::{HttpTransport, UpdateTransport};

/// State changes observed by UI renderers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Entire store contents replaced by a snapshot.
    SnapshotReplaced,
    /// One sample mutated in place (local edit or server patch).
    SampleChanged { position: usize },
    CountsChanged(VerdictCounts),
    /// Displayed position moved; `index` is the stable identity to
    /// reflect in the URL fragment.
    PositionChanged {
        position: usize,
        index: SampleIndex,
    },
    Error(String),
}

struct SessionState {
    store: SampleStore,
    navigator: Navigator,
    cursor: UpdateCursor,
    backoff: PollBackoff,
    /// Suppresses re-entrant polls: set when a poll is scheduled or in
    /// flight, cleared only once its response has been handled.
    poll_scheduled: bool,
    visible: bool,
    loaded: bool,
    start_fragment: Option<String>,
}

impl SessionState {
    /// Clamped move plus everything the caller needs to narrate it:
    /// the fragment identity and the image read-ahead plan.
    fn locked_move(&mut self, target: usize) -> (usize, Option<SampleIndex>, Vec<String>) {
        let position = self.navigator.move_to(&self.store, target);
        let index = self.store.get(position).map(|sample| sample.index);
        let plan = nav::prefetch_plan(&self.store, position);
        (position, index, plan)
    }
}

pub struct ReviewSession {
    transport: Arc<dyn UpdateTransport>,
    prefetcher: Arc<ImagePrefetcher>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ReviewSession {
    pub fn new(transport: Arc<dyn UpdateTransport>, auto_advance: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let prefetcher = Arc::new(ImagePrefetcher::new(Arc::clone(&transport)));
        Arc::new(Self {
            transport,
            prefetcher,
            inner: Mutex::new(SessionState {
                store: SampleStore::new(),
                navigator: Navigator::new(auto_advance),
                cursor: UpdateCursor(0),
                backoff: PollBackoff::standard(),
                poll_scheduled: false,
                visible: true,
                loaded: false,
                start_fragment: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Fragment to resolve the initial position from, in place of the
    /// random fallback. Must be set before [`load`](Self::load).
    pub async fn set_start_fragment(&self, fragment: impl Into<String>) {
        self.inner.lock().await.start_fragment = Some(fragment.into());
    }

    /// Full fetch: replaces the store, sets the cursor, picks the
    /// initial position, and starts the poll loop at the floor delay.
    /// A transport failure here is surfaced to the caller and not
    /// retried.
    pub async fn load(self: &Arc<Self>) -> Result<()> {
        let snapshot = self
            .transport
            .fetch_snapshot()
            .await
            .context("initial corpus fetch failed")?;
        let total = snapshot.data.len();
        self.adopt_snapshot(snapshot).await;
        info!(total, "corpus loaded");
        self.schedule_poll(POLL_FLOOR).await;
        Ok(())
    }

    async fn adopt_snapshot(&self, payload: SnapshotPayload) {
        let (position, index, plan, counts) = {
            let mut guard = self.inner.lock().await;
            let first_load = !guard.loaded;
            guard.store.replace_all(payload.data);
            guard.cursor = payload.next_id;
            guard.loaded = true;

            let fragment = guard.start_fragment.take();
            let resolved =
                fragment.and_then(|fragment| nav::resolve_fragment(&guard.store, &fragment));
            let target = match resolved {
                Some(position) => position,
                // Unresolvable fragments fall back silently: a random
                // position on first load, the current one afterwards.
                None if first_load && !guard.store.is_empty() => {
                    rand::rng().random_range(0..guard.store.len())
                }
                None => guard.navigator.position(),
            };
            let (position, index, plan) = guard.locked_move(target);
            (position, index, plan, guard.store.counts())
        };
        let _ = self.events.send(SessionEvent::SnapshotReplaced);
        let _ = self.events.send(SessionEvent::CountsChanged(counts));
        if let Some(index) = index {
            let _ = self
                .events
                .send(SessionEvent::PositionChanged { position, index });
        }
        self.spawn_prefetch(plan);
    }

    /// Schedules the next poll after `delay`. Suppressed (not queued)
    /// while another poll is scheduled or in flight, and while the
    /// session is hidden; [`set_visible`](Self::set_visible) restarts
    /// the loop.
    pub async fn schedule_poll(self: &Arc<Self>, delay: Duration) {
        {
            let mut guard = self.inner.lock().await;
            if !guard.visible || guard.poll_scheduled {
                return;
            }
            guard.poll_scheduled = true;
        }
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.poll_once().await;
        });
    }

    /// One poll round-trip: snapshot and patch responses reset the
    /// delay to its floor, heartbeats stretch it toward the ceiling,
    /// and a transport failure leaves the delay as-is (the next
    /// scheduled poll is the de facto retry).
    pub fn poll_once<'a>(
        self: &'a Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        // Boxed rather than `async fn`: the poll loop is recursive
        // (poll_once -> schedule_poll -> poll_once), so one link must
        // be type-erased for the future to be nameable and `Send`.
        Box::pin(async move {
        let cursor = { self.inner.lock().await.cursor };
        let payload = match self.transport.fetch_updates(cursor).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(cursor = cursor.0, %err, "update poll failed");
                let delay = {
                    let mut guard = self.inner.lock().await;
                    guard.poll_scheduled = false;
                    guard.backoff.current()
                };
                self.schedule_poll(delay).await;
                return;
            }
        };

        let next_delay = if let Some(data) = payload.data {
            self.adopt_snapshot(SnapshotPayload {
                data,
                next_id: payload.next_id,
            })
            .await;
            let mut guard = self.inner.lock().await;
            guard.poll_scheduled = false;
            guard.backoff.reset()
        } else if let Some(patches) = payload.updates {
            let (changed, counts) = {
                let mut guard = self.inner.lock().await;
                let mut changed = Vec::with_capacity(patches.len());
                for patch in &patches {
                    guard.store.apply_patch(patch);
                    changed.push(patch.index);
                }
                guard.cursor = payload.next_id;
                (changed, guard.store.counts())
            };
            for position in changed {
                let _ = self.events.send(SessionEvent::SampleChanged { position });
            }
            let _ = self.events.send(SessionEvent::CountsChanged(counts));
            let mut guard = self.inner.lock().await;
            guard.poll_scheduled = false;
            guard.backoff.reset()
        } else {
            let mut guard = self.inner.lock().await;
            guard.cursor = payload.next_id;
            guard.poll_scheduled = false;
            guard.backoff.bump()
        };

        self.schedule_poll(next_delay).await;
        })
    }

    /// Visibility gate for the poll loop: hiding halts it after the
    /// in-flight response (whose late application is safe — patches are
    /// idempotent positional replacements); showing resumes at the
    /// floor delay.
    pub async fn set_visible(self: &Arc<Self>, visible: bool) {
        let resume_delay = {
            let mut guard = self.inner.lock().await;
            let was_visible = guard.visible;
            guard.visible = visible;
            if visible && !was_visible && guard.loaded {
                Some(guard.backoff.reset())
            } else {
                None
            }
        };
        if let Some(delay) = resume_delay {
            self.schedule_poll(delay).await;
        }
    }

    /// Records a verdict for the current sample: mutate locally, notify
    /// renderers, submit, and only once this submit acknowledges,
    /// advance to the next target. A fast sequence of edits may have
    /// several submits in flight; each advances independently.
    pub async fn record(&self, verdict: Verdict) {
        if self.record_inner(Some(verdict)).await {
            self.advance_after_ack().await;
        }
    }

    /// Clears the current sample's verdict and submits; never navigates.
    pub async fn reset_verdict(&self) {
        self.record_inner(None).await;
    }

    /// Returns whether the submit was acknowledged.
    async fn record_inner(&self, verdict: Option<Verdict>) -> bool {
        let (position, sample, counts) = {
            let mut guard = self.inner.lock().await;
            let position = guard.navigator.position();
            let Some(sample) = guard.store.set_verdict(position, verdict) else {
                warn!(position, "no sample at current position; nothing to record");
                return false;
            };
            (position, sample, guard.store.counts())
        };
        let _ = self.events.send(SessionEvent::SampleChanged { position });
        let _ = self.events.send(SessionEvent::CountsChanged(counts));

        // The local edit stays authoritative on failure: no rollback,
        // no retry, log only.
        if let Err(err) = self.transport.submit_update(&sample).await {
            warn!(
                position,
                index = sample.index.0,
                %err,
                "verdict submit failed; local edit kept"
            );
            let _ = self
                .events
                .send(SessionEvent::Error(format!("submit failed: {err}")));
            return false;
        }
        true
    }

    async fn advance_after_ack(&self) {
        let moved = {
            let mut guard = self.inner.lock().await;
            let from = guard.navigator.position();
            let target = guard.navigator.next_target(&guard.store, from);
            if target < 0 {
                // Exhausted: every remaining sample is rated; stay put.
                None
            } else {
                Some(guard.locked_move(target as usize))
            }
        };
        if let Some((position, index, plan)) = moved {
            if let Some(index) = index {
                let _ = self
                    .events
                    .send(SessionEvent::PositionChanged { position, index });
            }
            self.spawn_prefetch(plan);
        }
    }

    pub async fn move_to(&self, target: usize) {
        let (position, index, plan) = {
            let mut guard = self.inner.lock().await;
            guard.locked_move(target)
        };
        if let Some(index) = index {
            let _ = self
                .events
                .send(SessionEvent::PositionChanged { position, index });
        }
        self.spawn_prefetch(plan);
    }

    pub async fn next(&self) {
        let target = { self.inner.lock().await.navigator.position().saturating_add(1) };
        self.move_to(target).await;
    }

    pub async fn previous(&self) {
        let target = { self.inner.lock().await.navigator.position().saturating_sub(1) };
        self.move_to(target).await;
    }

    /// Reacts to the fragment changing out from under the session.
    /// A fragment no sample matches (possible after a snapshot replace)
    /// is ignored rather than surfaced.
    pub async fn handle_fragment_change(&self, fragment: &str) {
        let target = {
            let guard = self.inner.lock().await;
            nav::resolve_fragment(&guard.store, fragment)
                .filter(|&position| position != guard.navigator.position())
        };
        if let Some(target) = target {
            self.move_to(target).await;
        }
    }

    fn spawn_prefetch(&self, plan: Vec<String>) {
        if plan.is_empty() {
            return;
        }
        let prefetcher = Arc::clone(&self.prefetcher);
        tokio::spawn(async move {
            prefetcher.warm(&plan).await;
        });
    }

    /// Image bytes for display, served from the read-ahead cache when
    /// warm.
    pub async fn image(&self, basename: &str) -> Result<Vec<u8>> {
        self.prefetcher.get(basename).await
    }

    pub async fn current(&self) -> Option<(usize, Sample)> {
        let guard = self.inner.lock().await;
        let position = guard.navigator.position();
        guard.store.get(position).map(|sample| (position, sample.clone()))
    }

    pub async fn position(&self) -> usize {
        self.inner.lock().await.navigator.position()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.store.is_empty()
    }

    pub async fn counts(&self) -> VerdictCounts {
        self.inner.lock().await.store.counts()
    }

    pub async fn sample_at(&self, position: usize) -> Option<Sample> {
        self.inner.lock().await.store.get(position).cloned()
    }

    pub async fn auto_advance(&self) -> bool {
        self.inner.lock().await.navigator.auto_advance()
    }

    pub async fn set_auto_advance(&self, auto_advance: bool) {
        self.inner
            .lock()
            .await
            .navigator
            .set_auto_advance(auto_advance);
    }

    pub async fn cursor(&self) -> UpdateCursor {
        self.inner.lock().await.cursor
    }

    pub async fn poll_delay(&self) -> Duration {
        self.inner.lock().await.backoff.current()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
