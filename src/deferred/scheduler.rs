//! Deferred computation scheduler
//!
//! Decouples urgent live input from expensive derived output. Generic over
//! the channel key `K`, the live value `T` and the derived value `U`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::core::{Derivation, Epoch, Stamped};
use crate::epoch::EpochTracker;

use super::coalescer::Coalescer;
use super::pair::DeferredPair;

/// A derivation that has been dispatched and not yet published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingComputation {
    /// Epoch of the live value it was dispatched with
    pub epoch: Epoch,
    /// When the settle request it answers was first made
    pub requested_at: Instant,
    /// When it was dispatched
    pub dispatched_at: Instant,
}

/// A derivation ready to run
///
/// Produced by [`DeferredScheduler::poll_at`]. Run it on any thread and hand
/// the [`Completion`] back to [`DeferredScheduler::publish`].
pub struct ReadyComputation<K, T, U> {
    channel: K,
    input: Stamped<T>,
    derivation: Arc<dyn Derivation<T, U>>,
}

impl<K, T, U> ReadyComputation<K, T, U> {
    /// Channel the computation belongs to
    pub fn channel(&self) -> &K {
        &self.channel
    }

    /// Epoch of the input it will compute from
    pub fn epoch(&self) -> Epoch {
        self.input.epoch
    }

    /// Live value it will compute from
    pub fn input(&self) -> &T {
        &self.input.value
    }

    /// Run the derivation
    pub fn run(self) -> Completion<K, U> {
        let value = self.derivation.compute(&self.input.value);
        Completion {
            channel: self.channel,
            result: Stamped::new(self.input.epoch, value),
        }
    }
}

impl<K: fmt::Debug, T, U> fmt::Debug for ReadyComputation<K, T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyComputation")
            .field("channel", &self.channel)
            .field("epoch", &self.input.epoch)
            .finish_non_exhaustive()
    }
}

/// Result of a derivation, stamped with the epoch of its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<K, U> {
    /// Channel the result belongs to
    pub channel: K,
    /// Derived value and the epoch it was computed for
    pub result: Stamped<U>,
}

/// Result of publishing a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The result is now the channel's settled value
    Published {
        /// Epoch the result was computed for
        epoch: Epoch,
    },
    /// A newer live value exists; the result was discarded
    Stale {
        /// Epoch the result was computed for
        received: Epoch,
        /// Channel's current epoch
        current: Epoch,
    },
}

impl PublishOutcome {
    /// Whether the result became the settled value
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Counters describing scheduler activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Live updates accepted
    pub live_updates: u64,
    /// Live updates that superseded a request before it was dispatched
    pub coalesced: u64,
    /// Derivations dispatched
    pub dispatched: u64,
    /// Results published as settled values
    pub published: u64,
    /// Results discarded as stale
    pub discarded: u64,
}

/// A settle request waiting for its channel to go quiet
struct SettleRequest<T, U> {
    derivation: Arc<dyn Derivation<T, U>>,
    window: Duration,
    requested_at: Instant,
}

/// Per-channel scheduler state
struct DeferredChannel<T, U> {
    pair: Option<DeferredPair<T, U>>,
    coalescer: Coalescer,
    request: Option<SettleRequest<T, U>>,
    in_flight: Option<PendingComputation>,
}

impl<T, U> Default for DeferredChannel<T, U> {
    fn default() -> Self {
        Self {
            pair: None,
            coalescer: Coalescer::new(),
            request: None,
            in_flight: None,
        }
    }
}

impl<T, U> DeferredChannel<T, U> {
    fn time_until_due_at(&self, now: Instant) -> Option<Duration> {
        let request = self.request.as_ref()?;
        self.pair.as_ref()?;
        Some(self.coalescer.time_until_quiescent_at(now, request.window))
    }
}

/// Deferred computation scheduler
///
/// The scheduler manages:
/// - Epoch tracking per channel (one epoch per live update)
/// - A live/settled pair per channel
/// - Debounced settle requests and dispatched computations
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use speculative_view::deferred::DeferredScheduler;
///
/// let mut scheduler = DeferredScheduler::new();
/// let window = Duration::from_millis(100);
/// let start = Instant::now();
///
/// for (i, query) in ["r", "ru", "rus"].into_iter().enumerate() {
///     let now = start + Duration::from_millis(10 * i as u64);
///     scheduler.set_live_at("search", query.to_string(), now);
///     scheduler.settle_at("search", |q: &String| q.len(), window, now);
/// }
/// assert!(scheduler.is_catching_up(&"search"));
///
/// // One trailing computation for the whole burst.
/// let published = scheduler.run_due_at(start + Duration::from_millis(200));
/// assert_eq!(published, 1);
/// assert_eq!(scheduler.settled(&"search"), Some(&3));
/// assert!(!scheduler.is_catching_up(&"search"));
/// ```
pub struct DeferredScheduler<K, T, U> {
    /// Epochs per channel
    epochs: EpochTracker<K>,

    /// State per channel
    channels: HashMap<K, DeferredChannel<T, U>>,

    /// Activity counters
    stats: SchedulerStats,
}

impl<K, T, U> Default for DeferredScheduler<K, T, U> {
    fn default() -> Self {
        Self {
            epochs: EpochTracker::default(),
            channels: HashMap::new(),
            stats: SchedulerStats::default(),
        }
    }
}

impl<K, T, U> DeferredScheduler<K, T, U>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone + 'static,
    U: 'static,
{
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch tracker for inspection
    pub fn epochs(&self) -> &EpochTracker<K> {
        &self.epochs
    }

    /// Activity counters
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Current epoch of a channel
    pub fn current_epoch(&self, channel: &K) -> Epoch {
        self.epochs.current_epoch(channel)
    }

    /// Update the live value
    ///
    /// Always visible immediately. Allocates a fresh epoch, which makes every
    /// computation dispatched for an older value stale.
    pub fn set_live(&mut self, channel: K, value: T) -> Epoch {
        self.set_live_at(channel, value, Instant::now())
    }

    /// Update the live value at a given time
    pub fn set_live_at(&mut self, channel: K, value: T, now: Instant) -> Epoch {
        let epoch = self.epochs.begin_epoch(&channel);
        let state = self.channels.entry(channel).or_default();
        let live = Stamped::new(epoch, value);

        match state.pair.as_mut() {
            Some(pair) => {
                pair.set_live(live);
            }
            None => state.pair = Some(DeferredPair::new(live)),
        }

        if state.request.is_some() && state.coalescer.burst_len() > 0 {
            self.stats.coalesced += 1;
        }
        state.coalescer.touch_at(now);
        self.stats.live_updates += 1;
        epoch
    }

    /// Request a derivation of the live value once the channel is quiet
    ///
    /// The derivation runs once no live update has arrived for `window`
    /// (a zero window dispatches on the next poll). A later request replaces
    /// an earlier one that has not been dispatched yet.
    pub fn settle<F>(&mut self, channel: K, compute: F, window: Duration)
    where
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.settle_shared_at(channel, Arc::new(compute), window, Instant::now());
    }

    /// [`settle`](Self::settle) with an explicit request time
    ///
    /// The request time is reported as [`PendingComputation::requested_at`]
    /// once the computation is dispatched. A request that replaces an
    /// undispatched one keeps the earlier request time. Quiescence is still
    /// measured from the last live update.
    pub fn settle_at<F>(&mut self, channel: K, compute: F, window: Duration, now: Instant)
    where
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.settle_shared_at(channel, Arc::new(compute), window, now);
    }

    /// Request an already shared derivation
    pub fn settle_shared(
        &mut self,
        channel: K,
        derivation: Arc<dyn Derivation<T, U>>,
        window: Duration,
    ) {
        self.settle_shared_at(channel, derivation, window, Instant::now());
    }

    /// [`settle_shared`](Self::settle_shared) with an explicit request time
    pub fn settle_shared_at(
        &mut self,
        channel: K,
        derivation: Arc<dyn Derivation<T, U>>,
        window: Duration,
        now: Instant,
    ) {
        trace!(?channel, ?window, "settle requested");
        let state = self.channels.entry(channel).or_default();
        let requested_at = state
            .request
            .as_ref()
            .map_or(now, |pending| pending.requested_at.min(now));
        state.request = Some(SettleRequest {
            derivation,
            window,
            requested_at,
        });
    }

    /// Dispatch every request whose channel is quiet
    pub fn poll(&mut self) -> Vec<ReadyComputation<K, T, U>> {
        self.poll_at(Instant::now())
    }

    /// Dispatch every request whose channel is quiet at a given time
    ///
    /// Each dispatched computation reads the latest live value and is
    /// stamped with its epoch.
    pub fn poll_at(&mut self, now: Instant) -> Vec<ReadyComputation<K, T, U>> {
        let mut ready = Vec::new();

        for (channel, state) in &mut self.channels {
            let due = state
                .time_until_due_at(now)
                .is_some_and(|wait| wait.is_zero());
            if !due {
                continue;
            }
            let (Some(request), Some(pair)) = (state.request.take(), state.pair.as_ref()) else {
                continue;
            };

            let input = pair.live().clone();
            trace!(
                ?channel,
                epoch = %input.epoch,
                burst = state.coalescer.burst_len(),
                waited = ?now.saturating_duration_since(request.requested_at),
                "computation dispatched"
            );
            state.in_flight = Some(PendingComputation {
                epoch: input.epoch,
                requested_at: request.requested_at,
                dispatched_at: now,
            });
            state.coalescer.reset_burst();
            self.stats.dispatched += 1;

            ready.push(ReadyComputation {
                channel: channel.clone(),
                input,
                derivation: request.derivation,
            });
        }

        ready
    }

    /// Publish a finished computation
    ///
    /// Results for a superseded epoch are discarded and never rescheduled;
    /// the newer live value has its own request.
    pub fn publish(&mut self, completion: Completion<K, U>) -> PublishOutcome {
        let Completion { channel, result } = completion;
        let received = result.epoch;
        let current = self.epochs.current_epoch(&channel);

        let published = match self.channels.get_mut(&channel) {
            Some(state) => {
                // Whether published or discarded, this computation is done.
                if state.in_flight.is_some_and(|p| p.epoch <= received) {
                    state.in_flight = None;
                }
                received == current
                    && state
                        .pair
                        .as_mut()
                        .is_some_and(|pair| pair.publish(result))
            }
            None => false,
        };
        if !published {
            return self.discard(&channel, received, current);
        }

        self.stats.published += 1;
        debug!(?channel, epoch = %received, "settled value published");
        PublishOutcome::Published { epoch: received }
    }

    fn discard(&mut self, channel: &K, received: Epoch, current: Epoch) -> PublishOutcome {
        self.stats.discarded += 1;
        debug!(?channel, %received, %current, "stale computation discarded");
        PublishOutcome::Stale { received, current }
    }

    /// Dispatch, run and publish every due computation inline
    ///
    /// Returns the number of results published.
    pub fn run_due(&mut self) -> usize {
        self.run_due_at(Instant::now())
    }

    /// [`run_due`](Self::run_due) at a given time
    pub fn run_due_at(&mut self, now: Instant) -> usize {
        self.poll_at(now)
            .into_iter()
            .map(|ready| self.publish(ready.run()))
            .filter(PublishOutcome::is_published)
            .count()
    }

    /// Time until the next request becomes due
    ///
    /// `None` if no request is waiting.
    pub fn time_until_due_at(&self, now: Instant) -> Option<Duration> {
        self.channels
            .values()
            .filter_map(|state| state.time_until_due_at(now))
            .min()
    }

    /// Whether the settled value lags the live value
    pub fn is_catching_up(&self, channel: &K) -> bool {
        self.pair(channel).is_some_and(DeferredPair::is_catching_up)
    }

    /// Live/settled pair of a channel
    pub fn pair(&self, channel: &K) -> Option<&DeferredPair<T, U>> {
        self.channels.get(channel).and_then(|state| state.pair.as_ref())
    }

    /// Live value of a channel
    pub fn live(&self, channel: &K) -> Option<&T> {
        self.pair(channel).map(|pair| &pair.live().value)
    }

    /// Settled value of a channel
    pub fn settled(&self, channel: &K) -> Option<&U> {
        self.pair(channel)
            .and_then(DeferredPair::settled)
            .map(|settled| &settled.value)
    }

    /// Most recently dispatched computation that has not been published
    pub fn in_flight(&self, channel: &K) -> Option<PendingComputation> {
        self.channels.get(channel).and_then(|state| state.in_flight)
    }

    /// Whether a settle request is waiting for the channel to go quiet
    pub fn is_scheduled(&self, channel: &K) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|state| state.request.is_some())
    }
}

impl<K: fmt::Debug, T, U> fmt::Debug for DeferredScheduler<K, T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredScheduler")
            .field("epochs", &self.epochs)
            .field("channels", &self.channels.len())
            .field("stats", &self.stats)
            .finish()
    }
}
