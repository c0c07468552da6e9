#![forbid(unsafe_code)]

//! Per-entity debounced update scheduling.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, Shared};
use natural_core::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use super::config::DebounceConfig;
use super::target::{DebounceError, UpdateTarget};

/// Result of one debounced update, as seen by every caller of that cycle.
pub type UpdateResult<T> =
    Result<<T as UpdateTarget>::Output, DebounceError<<T as UpdateTarget>::Error>>;

/// Single-execution, multi-subscriber handle on one debounced update.
///
/// Cloning and awaiting it never re-issues the update; every clone resolves
/// to the same [`UpdateResult`].
pub type SharedUpdate<T> = Shared<BoxFuture<'static, UpdateResult<T>>>;

/// Identifies one debounced record: which service, which entity.
///
/// The service is identified by the address of its `Arc` allocation. An entry
/// keeps its target alive, so an address cannot be reused while an entry
/// for it exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EntityKey {
    target: usize,
    id: String,
}

impl EntityKey {
    fn new<T: ?Sized>(target: &T, id: &str) -> Self {
        Self {
            target: ptr::from_ref(target).cast::<()>().addr(),
            id: id.to_owned(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}/{}", self.target, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    /// More fields arrived; restart the quiet period.
    Reset,
    /// Skip the rest of the quiet period.
    Flush,
    /// Drop the entry without issuing the update.
    Cancel,
}

struct Pending<T: ?Sized + UpdateTarget> {
    generation: u64,
    fields: Map,
    signals: mpsc::UnboundedSender<Signal>,
    result: SharedUpdate<T>,
}

struct InFlight<T: ?Sized + UpdateTarget> {
    key: EntityKey,
    result: SharedUpdate<T>,
}

struct State<T: ?Sized + UpdateTarget> {
    pending: HashMap<EntityKey, Pending<T>>,
    in_flight: HashMap<u64, InFlight<T>>,
    next_generation: u64,
}

/// Coalesces rapid partial updates of the same record into one update call.
///
/// # Lifecycle of an entity
///
/// ```text
/// absent ──debounce──▶ pending ──quiet period / flush──▶ in flight ──settled──▶ absent
///                         │ ▲
///                 debounce│ │(fields merged, timer restarted)
///                         └─┘
///                         └──────────cancel_one──────────▶ absent (never sent)
/// ```
///
/// Each pending entity is driven by one spawned Tokio task that owns its
/// quiet-period timer. The entry map itself is only touched by the methods of
/// this type, under a mutex that is never held across an `.await`.
///
/// # Invariants
///
/// 1. At most one pending entry exists per (target, id). Further `debounce`
///    calls merge their fields into it, last write wins per field, and get
///    the same [`SharedUpdate`] back.
/// 2. The update collaborator is called at most once per entry, with every
///    field merged before the entry left the pending state.
/// 3. Whichever of cancellation and the timer removes the pending entry first
///    wins. A cancelled entry never reaches the collaborator.
/// 4. Once an entry leaves the pending state, the next `debounce` for the
///    same key starts a fresh cycle.
/// 5. There is no maximum wait: an entity debounced continuously is only
///    sent by [`flush`](Self::flush) or [`flush_one`](Self::flush_one).
///
/// # Failure Modes
///
/// | Failure | Cause | Behavior |
/// |---------|-------|----------|
/// | Collaborator error | `update_now` returned `Err` | [`DebounceError::Update`] to every `debounce` caller; `flush*` still complete |
/// | Collaborator panic | `update_now` panicked | [`DebounceError::Panicked`] to every `debounce` caller; the entry is cleared |
/// | Cancelled | `cancel_one` before the update was issued | [`DebounceError::Cancelled`] to every `debounce` caller |
/// | Driver task gone | Runtime shut down mid-cycle | Callers see [`DebounceError::Cancelled`] |
pub struct DebounceCoalescer<T: ?Sized + UpdateTarget> {
    config: DebounceConfig,
    state: Arc<Mutex<State<T>>>,
}

impl<T: ?Sized + UpdateTarget> DebounceCoalescer<T> {
    #[must_use]
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(State {
                pending: HashMap::new(),
                in_flight: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    /// Schedule `fields` to be sent for entity `id` of `target`.
    ///
    /// If the entity is already pending, `fields` are merged into it
    /// (shallow, last write wins per field) and its quiet period restarts.
    /// Otherwise a new cycle starts. Either way the returned future resolves
    /// when the cycle's single update call settles.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn debounce(&self, target: &Arc<T>, id: &str, fields: Map) -> SharedUpdate<T> {
        let key = EntityKey::new(&**target, id);
        let mut state = lock(&self.state);

        if let Some(entry) = state.pending.get_mut(&key) {
            entry.fields.extend(fields);
            // The driver only stops listening once it removed the entry, and
            // the entry is still here, so the send cannot fail.
            let _ = entry.signals.send(Signal::Reset);
            tracing::debug!(%key, generation = entry.generation, "debounce coalesced");
            return entry.result.clone();
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let result: SharedUpdate<T> = result_rx
            .map(|settled| settled.unwrap_or(Err(DebounceError::Cancelled)))
            .boxed()
            .shared();

        state.pending.insert(
            key.clone(),
            Pending {
                generation,
                fields,
                signals,
                result: result.clone(),
            },
        );
        drop(state);

        tracing::debug!(%key, generation, "debounce scheduled");
        tokio::spawn(drive(
            Arc::clone(&self.state),
            Arc::clone(target),
            key,
            generation,
            self.config.quiet_period,
            signal_rx,
            result_tx,
        ));
        result
    }

    /// Send the pending update of one entity now.
    ///
    /// The returned future completes once that update settles, successfully
    /// or not; errors are not reported here. If the entity is not pending but
    /// an update for it is in flight, waits for that one. Otherwise completes
    /// immediately.
    pub fn flush_one(&self, target: &T, id: &str) -> BoxFuture<'static, ()> {
        let key = EntityKey::new(target, id);
        let state = lock(&self.state);
        let waiting = match state.pending.get(&key) {
            Some(entry) => {
                let _ = entry.signals.send(Signal::Flush);
                tracing::debug!(%key, generation = entry.generation, "debounce flushed");
                Some(entry.result.clone())
            }
            None => state
                .in_flight
                .iter()
                .filter(|(_, flight)| flight.key == key)
                .max_by_key(|(generation, _)| **generation)
                .map(|(_, flight)| flight.result.clone()),
        };
        drop(state);

        async move {
            if let Some(result) = waiting {
                let _ = result.await;
            }
        }
        .boxed()
    }

    /// Send every pending update now.
    ///
    /// The returned future completes once all of them, and every update
    /// already in flight, have settled. Errors are not reported here.
    pub fn flush(&self) -> BoxFuture<'static, ()> {
        let state = lock(&self.state);
        let mut waiting = Vec::with_capacity(state.pending.len() + state.in_flight.len());
        for entry in state.pending.values() {
            let _ = entry.signals.send(Signal::Flush);
            waiting.push(entry.result.clone());
        }
        waiting.extend(state.in_flight.values().map(|flight| flight.result.clone()));
        drop(state);

        tracing::debug!(count = waiting.len(), "debounce flush all");
        future::join_all(waiting).map(|_| ()).boxed()
    }

    /// Discard the pending update of one entity without sending it.
    ///
    /// No-op if the entity is not pending. An update already in flight is
    /// not affected.
    pub fn cancel_one(&self, target: &T, id: &str) {
        let key = EntityKey::new(target, id);
        let removed = lock(&self.state).pending.remove(&key);
        if let Some(entry) = removed {
            let _ = entry.signals.send(Signal::Cancel);
            tracing::debug!(%key, generation = entry.generation, "debounce cancelled");
        }
    }

    /// Number of pending entities across all targets.
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Number of updates issued and not settled yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight.len()
    }

    /// Whether entity `id` of `target` has a pending update.
    #[must_use]
    pub fn is_pending(&self, target: &T, id: &str) -> bool {
        lock(&self.state)
            .pending
            .contains_key(&EntityKey::new(target, id))
    }
}

impl<T: ?Sized + UpdateTarget> Default for DebounceCoalescer<T> {
    fn default() -> Self {
        Self::new(DebounceConfig::default())
    }
}

impl<T: ?Sized + UpdateTarget> fmt::Debug for DebounceCoalescer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("DebounceCoalescer")
            .field("quiet_period", &self.config.quiet_period)
            .field("pending", &state.pending.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

fn lock<T: ?Sized + UpdateTarget>(state: &Mutex<State<T>>) -> MutexGuard<'_, State<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drive one entry from pending to settled.
async fn drive<T: ?Sized + UpdateTarget>(
    state: Arc<Mutex<State<T>>>,
    target: Arc<T>,
    key: EntityKey,
    generation: u64,
    quiet_period: Duration,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    result_tx: oneshot::Sender<UpdateResult<T>>,
) {
    let timer = time::sleep(quiet_period);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            () = &mut timer => break,
            signal = signals.recv() => match signal {
                Some(Signal::Reset) => timer.as_mut().reset(Instant::now() + quiet_period),
                Some(Signal::Flush) => break,
                Some(Signal::Cancel) | None => {
                    let _ = result_tx.send(Err(DebounceError::Cancelled));
                    return;
                }
            },
        }
    }

    // Leaving the pending state. If the entry is gone, or was replaced by a
    // later cycle, it was cancelled before we got here.
    let fields = {
        let mut state = lock(&state);
        let current = state
            .pending
            .get(&key)
            .is_some_and(|entry| entry.generation == generation);
        let entry = match state.pending.remove(&key) {
            Some(entry) if current => entry,
            other => {
                if let Some(newer) = other {
                    state.pending.insert(key, newer);
                }
                drop(state);
                let _ = result_tx.send(Err(DebounceError::Cancelled));
                return;
            }
        };
        state.in_flight.insert(
            generation,
            InFlight {
                key: key.clone(),
                result: entry.result,
            },
        );
        entry.fields
    };

    // Clears the in-flight entry however the update ends, including when
    // this task is dropped mid-call.
    let flight = FlightGuard {
        state: Arc::clone(&state),
        generation,
    };

    let mut fields = fields;
    fields.insert("id".to_owned(), Value::String(key.id.clone()));
    tracing::debug!(%key, generation, "debounced update sent");

    let settled = match AssertUnwindSafe(target.update_now(fields)).catch_unwind().await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => {
            tracing::warn!(%key, generation, "debounced update failed");
            Err(DebounceError::Update(Arc::new(err)))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(%key, generation, %message, "debounced update panicked");
            Err(DebounceError::Panicked(message))
        }
    };

    drop(flight);
    let _ = result_tx.send(settled);
}

struct FlightGuard<T: ?Sized + UpdateTarget> {
    state: Arc<Mutex<State<T>>>,
    generation: u64,
}

impl<T: ?Sized + UpdateTarget> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        lock(&self.state).in_flight.remove(&self.generation);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "update call panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use natural_core::object;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Map>>,
    }

    #[async_trait]
    impl UpdateTarget for Recorder {
        type Output = usize;
        type Error = String;

        async fn update_now(&self, fields: Map) -> Result<usize, String> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(fields);
            Ok(calls.len())
        }
    }

    fn map(json: serde_json::Value) -> Map {
        object(json).unwrap()
    }

    #[test]
    fn entity_keys_distinguish_targets_and_ids() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        assert_eq!(EntityKey::new(&*a, "1"), EntityKey::new(&*a, "1"));
        assert_ne!(EntityKey::new(&*a, "1"), EntityKey::new(&*a, "2"));
        assert_ne!(EntityKey::new(&*a, "1"), EntityKey::new(&*b, "1"));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_period_sends_merged_fields_with_id() {
        let coalescer = DebounceCoalescer::default();
        let target = Arc::new(Recorder::default());

        let first = coalescer.debounce(&target, "1", map(json!({"a": 1, "b": 1})));
        let second = coalescer.debounce(&target, "1", map(json!({"b": 2})));
        assert_eq!(coalescer.count(), 1);
        assert!(coalescer.is_pending(&target, "1"));

        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(second.await.unwrap(), 1);
        assert_eq!(
            *target.calls.lock().unwrap(),
            vec![map(json!({"id": "1", "a": 1, "b": 2}))]
        );
        assert_eq!(coalescer.count(), 0);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_entry_is_a_no_op() {
        let coalescer: DebounceCoalescer<Recorder> = DebounceCoalescer::default();
        let target = Recorder::default();
        coalescer.cancel_one(&target, "1");
        coalescer.flush_one(&target, "1").await;
        coalescer.flush().await;
        assert_eq!(coalescer.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_entry_is_never_sent_and_key_can_restart() {
        let coalescer = DebounceCoalescer::default();
        let target = Arc::new(Recorder::default());

        let cancelled = coalescer.debounce(&target, "1", map(json!({"a": 1})));
        coalescer.cancel_one(&target, "1");
        let fresh = coalescer.debounce(&target, "1", map(json!({"b": 2})));

        assert!(cancelled.await.unwrap_err().is_cancelled());
        assert_eq!(fresh.await.unwrap(), 1);
        assert_eq!(
            *target.calls.lock().unwrap(),
            vec![map(json!({"id": "1", "b": 2}))]
        );
    }
}
