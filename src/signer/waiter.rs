//! Waiting for signing requests to resolve.
//!
//! # Responsibilities
//! - Turn a [`RequestHandle`] into exactly one terminal outcome
//! - Share that outcome with every concurrent waiter on the same request
//! - Close the request's notification channel exactly once, on every path
//! - Enforce the request expiry locally and honor cancellation
//!
//! # Data Flow
//! ```text
//! wait(session, handle)
//!     → settled cache hit? return it
//!     → session pump for handle.id? subscribe to its watch channel
//!     → else retire the session's previous pump (Superseded) and spawn a new one
//!
//! pump task
//!     → await the retired pump of the session (its channel is closed)
//!     → NotificationSource::open → ChannelLease
//!     → select { frame, deadline, shutdown, stop }
//!     → close lease, settle: first outcome under the pumps lock wins
//! ```
//!
//! # Design Decisions
//! - At most one pump (and so one open channel) per session
//! - The deadline starts at the handle's expiry and only ever moves earlier
//! - Frames for other requests, keep-alives and unparseable frames are ignored
//! - Pumps are stopped through a signal, never aborted, so the lease is
//!   closed by the pump itself before the next channel of the session opens
//! - Settling and superseding both decide under the pumps lock; an outcome
//!   already cached is never replaced

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::timeouts::tighten_deadline;
use crate::signer::channel::{ChannelLease, NotificationSource};
use crate::signer::types::{
    ChannelError, RequestHandle, ResolutionError, ResolutionResult, SignerEvent, SignerMessage, SigningResolution,
};

type Outcome = ResolutionResult<SigningResolution>;

/// The running pump of one session.
struct Pump {
    generation: u64,
    request_id: Uuid,
    outcome: watch::Receiver<Option<Outcome>>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
    waiters: usize,
}

impl Pump {
    /// Signal the pump to close its channel. The handle finishes once it has.
    fn retire(self) -> JoinHandle<()> {
        let _ = self.stop.send(());
        self.task
    }
}

struct WaiterState {
    pumps: Mutex<HashMap<Uuid, Pump>>,
    /// Abandoned pumps still closing, by session.
    retiring: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    settled: DashMap<Uuid, Outcome>,
    generations: AtomicU64,
}

impl WaiterState {
    /// Deregister the pump and cache its outcome. Returns the outcome every
    /// waiter should see, which is the cached one if the request already settled.
    fn settle(&self, session: Uuid, generation: u64, request_id: Uuid, outcome: Outcome) -> Outcome {
        let mut pumps = lock(&self.pumps);
        if pumps.get(&session).is_some_and(|p| p.generation == generation) {
            pumps.remove(&session);
        }

        if let Some(existing) = self.settled.get(&request_id) {
            return existing.value().clone();
        }
        // Channel failures are not cached so the user can wait again.
        if !matches!(outcome, Err(ResolutionError::Channel { .. })) {
            self.settled.insert(request_id, outcome.clone());
        }
        outcome
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared, cloneable resolution waiter.
#[derive(Clone)]
pub struct ResolutionWaiter {
    source: Arc<dyn NotificationSource>,
    shutdown: Shutdown,
    state: Arc<WaiterState>,
}

impl ResolutionWaiter {
    pub fn new(source: Arc<dyn NotificationSource>, shutdown: Shutdown) -> Self {
        Self {
            source,
            shutdown,
            state: Arc::new(WaiterState {
                pumps: Mutex::new(HashMap::new()),
                retiring: Mutex::new(HashMap::new()),
                settled: DashMap::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Wait for `handle` to reach a terminal outcome.
    ///
    /// Starting a wait for a different request in the same session supersedes
    /// the session's previous wait. Waiting again on a settled request returns
    /// the cached outcome without opening a channel.
    pub async fn wait(&self, session: Uuid, handle: &RequestHandle) -> Outcome {
        if let Some(outcome) = self.settled(handle.id) {
            return outcome;
        }

        let (generation, mut outcome_rx) = {
            let mut pumps = lock(&self.state.pumps);

            // Re-check under the lock: a pump caches before it deregisters.
            if let Some(outcome) = self.settled(handle.id) {
                return outcome;
            }

            match pumps.get_mut(&session) {
                Some(pump) if pump.request_id == handle.id => {
                    pump.waiters += 1;
                    (pump.generation, pump.outcome.clone())
                }
                _ => {
                    let previous = match pumps.remove(&session) {
                        Some(previous) => Some(self.supersede(previous)),
                        None => lock(&self.state.retiring).remove(&session),
                    };
                    let pump = self.spawn_pump(session, handle.clone(), previous);
                    let subscription = (pump.generation, pump.outcome.clone());
                    pumps.insert(session, pump);
                    subscription
                }
            }
        };

        let _guard = WaiterGuard {
            state: self.state.clone(),
            session,
            generation,
        };

        let result = match outcome_rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        result
            .or_else(|| self.settled(handle.id))
            .unwrap_or(Err(ResolutionError::Superseded { request_id: handle.id }))
    }

    /// Cached terminal outcome for `request_id`, if any.
    pub fn settled(&self, request_id: Uuid) -> Option<Outcome> {
        self.state.settled.get(&request_id).map(|entry| entry.value().clone())
    }

    /// Number of sessions with a running pump.
    pub fn active_pumps(&self) -> usize {
        lock(&self.state.pumps).len()
    }

    /// Drop cached outcomes, e.g. when the session is reset.
    pub fn forget(&self, request_ids: &[Uuid]) {
        for id in request_ids {
            self.state.settled.remove(id);
        }
    }

    /// Called with the pumps lock held.
    fn supersede(&self, previous: Pump) -> JoinHandle<()> {
        let request_id = previous.request_id;
        let mut superseded = false;
        self.state.settled.entry(request_id).or_insert_with(|| {
            superseded = true;
            Err(ResolutionError::Superseded { request_id })
        });

        if superseded {
            metrics::record_resolution("superseded");
            tracing::info!(request_id = %request_id, "Signing request wait superseded");
        }
        previous.retire()
    }

    fn spawn_pump(&self, session: Uuid, handle: RequestHandle, previous: Option<JoinHandle<()>>) -> Pump {
        let generation = self.state.generations.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        let (stop, stopped) = oneshot::channel();
        let source = self.source.clone();
        let shutdown = self.shutdown.clone();
        let state = self.state.clone();
        let request_id = handle.id;

        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            let Some(outcome) = pump(source.as_ref(), &handle, &shutdown, stopped).await else {
                tracing::debug!(request_id = %handle.id, "Pump stopped, notification channel released");
                return;
            };
            let outcome = state.settle(session, generation, handle.id, outcome);
            record(&handle, &outcome);
            let _ = tx.send(Some(outcome));
        });

        Pump {
            generation,
            request_id,
            outcome: rx,
            stop,
            task,
            waiters: 1,
        }
    }
}

/// Decrements the waiter count; the last waiter out retires an unsettled pump.
struct WaiterGuard {
    state: Arc<WaiterState>,
    session: Uuid,
    generation: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        let mut pumps = lock(&self.state.pumps);
        let abandoned = match pumps.get_mut(&self.session) {
            Some(pump) if pump.generation == self.generation => {
                pump.waiters = pump.waiters.saturating_sub(1);
                pump.waiters == 0 && pump.outcome.borrow().is_none()
            }
            _ => false,
        };
        if !abandoned {
            return;
        }

        if let Some(pump) = pumps.remove(&self.session) {
            let request_id = pump.request_id;
            lock(&self.state.retiring).insert(self.session, pump.retire());
            metrics::record_resolution("abandoned");
            tracing::debug!(request_id = %request_id, "Last waiter left, releasing notification channel");
        }
    }
}

/// Open the channel and read frames until a terminal outcome.
///
/// Returns `None` when stopped; the lease is closed before returning either way.
async fn pump(
    source: &dyn NotificationSource,
    handle: &RequestHandle,
    shutdown: &Shutdown,
    mut stop: oneshot::Receiver<()>,
) -> Option<Outcome> {
    let request_id = handle.id;
    let mut deadline = handle.expires_at;

    let channel = tokio::select! {
        _ = &mut stop => return None,
        _ = shutdown.cancelled() => return Some(Err(ResolutionError::Cancelled { request_id })),
        _ = tokio::time::sleep_until(deadline) => return Some(Err(ResolutionError::Timeout { request_id })),
        opened = source.open(handle) => match opened {
            Ok(channel) => channel,
            Err(source) => return Some(Err(ResolutionError::Channel { request_id, source })),
        }
    };
    let mut lease = ChannelLease::new(request_id, channel);

    let outcome = loop {
        tokio::select! {
            _ = &mut stop => break None,
            _ = shutdown.cancelled() => break Some(Err(ResolutionError::Cancelled { request_id })),
            _ = tokio::time::sleep_until(deadline) => break Some(Err(ResolutionError::Timeout { request_id })),
            frame = lease.next_message() => match frame {
                Some(Ok(text)) => {
                    let message = SignerMessage::parse(&text);
                    if !message.concerns(request_id) {
                        tracing::debug!(request_id = %request_id, other = ?message.request_id, "Ignoring frame for another request");
                        continue;
                    }
                    if let Some(resolution) = message.resolution(request_id) {
                        break Some(Ok(resolution));
                    }
                    if let SignerEvent::ExpiresIn(seconds) = message.event {
                        deadline = tighten_deadline(deadline, seconds);
                    }
                }
                Some(Err(source)) => break Some(Err(ResolutionError::Channel { request_id, source })),
                None => {
                    break Some(Err(ResolutionError::Channel {
                        request_id,
                        source: ChannelError::Transport("closed by signer".to_string()),
                    }))
                }
            },
        }
    };

    lease.close().await;
    outcome
}

fn record(handle: &RequestHandle, outcome: &Outcome) {
    let label = match outcome {
        Ok(resolution) => resolution.label(),
        Err(ResolutionError::Timeout { .. }) => "timeout",
        Err(ResolutionError::Cancelled { .. }) => "cancelled",
        Err(ResolutionError::Superseded { .. }) => "superseded",
        Err(ResolutionError::Channel { .. }) => "channel_error",
    };
    metrics::record_resolution(label);
    tracing::info!(request_id = %handle.id, kind = handle.kind, outcome = label, "Signing request settled");
}
