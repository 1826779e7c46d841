//! # Entity Environment
//!
//! Hands the change trail of one view space to its consumers.
//!
//! An environment starts out not ready. `sync()` calls made before `start()`
//! are queued and all of them complete with the single build that `start()`
//! performs. Once ready, every `sync()` builds right away.
//!
//! Built events wait in an outbox and are emitted strictly in sequence order
//! by whichever caller is draining it. A `sync()` issued while another
//! thread drains, or from inside a listener, only enqueues.
//!
//! ```text
//! sync() ──► [not ready] ──► queued ─┐
//!        │                           ├─► build_change_trails() ─► emit
//!        └─► [ready] ────────────────┘          listeners, then subscribers
//! ```

use crate::event::SyncEvent;
use entityverse_view::{ChangeTrail, Namespace, ViewSpace};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

type SyncListener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Runs over every freshly built trail before it is emitted
pub(crate) type TrailHook = Box<dyn Fn(ChangeTrail) -> ChangeTrail + Send + Sync>;

#[derive(Debug, Default)]
struct SyncState {
    ready: bool,
    /// `sync()` calls waiting for the first cycle
    queued: usize,
    sequence: u64,
    /// Built events not yet emitted, in sequence order
    outbox: VecDeque<SyncEvent>,
    draining: bool,
}

struct EnvShared {
    space: ViewSpace,
    state: Mutex<SyncState>,
    ready: watch::Sender<bool>,
    /// Sequence of the last emitted event
    completed: watch::Sender<u64>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SyncEvent>>>,
    listeners: Mutex<Vec<SyncListener>>,
    trail_hook: Option<TrailHook>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Readiness-gated sync handshake for one view space
///
/// Clones share the same environment.
#[derive(Clone)]
pub struct EntityEnv {
    shared: Arc<EnvShared>,
}

impl EntityEnv {
    pub fn new(space: ViewSpace) -> Self {
        Self::with_trail_hook(space, None)
    }

    pub(crate) fn with_trail_hook(space: ViewSpace, trail_hook: Option<TrailHook>) -> Self {
        let (ready, _) = watch::channel(false);
        let (completed, _) = watch::channel(0);

        Self {
            shared: Arc::new(EnvShared {
                space,
                state: Mutex::new(SyncState::default()),
                ready,
                completed,
                subscribers: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                trail_hook,
            }),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        self.shared.space.namespace()
    }

    pub fn view_space(&self) -> &ViewSpace {
        &self.shared.space
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.shared.state).ready
    }

    /// Sequence number of the last emitted event, 0 before the first one
    pub fn sequence(&self) -> u64 {
        lock(&self.shared.state).sequence
    }

    /// Become ready and flush the syncs queued so far
    ///
    /// Only the first call has an effect.
    pub fn start(&self) -> &Self {
        let drain = {
            let mut state = lock(&self.shared.state);
            if state.ready {
                return self;
            }
            state.ready = true;
            self.shared.ready.send_replace(true);
            info!(namespace = %self.namespace(), queued = state.queued, "entity env ready");

            if state.queued == 0 {
                false
            } else {
                state.queued = 0;
                self.next_cycle(&mut state)
            }
        };

        if drain {
            self.drain();
        }
        self
    }

    /// Resolves once `start()` has been called
    pub async fn ready(&self) -> &Self {
        let mut ready = self.shared.ready.subscribe();
        // the sender lives as long as `self`
        let _ = ready.wait_for(|ready| *ready).await;
        self
    }

    /// Request a sync cycle
    ///
    /// The request is registered right away: every mutation made before this
    /// call is part of the trail it waits for. The returned future completes
    /// once that trail has been emitted.
    pub fn sync(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut completed = self.shared.completed.subscribe();

        let (target, drain) = {
            let mut state = lock(&self.shared.state);
            if state.ready {
                let drain = self.next_cycle(&mut state);
                (state.sequence, drain)
            } else {
                state.queued += 1;
                (state.sequence + 1, false)
            }
        };

        if drain {
            self.drain();
        }

        async move {
            if completed.wait_for(|done| *done >= target).await.is_err() {
                debug!(sequence = target, "entity env dropped before sync completed");
            }
        }
    }

    /// Receive every future `SyncEvent`
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared.subscribers).push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.subscribers).len()
    }

    /// Call `listener` synchronously for every emitted event, before any
    /// subscriber channel is fed
    pub fn on_sync<F>(&self, listener: F)
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        lock(&self.shared.listeners).push(Arc::new(listener));
    }

    /// Build the next event into the outbox
    ///
    /// Returns true if the caller now owns the drain.
    fn next_cycle(&self, state: &mut SyncState) -> bool {
        state.sequence += 1;

        let mut change_trail = self.shared.space.build_change_trails();
        if let Some(hook) = &self.shared.trail_hook {
            change_trail = hook(change_trail);
        }

        state.outbox.push_back(SyncEvent {
            namespace: self.namespace().clone(),
            sequence: state.sequence,
            change_trail,
        });

        !std::mem::replace(&mut state.draining, true)
    }

    /// Emit queued events until the outbox is empty
    fn drain(&self) {
        let _release = ReleaseDrainOnPanic(&self.shared.state);
        loop {
            let event = {
                let mut state = lock(&self.shared.state);
                match state.outbox.pop_front() {
                    Some(event) => event,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };
            self.emit(event);
        }
    }

    fn emit(&self, event: SyncEvent) {
        debug!(
            namespace = %event.namespace,
            sequence = event.sequence,
            entries = event.change_trail.len(),
            "emit sync event"
        );

        let listeners: Vec<SyncListener> = lock(&self.shared.listeners).clone();
        for listener in &listeners {
            listener(&event);
        }

        let sequence = event.sequence;
        lock(&self.shared.subscribers).retain(|tx| tx.send(event.clone()).is_ok());

        self.shared.completed.send_replace(sequence);
    }
}

/// A panicking listener must not leave the outbox without a drainer
struct ReleaseDrainOnPanic<'a>(&'a Mutex<SyncState>);

impl Drop for ReleaseDrainOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

impl fmt::Debug for EntityEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("EntityEnv")
            .field("namespace", self.namespace())
            .field("ready", &state.ready)
            .field("sequence", &state.sequence)
            .finish()
    }
}
