//! In-process environment
//!
//! Feeds every emitted trail straight into a `ChangeTrailConsumer` living in
//! the same process. By default the trail is first passed through a JSON
//! round trip, so the consumer never shares data with the authoring side,
//! exactly as if it had crossed a channel.

use crate::config::EnvConfig;
use crate::env::{lock, EntityEnv, TrailHook};
use crate::event::SyncEvent;
use entityverse_view::{ChangeTrail, ViewSpace, ViewSpaceRegistry};
use serde::de::Error as _;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Consumer side of the mirror: applies trails to the real objects
pub trait ChangeTrailConsumer: Send + 'static {
    fn apply(&mut self, event: &SyncEvent);
}

/// Records every event, handy for inspecting what a consumer would see
impl ChangeTrailConsumer for Vec<SyncEvent> {
    fn apply(&mut self, event: &SyncEvent) {
        self.push(event.clone());
    }
}

/// JSON round trip of `trail`
///
/// Non-finite orders turn into `null`, which an optional field reads back
/// without complaint, so a clone that differs from its source is an error too.
fn structured_clone(trail: &ChangeTrail) -> Result<ChangeTrail, serde_json::Error> {
    let clone: ChangeTrail = serde_json::to_value(trail).and_then(serde_json::from_value)?;
    if &clone != trail {
        return Err(serde_json::Error::custom("change trail does not survive a JSON round trip"));
    }
    Ok(clone)
}

pub struct EntityLocalEnv<C> {
    env: EntityEnv,
    consumer: Arc<Mutex<C>>,
    use_structured_clone: Arc<AtomicBool>,
}

impl<C: ChangeTrailConsumer> EntityLocalEnv<C> {
    pub fn new(space: ViewSpace, consumer: C) -> Self {
        let use_structured_clone = Arc::new(AtomicBool::new(true));

        let hook: TrailHook = {
            let enabled = use_structured_clone.clone();
            let warned = AtomicBool::new(false);
            let namespace = space.namespace().clone();

            Box::new(move |trail: ChangeTrail| {
                if !enabled.load(Ordering::Relaxed) {
                    return trail;
                }
                match structured_clone(&trail) {
                    Ok(clone) => clone,
                    Err(err) => {
                        if !warned.swap(true, Ordering::Relaxed) {
                            warn!(%namespace, %err, "structured clone of change trail failed, passing it on as is");
                        }
                        trail
                    }
                }
            })
        };

        let env = EntityEnv::with_trail_hook(space, Some(hook));
        let consumer = Arc::new(Mutex::new(consumer));
        {
            let consumer = consumer.clone();
            env.on_sync(move |event| lock(&consumer).apply(event));
        }

        Self {
            env,
            consumer,
            use_structured_clone,
        }
    }

    /// Environment for the namespace named in `config`
    pub fn from_config(registry: &ViewSpaceRegistry, config: &EnvConfig, consumer: C) -> Self {
        let local = Self::new(registry.get(&config.namespace()), consumer);
        local.set_structured_clone(config.structured_clone);
        local
    }

    pub fn start(&self) -> &Self {
        self.env.start();
        self
    }

    pub fn env(&self) -> &EntityEnv {
        &self.env
    }

    pub fn consumer(&self) -> MutexGuard<'_, C> {
        lock(&self.consumer)
    }

    pub fn uses_structured_clone(&self) -> bool {
        self.use_structured_clone.load(Ordering::Relaxed)
    }

    pub fn set_structured_clone(&self, enabled: bool) {
        self.use_structured_clone.store(enabled, Ordering::Relaxed);
    }
}

impl<C> Deref for EntityLocalEnv<C> {
    type Target = EntityEnv;

    fn deref(&self) -> &EntityEnv {
        &self.env
    }
}
