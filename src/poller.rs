//! Repeating fetches keyed by resource name.
//!
//! A [`PollerRegistry`] owns every polling timer. Each key has at most one
//! live timer: starting a key that is already running replaces it, and
//! pausing/resuming never leaves two behind.
//!
//! Every start or resume tags the spawned timer with a fresh generation.
//! A fetch result is handed to its callback only while that generation is
//! still current, under the registry lock, so once [`PollerRegistry::stop`]
//! or a pause returns, no result from the old timer can land.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, trace};

use crate::error::ControlError;

type Spawner = Arc<dyn Fn(u64) -> JoinHandle<()> + Send + Sync>;

struct Slot {
    /// Generation of the `start` call that registered this slot.
    origin: u64,
    generation: u64,
    active: bool,
    task: Option<JoinHandle<()>>,
    spawn: Spawner,
}

impl Slot {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Default)]
struct State {
    slots: HashMap<String, Slot>,
    next_generation: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Sets the active flag of `key`, cancelling or respawning its timer.
    fn set_active(&mut self, key: &str, active: bool) -> Result<(), ControlError> {
        let generation = self.next_generation + 1;
        let slot = self.slots.get_mut(key).ok_or_else(|| ControlError::UnknownPoller(key.to_owned()))?;
        if slot.active == active {
            return Ok(());
        }
        slot.cancel();
        slot.generation = generation;
        slot.active = active;
        if active {
            slot.task = Some((slot.spawn)(generation));
            debug!(key, generation, "poller resumed");
        } else {
            debug!(key, "poller paused");
        }
        self.next_generation = generation;
        Ok(())
    }
}

struct Inner {
    runtime: Handle,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `deliver` if `generation` is still the live one for `key`.
    /// Returns `false` when the timer that produced the result is stale.
    fn deliver(&self, key: &str, generation: u64, deliver: impl FnOnce()) -> bool {
        let state = self.lock();
        match state.slots.get(key) {
            Some(slot) if slot.active && slot.generation == generation => {
                deliver();
                true
            }
            _ => {
                trace!(key, generation, "dropping stale poll result");
                false
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for slot in state.slots.values_mut() {
            slot.cancel();
        }
    }
}

/// Shared registry of polling timers. Cloning is cheap; the timers stop when
/// the last clone is dropped.
#[derive(Clone)]
pub struct PollerRegistry {
    inner: Arc<Inner>,
}

impl PollerRegistry {
    pub fn new(runtime: Handle) -> Self {
        Self { inner: Arc::new(Inner { runtime, state: Mutex::new(State::default()) }) }
    }

    /// Registry bound to the runtime the caller is running on.
    ///
    /// Panics outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Calls `fetch` every `period`, first call immediately, and hands each
    /// result to `on_result`. Failures are delivered too and do not stop the
    /// timer. An existing poller under `key` is cancelled first.
    ///
    /// `on_result` runs under the registry lock and must not call back into
    /// the registry.
    pub fn start<T, F, Fut, R>(
        &self,
        key: impl Into<String>,
        period: Duration,
        fetch: F,
        on_result: R,
    ) -> PollerHandle
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ControlError>> + Send + 'static,
        R: Fn(Result<T, ControlError>) + Send + Sync + 'static,
    {
        let key = key.into();
        let period = period.max(Duration::from_millis(1));
        let fetch = Arc::new(fetch);
        let on_result = Arc::new(on_result);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let runtime = self.inner.runtime.clone();
        let task_key = key.clone();

        let spawn: Spawner = Arc::new(move |generation| {
            let fetch = Arc::clone(&fetch);
            let on_result = Arc::clone(&on_result);
            let weak = weak.clone();
            let key = task_key.clone();
            runtime.spawn(async move {
                let mut ticker = time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let result = fetch().await;
                    let Some(inner) = weak.upgrade() else { break };
                    if !inner.deliver(&key, generation, || on_result(result)) {
                        break;
                    }
                }
            })
        });

        let mut state = self.inner.lock();
        let generation = state.bump();
        if let Some(mut old) = state.slots.remove(&key) {
            debug!(key = %key, old = old.generation, "replacing poller");
            old.cancel();
        }
        let task = spawn(generation);
        state.slots.insert(
            key.clone(),
            Slot { origin: generation, generation, active: true, task: Some(task), spawn },
        );
        debug!(key = %key, generation, ?period, "poller started");

        PollerHandle { key, origin: generation, registry: self.clone() }
    }

    /// Cancels and unregisters `key`. Returns whether anything was registered.
    pub fn stop(&self, key: &str) -> bool {
        let mut state = self.inner.lock();
        match state.slots.remove(key) {
            Some(mut slot) => {
                slot.cancel();
                debug!(key, "poller stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let mut state = self.inner.lock();
        for (key, mut slot) in state.slots.drain() {
            slot.cancel();
            debug!(key = %key, "poller stopped");
        }
    }

    /// Cancels the timer but keeps the registration so it can be resumed.
    pub fn pause(&self, key: &str) -> Result<(), ControlError> {
        self.inner.lock().set_active(key, false)
    }

    /// Spawns a fresh timer that fires immediately. No-op when already active.
    pub fn resume(&self, key: &str) -> Result<(), ControlError> {
        self.inner.lock().set_active(key, true)
    }

    /// Pauses an active poller or resumes a paused one. Returns the new
    /// active flag.
    pub fn toggle(&self, key: &str) -> Result<bool, ControlError> {
        let mut state = self.inner.lock();
        let active = !state.slots.get(key).is_some_and(|s| s.active);
        state.set_active(key, active)?;
        Ok(active)
    }

    /// Runs `deliver` under the registry lock if `generation` is still the
    /// live, active one for `key`. Lets a one-off fetch obey the same
    /// cancellation rule as the timer.
    pub fn deliver_if_live(&self, key: &str, generation: u64, deliver: impl FnOnce()) -> bool {
        self.inner.deliver(key, generation, deliver)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.inner.lock().slots.get(key).is_some_and(|s| s.active)
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.inner.lock().slots.contains_key(key)
    }

    pub fn generation(&self, key: &str) -> Option<u64> {
        self.inner.lock().slots.get(key).map(|s| s.generation)
    }

    /// Number of timers currently running across all keys.
    pub fn live_timers(&self) -> usize {
        self.inner.lock().slots.values().filter(|s| s.task.is_some()).count()
    }

    fn owns(&self, key: &str, origin: u64) -> bool {
        self.inner.lock().slots.get(key).is_some_and(|s| s.origin == origin)
    }
}

/// Handle returned by [`PollerRegistry::start`].
///
/// A handle only controls the registration it came from: once the key is
/// restarted by someone else, the old handle's operations become no-ops.
#[derive(Clone)]
pub struct PollerHandle {
    key: String,
    origin: u64,
    registry: PollerRegistry,
}

impl PollerHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> Option<u64> {
        if self.is_current() {
            self.registry.generation(&self.key)
        } else {
            None
        }
    }

    /// Generation to tag a one-off fetch with, or `None` when this handle
    /// is stale or its poller is paused.
    pub fn live_generation(&self) -> Option<u64> {
        let state = self.registry.inner.lock();
        state.slots.get(&self.key).filter(|s| s.origin == self.origin && s.active).map(|s| s.generation)
    }

    /// See [`PollerRegistry::deliver_if_live`].
    pub fn deliver_if_live(&self, generation: u64, deliver: impl FnOnce()) -> bool {
        self.registry.deliver_if_live(&self.key, generation, deliver)
    }

    pub fn is_current(&self) -> bool {
        self.registry.owns(&self.key, self.origin)
    }

    pub fn is_active(&self) -> bool {
        self.is_current() && self.registry.is_active(&self.key)
    }

    /// Idempotent.
    pub fn stop(&self) -> bool {
        self.is_current() && self.registry.stop(&self.key)
    }

    pub fn toggle(&self) -> Result<bool, ControlError> {
        if !self.is_current() {
            return Err(ControlError::UnknownPoller(self.key.clone()));
        }
        self.registry.toggle(&self.key)
    }
}

impl std::fmt::Debug for PollerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerHandle").field("key", &self.key).field("origin", &self.origin).finish()
    }
}
