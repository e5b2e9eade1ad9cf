use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tracing::{debug, warn};

use crate::{
    error::ControlError,
    model::{ServoId, ServoInfo},
    poller::PollerRegistry,
    store::ServoStore,
    transport::ServoApi,
};

/// Registry key shared by every per-servo info poller, so the registry's
/// one-timer-per-key rule caps them at one.
pub const SERVO_INFO_KEY: &str = "servo_info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Unselected,
    Selected(ServoId),
}

/// Tracks the focused servo and keeps the info poller pointed at it.
pub struct SelectionController<A: ServoApi> {
    api: Arc<A>,
    store: ServoStore,
    registry: PollerRegistry,
    period: Duration,
    current: Arc<Mutex<Selection>>,
}

impl<A: ServoApi> Clone for SelectionController<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: self.store.clone(),
            registry: self.registry.clone(),
            period: self.period,
            current: Arc::clone(&self.current),
        }
    }
}

impl<A: ServoApi> SelectionController<A> {
    pub fn new(api: Arc<A>, store: ServoStore, registry: PollerRegistry, period: Duration) -> Self {
        Self { api, store, registry, period, current: Arc::new(Mutex::new(Selection::Unselected)) }
    }

    pub fn current(&self) -> Selection {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn selected(&self) -> Option<ServoId> {
        match self.current() {
            Selection::Selected(id) => Some(id),
            Selection::Unselected => None,
        }
    }

    /// Focuses `id`, or clears the focus when `id` is already selected.
    pub fn select(&self, id: ServoId) -> Selection {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        self.registry.stop(SERVO_INFO_KEY);
        self.store.clear_error();

        if *current == Selection::Selected(id) {
            debug!(servo = %id, "servo deselected");
            *current = Selection::Unselected;
            return *current;
        }

        self.start_info_poller(id);
        debug!(servo = %id, "servo selected");
        *current = Selection::Selected(id);
        *current
    }

    pub fn deselect(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        self.registry.stop(SERVO_INFO_KEY);
        self.store.clear_error();
        *current = Selection::Unselected;
    }

    fn start_info_poller(&self, id: ServoId) {
        let api = Arc::clone(&self.api);
        let store = self.store.clone();
        self.registry.start(
            SERVO_INFO_KEY,
            self.period,
            move || {
                let api = Arc::clone(&api);
                async move { api.get_servo_info(id).await }
            },
            move |result: Result<ServoInfo, ControlError>| match result {
                Ok(info) => store.apply_telemetry(id, info.into()),
                Err(e) => {
                    warn!(servo = %id, "servo info poll failed: {e}");
                    store.set_error(format!("Failed to fetch servo info for servo {id}."));
                }
            },
        );
    }
}
