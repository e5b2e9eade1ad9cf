//! System checks: ping, servo scan, bulk positions and IMU, each on its own
//! timer and each with its own result slot.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tracing::{debug, warn};

use crate::{
    error::ControlError,
    model::{ImuReading, PingReport, ServoId, ServoPosition},
    poller::{PollerHandle, PollerRegistry},
    transport::ServoApi,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthCheck {
    Ping,
    Scan,
    Positions,
    Imu,
}

impl HealthCheck {
    pub const ALL: [HealthCheck; 4] = [Self::Ping, Self::Scan, Self::Positions, Self::Imu];

    pub fn key(self) -> &'static str {
        match self {
            Self::Ping => "health/ping",
            Self::Scan => "health/scan",
            Self::Positions => "health/positions",
            Self::Imu => "health/imu",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ping => "Ping",
            Self::Scan => "Scan",
            Self::Positions => "Positions",
            Self::Imu => "IMU",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HealthPayload {
    Ping(PingReport),
    Scan(Vec<ServoId>),
    Positions(Vec<ServoPosition>),
    Imu(ImuReading),
}

impl fmt::Display for HealthPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping(p) => write!(f, "{}\n\n{}", p.message, p.output),
            Self::Scan(ids) => {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                write!(f, "Servos found: {}", ids.join(", "))
            }
            Self::Positions(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "Servo ID: {}, Position: {}, Speed: {}", row.servo_id, row.position, row.speed)?;
                }
                Ok(())
            }
            Self::Imu(imu) => write!(f, "Gyroscope: {}, Accelerometer: {}", imu.gyro, imu.accel),
        }
    }
}

/// Snapshot of one check for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckResult {
    pub check: HealthCheck,
    pub active: bool,
    /// `None` until the first fetch lands; `Err` holds the failure reason.
    pub last: Option<Result<HealthPayload, String>>,
}

impl HealthCheckResult {
    pub fn text(&self) -> String {
        match &self.last {
            None => String::new(),
            Some(Ok(payload)) => payload.to_string(),
            Some(Err(reason)) => format!("Error: {reason}"),
        }
    }
}

type Slots = Arc<Mutex<HashMap<HealthCheck, Result<HealthPayload, String>>>>;

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<HealthCheck, Result<HealthPayload, String>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(slots: &Slots, check: HealthCheck, result: Result<HealthPayload, ControlError>) {
    let entry = result.map_err(|e| {
        warn!(check = check.label(), "health check failed: {e}");
        e.to_string()
    });
    lock(slots).insert(check, entry);
}

async fn run_check<A: ServoApi>(api: &A, check: HealthCheck) -> Result<HealthPayload, ControlError> {
    match check {
        HealthCheck::Ping => api.ping().await.map(HealthPayload::Ping),
        HealthCheck::Scan => api.scan_servos().await.map(HealthPayload::Scan),
        HealthCheck::Positions => api.get_positions().await.map(HealthPayload::Positions),
        HealthCheck::Imu => api.get_imu_data().await.map(HealthPayload::Imu),
    }
}

/// The four checks, mounted on a shared [`PollerRegistry`]. All start active.
pub struct SystemHealthPanel<A: ServoApi> {
    api: Arc<A>,
    pollers: HashMap<HealthCheck, PollerHandle>,
    slots: Slots,
}

impl<A: ServoApi> SystemHealthPanel<A> {
    pub fn mount(api: Arc<A>, registry: PollerRegistry, period: Duration) -> Self {
        let slots: Slots = Arc::default();
        let mut pollers = HashMap::new();
        for check in HealthCheck::ALL {
            let fetch_api = Arc::clone(&api);
            let slots = Arc::clone(&slots);
            let handle = registry.start(
                check.key(),
                period,
                move || {
                    let api = Arc::clone(&fetch_api);
                    async move { run_check(api.as_ref(), check).await }
                },
                move |result| record(&slots, check, result),
            );
            pollers.insert(check, handle);
        }
        Self { api, pollers, slots }
    }

    /// Pauses or resumes one check; returns whether it is now active.
    pub fn toggle(&self, check: HealthCheck) -> Result<bool, ControlError> {
        match self.pollers.get(&check) {
            Some(handle) => handle.toggle(),
            None => Err(ControlError::UnknownPoller(check.key().to_owned())),
        }
    }

    pub fn is_active(&self, check: HealthCheck) -> bool {
        self.pollers.get(&check).is_some_and(PollerHandle::is_active)
    }

    pub fn result(&self, check: HealthCheck) -> HealthCheckResult {
        // Read the registry before the slots: delivery takes them in that order.
        let active = self.is_active(check);
        let last = lock(&self.slots).get(&check).cloned();
        HealthCheckResult { check, active, last }
    }

    pub fn results(&self) -> Vec<HealthCheckResult> {
        HealthCheck::ALL.into_iter().map(|c| self.result(c)).collect()
    }

    /// One immediate round of every active check, run concurrently. A failing
    /// check only writes its own slot, and a check paused or restarted while
    /// its request is in flight keeps its previous result.
    pub async fn fetch_data(&self) {
        let api = self.api.as_ref();
        let slots = &self.slots;
        let run = |check: HealthCheck| {
            let live = self.pollers.get(&check).and_then(|h| h.live_generation().map(|g| (h, g)));
            async move {
                let Some((handle, generation)) = live else { return };
                let result = run_check(api, check).await;
                if !handle.deliver_if_live(generation, || record(slots, check, result)) {
                    debug!(check = check.label(), "discarding result of a paused check");
                }
            }
        };
        tokio::join!(
            run(HealthCheck::Ping),
            run(HealthCheck::Scan),
            run(HealthCheck::Positions),
            run(HealthCheck::Imu),
        );
    }

    /// Stops the four timers.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<A: ServoApi> Drop for SystemHealthPanel<A> {
    fn drop(&mut self) {
        for handle in self.pollers.values() {
            handle.stop();
        }
    }
}
