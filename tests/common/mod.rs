#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use servo_dashboard::{
    CalibrationParams, ControlError, ImuReading, PingReport, ServoApi, ServoId, ServoInfo,
    ServoPosition,
};

#[derive(Default)]
pub struct FakeState {
    pub infos: HashMap<ServoId, ServoInfo>,
    /// Artificial latency for `get_servo_info`, per servo.
    pub info_delay: HashMap<ServoId, Duration>,
    pub scan_delay: Option<Duration>,
    pub fail_info: bool,
    pub fail_commands: bool,
    pub fail_ping: bool,
    pub calls: HashMap<&'static str, usize>,
    pub info_calls: HashMap<ServoId, usize>,
    pub id_changes: Vec<(ServoId, ServoId)>,
    pub torque: Vec<(ServoId, f64)>,
}

/// In-memory servo service. Clones share state so a test can keep one copy
/// while the dashboard owns the other.
#[derive(Clone, Default)]
pub struct FakeServoApi {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeServoApi {
    pub fn with_servo(self, id: u8, position: f64) -> Self {
        self.state.lock().unwrap().infos.insert(
            ServoId(id),
            ServoInfo {
                current_position: Some(position),
                temperature: Some(31.5),
                current: Some(0.12),
                voltage: Some(7.4),
                speed: Some(0.0),
            },
        );
        self
    }

    pub fn set(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state.lock().unwrap().calls.get(name).copied().unwrap_or(0)
    }

    pub fn info_calls(&self, id: u8) -> usize {
        self.state.lock().unwrap().info_calls.get(&ServoId(id)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    fn hit(&self, name: &'static str) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(name).or_default() += 1;
        state
    }

    fn command(&self, name: &'static str) -> Result<(), ControlError> {
        if self.hit(name).fail_commands {
            Err(ControlError::Application { status: "failure".into(), message: format!("{name} refused") })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ServoApi for FakeServoApi {
    async fn ping(&self) -> Result<PingReport, ControlError> {
        if self.hit("ping").fail_ping {
            return Err(ControlError::Transport("connection refused".into()));
        }
        Ok(PingReport { message: "Successfully pinged 192.168.42.1".into(), output: "1 received".into() })
    }

    async fn scan_servos(&self) -> Result<Vec<ServoId>, ControlError> {
        let (delay, mut ids) = {
            let state = self.hit("scan");
            (state.scan_delay, state.infos.keys().copied().collect::<Vec<ServoId>>())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        ids.sort();
        Ok(ids)
    }

    async fn get_positions(&self) -> Result<Vec<ServoPosition>, ControlError> {
        let state = self.hit("positions");
        let mut rows: Vec<ServoPosition> = state
            .infos
            .iter()
            .map(|(id, info)| ServoPosition {
                servo_id: *id,
                position: info.current_position.unwrap_or_default(),
                speed: info.speed.unwrap_or_default(),
            })
            .collect();
        rows.sort_by_key(|r| r.servo_id);
        Ok(rows)
    }

    async fn get_imu_data(&self) -> Result<ImuReading, ControlError> {
        drop(self.hit("imu"));
        Ok(ImuReading {
            gyro: serde_json::json!({"x": 0.0, "y": 0.0, "z": 0.0}),
            accel: serde_json::json!({"x": 0.0, "y": 0.0, "z": 9.8}),
        })
    }

    async fn get_servo_info(&self, id: ServoId) -> Result<ServoInfo, ControlError> {
        let (delay, result) = {
            let mut state = self.hit("info");
            *state.info_calls.entry(id).or_default() += 1;
            let result = if state.fail_info {
                Err(ControlError::Transport("timed out".into()))
            } else {
                state
                    .infos
                    .get(&id)
                    .copied()
                    .ok_or_else(|| ControlError::Application { status: "error".into(), message: "no such servo".into() })
            };
            (state.info_delay.get(&id).copied(), result)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn set_servo_position(&self, id: ServoId, position: f64) -> Result<(), ControlError> {
        self.command("set_position")?;
        if let Some(info) = self.state.lock().unwrap().infos.get_mut(&id) {
            info.current_position = Some(position);
        }
        Ok(())
    }

    async fn start_calibration(&self, _id: ServoId, _params: CalibrationParams) -> Result<(), ControlError> {
        self.command("start_calibration")
    }

    async fn cancel_calibration(&self, _id: ServoId) -> Result<(), ControlError> {
        self.command("cancel_calibration")
    }

    async fn change_servo_id(&self, old_id: ServoId, new_id: ServoId) -> Result<Option<String>, ControlError> {
        self.command("change_id")?;
        self.state.lock().unwrap().id_changes.push((old_id, new_id));
        Ok(Some(format!("Successfully changed servo ID from {old_id} to {new_id}")))
    }

    async fn calibration_status(&self) -> Result<String, ControlError> {
        drop(self.hit("calibration_status"));
        Ok("No calibration in progress".into())
    }

    async fn set_torque_enable(&self, _settings: &[(ServoId, bool)]) -> Result<(), ControlError> {
        self.command("torque_enable")
    }

    async fn set_torque(&self, settings: &[(ServoId, f64)]) -> Result<(), ControlError> {
        self.command("torque")?;
        self.state.lock().unwrap().torque.extend_from_slice(settings);
        Ok(())
    }

    async fn set_movement_enabled(&self, _enabled: bool) -> Result<(), ControlError> {
        self.command("movement")
    }
}
