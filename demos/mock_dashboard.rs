use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use servo_dashboard::{
    CalibrationParams, ClientConfig, ControlError, Dashboard, HealthCheck, ImuReading, PingReport,
    PollerRegistry, ServoApi, ServoId, ServoInfo, ServoPosition,
};

#[derive(Default)]
struct DummyApi {
    positions: Mutex<HashMap<ServoId, f64>>,
}

#[async_trait]
impl ServoApi for DummyApi {
    async fn ping(&self) -> Result<PingReport, ControlError> {
        Ok(PingReport { message: "Successfully pinged dummy".into(), output: "1 packet".into() })
    }

    async fn scan_servos(&self) -> Result<Vec<ServoId>, ControlError> {
        Ok(vec![ServoId(1), ServoId(2)])
    }

    async fn get_positions(&self) -> Result<Vec<ServoPosition>, ControlError> {
        let positions = self.positions.lock().unwrap();
        Ok(positions
            .iter()
            .map(|(id, p)| ServoPosition { servo_id: *id, position: *p, speed: 0.0 })
            .collect())
    }

    async fn get_imu_data(&self) -> Result<ImuReading, ControlError> {
        Err(ControlError::Transport("no imu on the dummy".into()))
    }

    async fn get_servo_info(&self, id: ServoId) -> Result<ServoInfo, ControlError> {
        let position = self.positions.lock().unwrap().get(&id).copied().unwrap_or(0.0);
        Ok(ServoInfo { current_position: Some(position), temperature: Some(30.0), ..Default::default() })
    }

    async fn set_servo_position(&self, id: ServoId, position: f64) -> Result<(), ControlError> {
        self.positions.lock().unwrap().insert(id, position);
        Ok(())
    }

    async fn start_calibration(&self, _id: ServoId, _params: CalibrationParams) -> Result<(), ControlError> {
        Ok(())
    }

    async fn cancel_calibration(&self, _id: ServoId) -> Result<(), ControlError> {
        Ok(())
    }

    async fn change_servo_id(&self, _old: ServoId, _new: ServoId) -> Result<Option<String>, ControlError> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ClientConfig {
        servo_poll_period: Duration::from_millis(100),
        health_poll_period: Duration::from_millis(250),
        ..ClientConfig::default()
    };
    let dashboard = Dashboard::mount(DummyApi::default(), &cfg, PollerRegistry::current());

    dashboard.selection.select(ServoId(1));
    dashboard.store.set_pending_position(ServoId(1), 45.0)?;
    dashboard.commands.submit_pending_position().await?;
    dashboard.health.toggle(HealthCheck::Imu)?;

    tokio::time::sleep(Duration::from_millis(300)).await;

    if let Some(servo) = dashboard.store.get(ServoId(1)) {
        println!("servo 1 at {}°, {:?}", servo.position, servo.telemetry);
    }
    for result in dashboard.health.results() {
        println!("[{}] active={} {}", result.check.label(), result.active, result.text());
    }
    dashboard.close();
    Ok(())
}
