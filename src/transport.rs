use async_trait::async_trait;

use crate::{
    error::ControlError,
    model::{CalibrationParams, ImuReading, PingReport, ServoId, ServoInfo, ServoPosition},
};

/// Remote servo service. Every method is one request; `Ok` means the service
/// answered with `status: "success"`.
#[async_trait]
pub trait ServoApi: Send + Sync + 'static {
    async fn ping(&self) -> Result<PingReport, ControlError>;
    async fn scan_servos(&self) -> Result<Vec<ServoId>, ControlError>;
    async fn get_positions(&self) -> Result<Vec<ServoPosition>, ControlError>;
    async fn get_imu_data(&self) -> Result<ImuReading, ControlError>;
    async fn get_servo_info(&self, id: ServoId) -> Result<ServoInfo, ControlError>;

    async fn set_servo_position(&self, id: ServoId, position: f64) -> Result<(), ControlError>;
    async fn start_calibration(
        &self,
        id: ServoId,
        params: CalibrationParams,
    ) -> Result<(), ControlError>;
    async fn cancel_calibration(&self, id: ServoId) -> Result<(), ControlError>;
    /// Returns the service's confirmation message, if it sent one.
    async fn change_servo_id(
        &self,
        old_id: ServoId,
        new_id: ServoId,
    ) -> Result<Option<String>, ControlError>;

    async fn calibration_status(&self) -> Result<String, ControlError> {
        Err(ControlError::Transport("calibration status not supported".into()))
    }

    async fn set_torque_enable(&self, _settings: &[(ServoId, bool)]) -> Result<(), ControlError> {
        Err(ControlError::Transport("torque enable not supported".into()))
    }

    /// Applies a torque value per servo.
    async fn set_torque(&self, _settings: &[(ServoId, f64)]) -> Result<(), ControlError> {
        Err(ControlError::Transport("torque not supported".into()))
    }

    async fn set_movement_enabled(&self, _enabled: bool) -> Result<(), ControlError> {
        Err(ControlError::Transport("movement control not supported".into()))
    }
}
