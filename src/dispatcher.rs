use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{ControlError, ValidationError},
    model::{CalibrationParams, ServoId},
    selection::SelectionController,
    store::ServoStore,
    transport::ServoApi,
};

pub const CHANGE_ID_FALLBACK: &str = "ID successfully changed.";
pub const CHANGE_ID_FAILED: &str = "Failed to change servo ID. Please try again.";

/// Turns operator intents into requests. Inputs are validated before
/// anything is sent; the store only changes once the service confirms.
pub struct CommandDispatcher<A: ServoApi> {
    api: Arc<A>,
    store: ServoStore,
    selection: SelectionController<A>,
    calibration: CalibrationParams,
}

impl<A: ServoApi> CommandDispatcher<A> {
    pub fn new(
        api: Arc<A>,
        store: ServoStore,
        selection: SelectionController<A>,
        calibration: CalibrationParams,
    ) -> Self {
        Self { api, store, selection, calibration }
    }

    /// Moves the selected servo. On failure the confirmed position is left
    /// as it was and the error line names the servo.
    pub async fn set_position(&self, id: ServoId, value: f64) -> Result<(), ControlError> {
        if self.selection.selected() != Some(id) {
            return Err(ValidationError::NotSelected(id).into());
        }
        let servo = self.store.get(id).ok_or(ValidationError::NotSelected(id))?;
        servo.range.check(value)?;

        match self.api.set_servo_position(id, value).await {
            Ok(()) => {
                info!(servo = %id, position = value, "position set");
                self.store.confirm_position(id, value);
                Ok(())
            }
            Err(e) => Err(self.fail(format!("Failed to set position for servo {id}."), e)),
        }
    }

    /// Sends the selected servo's pending value.
    pub async fn submit_pending_position(&self) -> Result<(), ControlError> {
        let Some(id) = self.selection.selected() else {
            self.store.set_error(ValidationError::NoSelection.to_string());
            return Err(ValidationError::NoSelection.into());
        };
        let pending = self.store.get(id).map(|s| s.pending_position).unwrap_or_default();
        self.set_position(id, pending).await
    }

    pub async fn start_calibration(&self, id: ServoId) -> Result<(), ControlError> {
        if self.store.get(id).is_some_and(|s| s.calibrating) {
            return Err(ValidationError::AlreadyCalibrating(id).into());
        }
        match self.api.start_calibration(id, self.calibration).await {
            Ok(()) => {
                info!(servo = %id, "calibration started");
                self.store.set_calibrating(id, true);
                Ok(())
            }
            Err(e) => Err(self.fail(format!("Failed to start calibration for servo {id}."), e)),
        }
    }

    pub async fn cancel_calibration(&self, id: ServoId) -> Result<(), ControlError> {
        if !self.store.get(id).is_some_and(|s| s.calibrating) {
            return Err(ValidationError::NotCalibrating(id).into());
        }
        match self.api.cancel_calibration(id).await {
            Ok(()) => {
                info!(servo = %id, "calibration cancelled");
                self.store.set_calibrating(id, false);
                Ok(())
            }
            Err(e) => Err(self.fail(format!("Failed to cancel calibration for servo {id}."), e)),
        }
    }

    /// Re-addresses a servo from raw form input. Returns the message to show
    /// the operator on success.
    pub async fn change_servo_id(&self, old_id: &str, new_id: &str) -> Result<String, ControlError> {
        if old_id.is_empty() || new_id.is_empty() {
            return Err(ValidationError::MissingId.into());
        }
        let old = ServoId::parse_field(old_id)?;
        let new = ServoId::parse_field(new_id)?;

        match self.api.change_servo_id(old, new).await {
            Ok(message) => {
                info!(old = %old, new = %new, "servo id changed");
                Ok(message.unwrap_or_else(|| CHANGE_ID_FALLBACK.to_string()))
            }
            Err(e) => {
                warn!(old = %old, new = %new, "servo id change failed: {e}");
                Err(ControlError::command(CHANGE_ID_FAILED, e))
            }
        }
    }

    pub async fn calibration_status(&self) -> Result<String, ControlError> {
        self.api.calibration_status().await
    }

    pub async fn set_torque_enable(&self, settings: &[(ServoId, bool)]) -> Result<(), ControlError> {
        match self.api.set_torque_enable(settings).await {
            Ok(()) => {
                info!(count = settings.len(), "torque enable applied");
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to apply torque settings.", e)),
        }
    }

    pub async fn set_torque(&self, settings: &[(ServoId, f64)]) -> Result<(), ControlError> {
        match self.api.set_torque(settings).await {
            Ok(()) => {
                info!(count = settings.len(), "torque applied");
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to apply torque values.", e)),
        }
    }

    pub async fn enable_movement(&self) -> Result<(), ControlError> {
        self.movement(true).await
    }

    pub async fn disable_movement(&self) -> Result<(), ControlError> {
        self.movement(false).await
    }

    async fn movement(&self, enabled: bool) -> Result<(), ControlError> {
        match self.api.set_movement_enabled(enabled).await {
            Ok(()) => {
                info!(enabled, "movement toggled");
                Ok(())
            }
            Err(e) => Err(self.fail(
                if enabled { "Failed to enable movement." } else { "Failed to disable movement." },
                e,
            )),
        }
    }

    fn fail(&self, message: impl Into<String>, source: ControlError) -> ControlError {
        let message = message.into();
        warn!("{message} ({source})");
        self.store.set_error(message.clone());
        ControlError::command(message, source)
    }
}
