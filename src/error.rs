use thiserror::Error;

use crate::model::ServoId;

/// Bad input caught locally. Nothing is sent to the service when one of
/// these is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please fill in both Old ID and New ID.")]
    MissingId,
    #[error("IDs must be numeric and between 0 and 255.")]
    InvalidId,
    #[error("Please select a servo ID first!")]
    NoSelection,
    #[error("servo {0} is not the selected servo")]
    NotSelected(ServoId),
    #[error("Value is below the minimum of {min}")]
    BelowMinimum { value: f64, min: f64 },
    #[error("Value exceeds the maximum of {max}")]
    AboveMaximum { value: f64, max: f64 },
    #[error("servo {0} is already calibrating")]
    AlreadyCalibrating(ServoId),
    #[error("servo {0} is not calibrating")]
    NotCalibrating(ServoId),
}

#[derive(Debug, Error, Clone)]
pub enum ControlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service replied `{status}`: {message}")]
    Application { status: String, message: String },
    #[error("{message}")]
    Command {
        message: String,
        #[source]
        source: Box<ControlError>,
    },
    #[error("no poller registered for `{0}`")]
    UnknownPoller(String),
}

impl ControlError {
    pub fn command(message: impl Into<String>, source: ControlError) -> Self {
        Self::Command { message: message.into(), source: Box::new(source) }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
