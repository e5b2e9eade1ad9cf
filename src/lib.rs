pub mod config;
pub mod dashboard;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod model;
pub mod poller;
pub mod selection;
pub mod store;
pub mod transport;
pub mod transport_http;

pub use config::ClientConfig;
pub use dashboard::Dashboard;
pub use dispatcher::CommandDispatcher;
pub use error::{ControlError, ValidationError};
pub use health::{HealthCheck, HealthCheckResult, HealthPayload, SystemHealthPanel};
pub use model::{
    CalibrationParams, ImuReading, PingReport, PositionRange, ServoId, ServoInfo, ServoPosition,
    ServoState, Telemetry, TelemetryUpdate,
};
pub use poller::{PollerHandle, PollerRegistry};
pub use selection::{Selection, SelectionController, SERVO_INFO_KEY};
pub use store::ServoStore;
pub use transport::ServoApi;
pub use transport_http::HttpServoApi;
