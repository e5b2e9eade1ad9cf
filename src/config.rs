use std::time::Duration;

use crate::model::{CalibrationParams, PositionRange, ServoId};

/// Connection settings and polling cadence.
///
/// The address fields are free text: nothing here is validated, a bad value
/// shows up as a transport error on the first request.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and host of the servo service, e.g. `http://192.168.1.100`.
    pub service_ip: String,
    pub service_port: String,
    /// Address of the robot the service should talk to, sent as `ip=`.
    pub bot_ip: String,
    pub servo_ids: Vec<ServoId>,
    pub position_range: PositionRange,
    pub servo_poll_period: Duration,
    pub health_poll_period: Duration,
    pub calibration: CalibrationParams,
    /// `None` keeps the HTTP client's default (no timeout).
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_ip: "http://192.168.1.100".to_string(),
            service_port: "8080".to_string(),
            bot_ip: "192.168.42.1".to_string(),
            servo_ids: (1..=16).map(ServoId).collect(),
            position_range: PositionRange::default(),
            servo_poll_period: Duration::from_secs(1),
            health_poll_period: Duration::from_secs(10),
            calibration: CalibrationParams::default(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn service_url(&self) -> String {
        format!("{}:{}", self.service_ip, self.service_port)
    }
}
