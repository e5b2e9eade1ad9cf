use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    config::ClientConfig,
    error::ControlError,
    model::{CalibrationParams, ImuReading, PingReport, ServoId, ServoInfo, ServoPosition},
    transport::ServoApi,
};

#[derive(Deserialize)]
struct ScanReply {
    servo_ids: Vec<ServoId>,
}

#[derive(Deserialize)]
struct PositionsReply {
    data: Vec<ServoPosition>,
}

#[derive(Deserialize)]
struct InfoReply {
    info: ServoInfo,
}

#[derive(Deserialize)]
struct MessageReply {
    #[serde(default)]
    message: Option<String>,
}

/// [`ServoApi`] over HTTP/JSON.
pub struct HttpServoApi {
    client: Client,
    base: String,
    bot_ip: String,
}

impl HttpServoApi {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ControlError> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ControlError::Transport(e.to_string()))?;
        Ok(Self { client, base: cfg.service_url(), bot_ip: cfg.bot_ip.clone() })
    }

    /// Builds `{base}/{path}?ip={bot_ip}&{params}` as a single query string.
    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ControlError> {
        let mut url = Url::parse(&self.base)
            .and_then(|base| base.join(path))
            .map_err(|e| ControlError::Transport(format!("bad service url `{}`: {e}", self.base)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ip", &self.bot_ip);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, ControlError> {
        debug!(%method, %url, "servo api request");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.map_err(|e| ControlError::Transport(e.to_string()))?;
        let code = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| ControlError::Transport(e.to_string()))?;
        decode_reply(code, &text)
    }
}

/// Accepts a reply only when it is 2xx and carries `status: "success"`.
fn decode_reply<T: DeserializeOwned>(code: u16, body: &str) -> Result<T, ControlError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if !(200..300).contains(&code) => {
            return Err(ControlError::Transport(format!("HTTP {code}")));
        }
        Err(e) => return Err(ControlError::Transport(format!("undecodable reply: {e}"))),
    };

    let status = value.get("status").and_then(Value::as_str).unwrap_or_default();
    if status != "success" {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("HTTP {code}"));
        return Err(ControlError::Application { status: status.to_owned(), message });
    }
    if !(200..300).contains(&code) {
        return Err(ControlError::Transport(format!("HTTP {code}")));
    }

    serde_json::from_value(value).map_err(|e| ControlError::Transport(format!("undecodable reply: {e}")))
}

#[async_trait]
impl ServoApi for HttpServoApi {
    async fn ping(&self) -> Result<PingReport, ControlError> {
        let url = self.endpoint("ping", &[])?;
        self.call(Method::GET, url, None).await
    }

    async fn scan_servos(&self) -> Result<Vec<ServoId>, ControlError> {
        let url = self.endpoint("scan_servos", &[])?;
        let reply: ScanReply = self.call(Method::GET, url, None).await?;
        Ok(reply.servo_ids)
    }

    async fn get_positions(&self) -> Result<Vec<ServoPosition>, ControlError> {
        let url = self.endpoint("get_positions", &[])?;
        let reply: PositionsReply = self.call(Method::GET, url, None).await?;
        Ok(reply.data)
    }

    async fn get_imu_data(&self) -> Result<ImuReading, ControlError> {
        let url = self.endpoint("get_imu_data", &[])?;
        self.call(Method::GET, url, None).await
    }

    async fn get_servo_info(&self, id: ServoId) -> Result<ServoInfo, ControlError> {
        let url = self.endpoint("get_servo_info", &[("servo_id", id.to_string())])?;
        let reply: InfoReply = self.call(Method::GET, url, None).await?;
        Ok(reply.info)
    }

    async fn set_servo_position(&self, id: ServoId, position: f64) -> Result<(), ControlError> {
        let url = self.endpoint("set_servo_position", &[("id", id.to_string())])?;
        let _: MessageReply = self.call(Method::POST, url, Some(json!({ "position": position }))).await?;
        Ok(())
    }

    async fn start_calibration(
        &self,
        id: ServoId,
        params: CalibrationParams,
    ) -> Result<(), ControlError> {
        let url = self.endpoint(
            "start_calibration",
            &[
                ("servo_id", id.to_string()),
                ("speed", params.speed.to_string()),
                ("current", params.current_threshold.to_string()),
            ],
        )?;
        let _: MessageReply = self.call(Method::POST, url, None).await?;
        Ok(())
    }

    async fn cancel_calibration(&self, id: ServoId) -> Result<(), ControlError> {
        let url = self.endpoint("cancel_calibration", &[("servo_id", id.to_string())])?;
        let _: MessageReply = self.call(Method::POST, url, None).await?;
        Ok(())
    }

    async fn change_servo_id(
        &self,
        old_id: ServoId,
        new_id: ServoId,
    ) -> Result<Option<String>, ControlError> {
        let url = self.endpoint(
            "change_servo_id",
            &[("old_id", old_id.to_string()), ("new_id", new_id.to_string())],
        )?;
        let reply: MessageReply = self.call(Method::POST, url, None).await?;
        Ok(reply.message)
    }

    async fn calibration_status(&self) -> Result<String, ControlError> {
        let url = self.endpoint("get_calibration_status", &[])?;
        let reply: MessageReply = self.call(Method::GET, url, None).await?;
        Ok(reply.message.unwrap_or_default())
    }

    async fn set_torque_enable(&self, settings: &[(ServoId, bool)]) -> Result<(), ControlError> {
        let url = self.endpoint("set_torque_enable", &[])?;
        // The service expects `[[id, "true"|"false"], ...]`.
        let settings: Vec<Value> =
            settings.iter().map(|(id, on)| json!([id.0, on.to_string()])).collect();
        let body = json!({ "settings": settings, "ip": self.bot_ip });
        let _: MessageReply = self.call(Method::POST, url, Some(body)).await?;
        Ok(())
    }

    async fn set_torque(&self, settings: &[(ServoId, f64)]) -> Result<(), ControlError> {
        let url = self.endpoint("set_torque", &[])?;
        let body = json!({ "settings": torque_settings(settings), "ip": self.bot_ip });
        let _: MessageReply = self.call(Method::POST, url, Some(body)).await?;
        Ok(())
    }

    async fn set_movement_enabled(&self, enabled: bool) -> Result<(), ControlError> {
        let path = if enabled { "enable_movement" } else { "disable_movement" };
        let url = self.endpoint(path, &[])?;
        let body = json!({ "ip": self.bot_ip });
        let _: MessageReply = self.call(Method::POST, url, Some(body)).await?;
        Ok(())
    }
}

fn torque_settings(settings: &[(ServoId, f64)]) -> Vec<Value> {
    settings.iter().map(|(id, torque)| json!([id.0, torque])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> HttpServoApi {
        HttpServoApi::new(&ClientConfig::default()).unwrap()
    }

    #[test]
    fn set_position_url_has_one_query_string() {
        let url = api().endpoint("set_servo_position", &[("id", "3".into())]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://192.168.1.100:8080/set_servo_position?ip=192.168.42.1&id=3"
        );
    }

    #[test]
    fn torque_settings_are_id_value_pairs() {
        let body = torque_settings(&[(ServoId(1), 0.5), (ServoId(12), 1.0)]);
        assert_eq!(serde_json::to_string(&body).unwrap(), "[[1,0.5],[12,1.0]]");
    }

    #[test]
    fn malformed_base_is_a_transport_error() {
        let cfg = ClientConfig { service_ip: "not a host".into(), ..ClientConfig::default() };
        let api = HttpServoApi::new(&cfg).unwrap();
        assert!(matches!(api.endpoint("ping", &[]), Err(ControlError::Transport(_))));
    }

    #[test]
    fn decode_accepts_success_payload() {
        let body = r#"{"status":"success","servo_ids":[1,2,3]}"#;
        let reply: ScanReply = decode_reply(200, body).unwrap();
        assert_eq!(reply.servo_ids, vec![ServoId(1), ServoId(2), ServoId(3)]);
    }

    #[test]
    fn decode_maps_non_success_status_to_application_error() {
        let body = r#"{"status":"failure","message":"Failed to ping 10.0.0.1"}"#;
        match decode_reply::<PingReport>(400, body) {
            Err(ControlError::Application { status, message }) => {
                assert_eq!(status, "failure");
                assert_eq!(message, "Failed to ping 10.0.0.1");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_success_status_on_error_code() {
        let body = r#"{"status":"success"}"#;
        assert!(matches!(decode_reply::<MessageReply>(500, body), Err(ControlError::Transport(_))));
    }

    #[test]
    fn decode_maps_garbage_to_transport_error() {
        assert!(matches!(decode_reply::<MessageReply>(502, "<html>"), Err(ControlError::Transport(_))));
        assert!(matches!(decode_reply::<MessageReply>(200, "nope"), Err(ControlError::Transport(_))));
    }

    #[test]
    fn decode_reads_servo_info() {
        let body = r#"{"status":"success","servo_id":3,"info":{"current_position":90.0,"temperature":31.0,"current":0.2,"voltage":7.4,"speed":0.0}}"#;
        let reply: InfoReply = decode_reply(200, body).unwrap();
        assert_eq!(reply.info.current_position, Some(90.0));
        assert_eq!(reply.info.temperature, Some(31.0));
    }
}
