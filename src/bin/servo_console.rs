use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use servo_dashboard::{
    ClientConfig, Dashboard, HttpServoApi, PollerRegistry, Selection, ServoId,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "servo-console", version, about = "Monitor and command an HTTP servo controller")]
struct Cli {
    /// Scheme and host of the servo service
    #[arg(long, default_value = "http://192.168.1.100")]
    service_ip: String,

    #[arg(long, default_value = "8080")]
    service_port: String,

    /// Address of the robot, forwarded to the service as `ip=`
    #[arg(long, default_value = "192.168.42.1")]
    bot_ip: String,

    /// Per-servo telemetry period in milliseconds
    #[arg(long, default_value = "1000", value_name = "MS")]
    servo_period_ms: u64,

    /// System check period in milliseconds
    #[arg(long, default_value = "10000", value_name = "MS")]
    health_period_ms: u64,

    /// Request timeout in milliseconds (none by default)
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll system checks and, optionally, one servo until Ctrl-C
    Monitor {
        #[arg(long)]
        servo: Option<u8>,
        /// How often to log the current state, in milliseconds
        #[arg(long, default_value = "2000", value_name = "MS")]
        report_ms: u64,
    },
    /// Move a servo to an angle in degrees
    SetPosition { servo: u8, position: f64 },
    /// Start (or with --cancel, stop) calibration of a servo
    Calibrate {
        servo: u8,
        #[arg(long)]
        cancel: bool,
    },
    /// Re-address a servo
    ChangeId { old_id: String, new_id: String },
}

impl Cli {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            service_ip: self.service_ip.clone(),
            service_port: self.service_port.clone(),
            bot_ip: self.bot_ip.clone(),
            servo_poll_period: Duration::from_millis(self.servo_period_ms),
            health_poll_period: Duration::from_millis(self.health_period_ms),
            request_timeout: self.timeout_ms.map(Duration::from_millis),
            ..ClientConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = cli.config();
    let api = HttpServoApi::new(&cfg).context("building http client")?;
    let dashboard = Dashboard::mount(api, &cfg, PollerRegistry::current());

    match cli.command.unwrap_or(Command::Monitor { servo: None, report_ms: 2000 }) {
        Command::Monitor { servo, report_ms } => {
            if let Some(id) = servo {
                dashboard.selection.select(ServoId(id));
            }
            monitor(&dashboard, Duration::from_millis(report_ms)).await?;
        }
        Command::SetPosition { servo, position } => {
            let id = ServoId(servo);
            dashboard.selection.select(id);
            dashboard.commands.set_position(id, position).await?;
            info!(servo = %id, position, "done");
        }
        Command::Calibrate { servo, cancel } => {
            let id = ServoId(servo);
            if cancel {
                // A fresh process has no local record of a run in progress.
                dashboard.store.set_calibrating(id, true);
                dashboard.commands.cancel_calibration(id).await?;
            } else {
                dashboard.commands.start_calibration(id).await?;
            }
            info!(status = %dashboard.commands.calibration_status().await.unwrap_or_default(), "calibration");
        }
        Command::ChangeId { old_id, new_id } => {
            let message = dashboard.commands.change_servo_id(&old_id, &new_id).await?;
            info!("{message}");
        }
    }

    dashboard.close();
    Ok(())
}

async fn monitor<A: servo_dashboard::ServoApi>(
    dashboard: &Dashboard<A>,
    every: Duration,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => report(dashboard),
            res = tokio::signal::ctrl_c() => {
                res.context("waiting for ctrl-c")?;
                return Ok(());
            }
        }
    }
}

fn report<A: servo_dashboard::ServoApi>(dashboard: &Dashboard<A>) {
    for result in dashboard.health.results() {
        let state = if result.active { "active" } else { "paused" };
        info!(check = result.check.label(), state, "{}", result.text());
    }
    if let Selection::Selected(id) = dashboard.selection.current() {
        if let Some(servo) = dashboard.store.get(id) {
            let t = servo.telemetry;
            info!(
                servo = %id,
                position = servo.position,
                temperature = ?t.temperature,
                current = ?t.current,
                voltage = ?t.voltage,
                speed = ?t.speed,
                calibrating = servo.calibrating,
                "servo state"
            );
        }
    }
    if let Some(error) = dashboard.store.error() {
        warn!("{error}");
    }
}
