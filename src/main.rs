#![forbid(unsafe_code)]
#![warn(
    clippy::dbg_macro,
    clippy::decimal_literal_representation,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::use_debug
)]

use anyhow::Context;
use plugin::{OrnoPlugin, Plugin};
use rinfluxdb::line_protocol::blocking::Client;
use serde::{Deserialize, Serialize};
use sink::{InfluxSink, LogSink, MeasurementSink};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod codec;
mod error;
mod meter;
mod plugin;
mod poller;
mod profile;
mod rtu;
mod sink;
mod transport;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct MonitoringConfig {
    #[serde(default = "default_monitoring_intervall")]
    intervall_secs: u32,
    #[serde(default)]
    cycles: Option<u64>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        MonitoringConfig {
            intervall_secs: default_monitoring_intervall(),
            cycles: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct InfluxConfig {
    influx_ip: std::net::IpAddr,
    #[serde(default = "default_influx_port")]
    influx_port: u16,
    #[serde(default = "default_database_name")]
    database: String,
    #[serde(default = "default_measurement_name")]
    measurement: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Config {
    #[serde(default)]
    monitoring: MonitoringConfig,
    influx: Option<InfluxConfig>,
    #[serde(default)]
    plugin: toml::Table,
    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_measurement_name() -> String {
    "orno_modbus".to_string()
}
fn default_database_name() -> String {
    "power".to_string()
}
fn default_influx_port() -> u16 {
    8086
}
fn default_monitoring_intervall() -> u32 {
    10
}

fn create_sink(influx: Option<&InfluxConfig>) -> anyhow::Result<Box<dyn MeasurementSink>> {
    let Some(influx) = influx else {
        log::info!("No [influx] section configured, measurements are only logged");
        return Ok(Box::new(LogSink));
    };
    let url = reqwest::Url::parse(&format!("http://{}:{}", influx.influx_ip, influx.influx_port))
        .context("Influxdb ip or port invalid")?;
    let client = Client::new::<String, String>(url, None)
        .map_err(|e| anyhow::anyhow!("Failed to create influxdb client ({e})"))?;
    Ok(Box::new(InfluxSink::new(
        client,
        influx.database.clone(),
        influx.measurement.clone(),
    )))
}

// How often a sleeping loop checks for a termination request.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(100);

fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(SHUTDOWN_CHECK));
    }
}

/// Polls once per interval until `running` is cleared or the configured number
/// of cycles ran, then shuts the plugin down. Failed cycles are logged and
/// retried on the next tick.
fn run_monitoring(
    plugin: &mut dyn Plugin,
    sink: &mut dyn MeasurementSink,
    monitoring_config: &MonitoringConfig,
    running: &AtomicBool,
) {
    let sleep_dur = Duration::from_secs(monitoring_config.intervall_secs.into());
    let mut cycle: u64 = 0;
    while running.load(Ordering::SeqCst) {
        match plugin.poll_once(sink) {
            Ok(count) => log::debug!("Dispatched {count} values"),
            Err(e) => log::error!("Poll cycle failed ({e})"),
        }
        cycle += 1;
        if monitoring_config.cycles.is_some_and(|max| cycle >= max) {
            break;
        }
        sleep_while_running(sleep_dur, running);
    }
    log::info!("Monitoring stopped after {cycle} cycles");
    plugin.shutdown();
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_owned());
    let config_str =
        std::fs::read_to_string(&config_path).context("Failed to read config file.")?;

    let config: Config = toml::from_str(&config_str).context("Failed to parse config file.")?;
    simple_logger::init_with_level(log::Level::from_str(&config.log_level)?)
        .context("Failed to init logging")?;

    let mut sink = create_sink(config.influx.as_ref())?;
    let mut plugin = OrnoPlugin::new();
    plugin
        .configure(&config.plugin)
        .context("Invalid plugin configuration")?;
    plugin.init().context("Failed to initialize meter")?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
        .context("Failed to install signal handler")?;

    log::info!("[{}] Monitoring started", plugin.config().instance);
    run_monitoring(&mut plugin, sink.as_mut(), &config.monitoring, &running);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigurationError, PluginError, TransportError};
    use crate::sink::tests::RecordingSink;

    #[derive(Default)]
    struct CountingPlugin {
        polls: usize,
        shutdowns: usize,
        fail: bool,
        // clears the flag once this many polls ran
        stop_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl Plugin for CountingPlugin {
        fn configure(&mut self, _: &toml::Table) -> Result<(), ConfigurationError> {
            Ok(())
        }

        fn init(&mut self) -> Result<(), PluginError> {
            Ok(())
        }

        fn poll_once(&mut self, _: &mut dyn MeasurementSink) -> Result<usize, PluginError> {
            self.polls += 1;
            if let Some((limit, running)) = &self.stop_after {
                if self.polls >= *limit {
                    running.store(false, Ordering::SeqCst);
                }
            }
            if self.fail {
                return Err(PluginError::Transport(TransportError::UnsupportedFunction(6)));
            }
            Ok(0)
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    fn bounded(cycles: u64) -> MonitoringConfig {
        MonitoringConfig {
            intervall_secs: 0,
            cycles: Some(cycles),
        }
    }

    #[test]
    fn stops_after_configured_cycles() {
        let mut plugin = CountingPlugin::default();
        let running = AtomicBool::new(true);
        run_monitoring(&mut plugin, &mut RecordingSink::default(), &bounded(3), &running);
        assert_eq!(plugin.polls, 3);
        assert_eq!(plugin.shutdowns, 1);
    }

    #[test]
    fn termination_request_ends_unbounded_loop() {
        let running = Arc::new(AtomicBool::new(true));
        let mut plugin = CountingPlugin {
            stop_after: Some((2, Arc::clone(&running))),
            ..Default::default()
        };
        let unbounded = MonitoringConfig {
            intervall_secs: 0,
            cycles: None,
        };
        run_monitoring(&mut plugin, &mut RecordingSink::default(), &unbounded, &running);
        assert_eq!(plugin.polls, 2);
        assert_eq!(plugin.shutdowns, 1);
    }

    #[test]
    fn stopped_before_first_cycle_still_shuts_down() {
        let mut plugin = CountingPlugin::default();
        let running = AtomicBool::new(false);
        run_monitoring(&mut plugin, &mut RecordingSink::default(), &bounded(5), &running);
        assert_eq!(plugin.polls, 0);
        assert_eq!(plugin.shutdowns, 1);
    }

    #[test]
    fn sleep_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        let started = Instant::now();
        sleep_while_running(Duration::from_secs(30), &running);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn failed_cycles_do_not_stop_monitoring() {
        let mut plugin = CountingPlugin {
            fail: true,
            ..Default::default()
        };
        let running = AtomicBool::new(true);
        run_monitoring(&mut plugin, &mut RecordingSink::default(), &bounded(2), &running);
        assert_eq!(plugin.polls, 2);
        assert_eq!(plugin.shutdowns, 1);
    }

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            log_level = "debug"

            [monitoring]
            intervall_secs = 30

            [influx]
            influx_ip = "192.168.1.10"

            [plugin]
            Model = "WE-514"
            Device = "/dev/ttyUSB1"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.monitoring.intervall_secs, 30);
        assert_eq!(config.monitoring.cycles, None);
        let influx = config.influx.unwrap();
        assert_eq!(influx.influx_port, 8086);
        assert_eq!(influx.database, "power");
        assert_eq!(influx.measurement, "orno_modbus");
        assert_eq!(config.plugin["Model"].as_str(), Some("WE-514"));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str("[plugin]\nModel = \"WE-525\"").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.monitoring.intervall_secs, 10);
        assert!(config.influx.is_none());
        assert!(create_sink(config.influx.as_ref()).is_ok());
    }
}
