use rinfluxdb::line_protocol::blocking::Client;
use rinfluxdb::line_protocol::LineBuilder;

use crate::profile::MeasurementKind;

/// Destination of decoded measurements.
pub trait MeasurementSink {
    fn dispatch_measurement(
        &mut self,
        source_label: &str,
        name: &str,
        value: f64,
        kind: MeasurementKind,
    );
}

/// Writes every measurement as one InfluxDB line.
pub struct InfluxSink {
    client: Client,
    database: String,
    measurement: String,
}

impl InfluxSink {
    pub fn new(client: Client, database: String, measurement: String) -> Self {
        InfluxSink {
            client,
            database,
            measurement,
        }
    }
}

impl MeasurementSink for InfluxSink {
    fn dispatch_measurement(
        &mut self,
        source_label: &str,
        name: &str,
        value: f64,
        kind: MeasurementKind,
    ) {
        let lines = vec![LineBuilder::new(self.measurement.clone())
            .insert_field("value", value)
            .insert_tag("instance", source_label.to_owned())
            .insert_tag("type", kind.as_str())
            .insert_tag("type_instance", name.to_owned())
            .set_timestamp(chrono::Utc::now())
            .build()];

        if let Err(e) = self.client.send(&self.database, &lines) {
            log::error!("[{source_label}] Failed to store {name} in database ({e})");
        }
    }
}

/// Logs measurements instead of storing them.
pub struct LogSink;

impl MeasurementSink for LogSink {
    fn dispatch_measurement(
        &mut self,
        source_label: &str,
        name: &str,
        value: f64,
        kind: MeasurementKind,
    ) {
        log::info!("[{source_label}] {kind}/{name} = {value}");
    }
}
