use serialport::SerialPort;

use crate::error::TransportError;
use crate::poller;
use crate::profile::MeterProfile;
use crate::rtu::RtuInstrument;
use crate::sink::MeasurementSink;
use crate::transport::RegisterTransport;

pub type SerialInstrument = RtuInstrument<Box<dyn SerialPort>>;

/// An Orno meter with its open connection.
pub struct Device<T> {
    profile: MeterProfile,
    transport: T,
    source_label: String,
    verbose: bool,
}

impl<T: RegisterTransport> Device<T> {
    pub fn new(profile: MeterProfile, transport: T, source_label: String, verbose: bool) -> Self {
        Device {
            profile,
            transport,
            source_label,
            verbose,
        }
    }

    pub fn poll(&mut self, sink: &mut dyn MeasurementSink) -> Result<usize, TransportError> {
        poller::poll(
            &self.profile,
            &mut self.transport,
            sink,
            &self.source_label,
            self.verbose,
        )
    }

    /// Releases the connection.
    pub fn close(self) {
        log::debug!("[{}] Closing connection to {}", self.source_label, self.profile.model);
    }
}
