use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use crate::{error::TransportError, profile::MeterModel};

/// Modbus address of the meter, the factory default.
pub const SLAVE_ID: u8 = 1;

/// Register level access to a Modbus device.
pub trait RegisterTransport {
    /// Reads one word and divides it by `10^decimals`.
    fn read_register(
        &mut self,
        address: u16,
        decimals: u8,
        function_code: u8,
        signed: bool,
    ) -> Result<f64, TransportError>;

    /// Reads `count` consecutive words.
    fn read_registers(
        &mut self,
        address: u16,
        count: u16,
        function_code: u8,
    ) -> Result<Vec<u16>, TransportError>;

    /// Reads a 32 bit integer spread over two words, high word first.
    fn read_long(
        &mut self,
        address: u16,
        function_code: u8,
        signed: bool,
    ) -> Result<i64, TransportError>;
}

/// Serial line settings of a meter.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub device_path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub timeout: Duration,
    pub slave_id: u8,
    /// Log raw request and response frames at info level.
    pub verbose: bool,
}

impl TransportConfig {
    // Factory settings: WE-514 is 9600 8E1, WE-525 is 9600 8N1.
    pub fn for_model(model: MeterModel, device_path: &str) -> Self {
        TransportConfig {
            device_path: device_path.to_owned(),
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: parity(model),
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(200),
            slave_id: SLAVE_ID,
            verbose: false,
        }
    }
}

pub fn parity(model: MeterModel) -> Parity {
    match model {
        MeterModel::We514 => Parity::Even,
        MeterModel::We525 => Parity::None,
    }
}
