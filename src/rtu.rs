use std::io::{self, Read, Write};

use rmodbus::{client::ModbusRequest, guess_response_frame_len, ModbusProto};
use serialport::{ClearBuffer, Parity, SerialPort};

use crate::{
    codec,
    error::TransportError,
    transport::{RegisterTransport, TransportConfig},
};

const READ_HOLDING: u8 = 3;
const READ_INPUT: u8 = 4;

// slave id, function code, byte count (or exception code)
const FRAME_HEAD_LEN: usize = 3;

/// A byte stream whose unread input can be dropped.
pub trait LinePort: Read + Write {
    fn discard_input(&mut self) -> io::Result<()>;
}

impl LinePort for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// A Modbus RTU master talking to one slave over a serial line.
pub struct RtuInstrument<P> {
    port: P,
    slave_id: u8,
    verbose: bool,
}

impl RtuInstrument<Box<dyn SerialPort>> {
    pub fn open(config: &TransportConfig) -> Result<Self, TransportError> {
        let port = serialport::new(config.device_path.as_str(), config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .timeout(config.timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: config.device_path.clone(),
                source,
            })?;
        log::debug!(
            "Opened {} at {} baud, parity {}",
            config.device_path,
            config.baud_rate,
            parity_name(config.parity)
        );
        Ok(RtuInstrument::new(port, config.slave_id).verbose(config.verbose))
    }
}

fn parity_name(parity: Parity) -> &'static str {
    match parity {
        Parity::None => "none",
        Parity::Odd => "odd",
        Parity::Even => "even",
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Checks that a reply carried at least the requested number of words.
fn expect_words(address: u16, count: u16, mut words: Vec<u16>) -> Result<Vec<u16>, TransportError> {
    if words.len() < usize::from(count) {
        return Err(TransportError::ShortResponse {
            address,
            expected: count,
            got: words.len(),
        });
    }
    words.truncate(usize::from(count));
    Ok(words)
}

impl<P: LinePort> RtuInstrument<P> {
    pub fn new(port: P, slave_id: u8) -> Self {
        RtuInstrument {
            port,
            slave_id,
            verbose: false,
        }
    }

    /// Logs raw frames at info instead of debug.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn frame_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }

    fn read_words(
        &mut self,
        address: u16,
        count: u16,
        function_code: u8,
    ) -> Result<Vec<u16>, TransportError> {
        let protocol_error = |detail: String| TransportError::Protocol { address, detail };

        let mut request = ModbusRequest::new(self.slave_id, ModbusProto::Rtu);
        let mut frame = Vec::new();
        let generated = match function_code {
            READ_HOLDING => request.generate_get_holdings(address, count, &mut frame),
            READ_INPUT => request.generate_get_inputs(address, count, &mut frame),
            other => return Err(TransportError::UnsupportedFunction(other)),
        };
        generated.map_err(|e| protocol_error(format!("failed to build request: {e}")))?;

        let io_error = |source| TransportError::Io { address, source };
        // A reply that arrived after the previous timeout must not be taken for this one.
        self.port.discard_input().map_err(io_error)?;

        log::log!(self.frame_level(), "Sending request: {}", hex(&frame));
        self.port.write_all(&frame).map_err(io_error)?;
        self.port.flush().map_err(io_error)?;

        let mut response = vec![0; FRAME_HEAD_LEN];
        self.port.read_exact(&mut response).map_err(io_error)?;
        let len = guess_response_frame_len(&response, ModbusProto::Rtu)
            .map_err(|e| protocol_error(format!("unexpected frame head: {e}")))?;
        let len = len as usize;
        if len > FRAME_HEAD_LEN {
            response.resize(len, 0);
            self.port
                .read_exact(&mut response[FRAME_HEAD_LEN..])
                .map_err(io_error)?;
        }
        log::log!(self.frame_level(), "Received response: {}", hex(&response));

        let mut words = Vec::new();
        request
            .parse_u16(&response, &mut words)
            .map_err(|e| protocol_error(e.to_string()))?;
        expect_words(address, count, words)
    }
}

impl<P: LinePort> RegisterTransport for RtuInstrument<P> {
    fn read_register(
        &mut self,
        address: u16,
        decimals: u8,
        function_code: u8,
        signed: bool,
    ) -> Result<f64, TransportError> {
        let words = self.read_words(address, 1, function_code)?;
        let raw = codec::register_value(words[0], signed);
        Ok(codec::scale_register(raw, decimals))
    }

    fn read_registers(
        &mut self,
        address: u16,
        count: u16,
        function_code: u8,
    ) -> Result<Vec<u16>, TransportError> {
        self.read_words(address, count, function_code)
    }

    fn read_long(
        &mut self,
        address: u16,
        function_code: u8,
        signed: bool,
    ) -> Result<i64, TransportError> {
        let words = self.read_words(address, 2, function_code)?;
        Ok(codec::long_value(words[0], words[1], signed))
    }
}
