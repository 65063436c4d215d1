use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Configuration error, Unknown model {0}")]
    UnknownModel(String),
    #[error("Configuration error, no Model configured")]
    MissingModel,
    #[error("Configuration error, option {key} expects a {expected}")]
    InvalidOption { key: String, expected: &'static str },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("Serial I/O failed at register {address}: {source}")]
    Io {
        address: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid Modbus response for register {address}: {detail}")]
    Protocol { address: u16, detail: String },
    #[error("Register {address}: expected {expected} words, got {got}")]
    ShortResponse {
        address: u16,
        expected: u16,
        got: usize,
    },
    #[error("Function code {0} is not supported")]
    UnsupportedFunction(u8),
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Device is not open, init was not called or shutdown already ran")]
    NotOpen,
}
