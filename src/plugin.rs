//! Lifecycle entry points driven by the host loop.

use crate::{
    error::{ConfigurationError, PluginError, TransportError},
    meter::{Device, SerialInstrument},
    profile::MeterProfile,
    sink::MeasurementSink,
    transport::{RegisterTransport, TransportConfig},
};

/// The four hooks a metrics host calls, in order: configure, init, poll_once
/// (repeatedly), shutdown.
pub trait Plugin {
    fn configure(&mut self, options: &toml::Table) -> Result<(), ConfigurationError>;
    fn init(&mut self) -> Result<(), PluginError>;
    fn poll_once(&mut self, sink: &mut dyn MeasurementSink) -> Result<usize, PluginError>;
    fn shutdown(&mut self);
}

/// Options accepted by [`Plugin::configure`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub verbose: bool,
    pub device: String,
    pub model: Option<String>,
    pub instance: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: false,
            device: "/dev/ttyUSB0".to_owned(),
            model: None,
            instance: "orno0".to_owned(),
        }
    }
}

impl Config {
    /// Builds a config from the plugin's option table. Unknown keys are only
    /// warned about.
    pub fn from_options(options: &toml::Table) -> Result<Self, ConfigurationError> {
        let mut config = Config::default();
        for (key, value) in options {
            let invalid = |expected| ConfigurationError::InvalidOption {
                key: key.clone(),
                expected,
            };
            match key.as_str() {
                "Verbose" => config.verbose = value.as_bool().ok_or_else(|| invalid("boolean"))?,
                "Device" => config.device = string_option(value).ok_or_else(|| invalid("string"))?,
                "Model" => config.model = Some(string_option(value).ok_or_else(|| invalid("string"))?),
                "Instance" => {
                    config.instance = string_option(value).ok_or_else(|| invalid("string"))?
                }
                _ => log::warn!("orno_modbus plugin: Unknown config key: {key}."),
            }
        }
        Ok(config)
    }
}

fn string_option(value: &toml::Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

type Opener<T> = Box<dyn FnMut(&TransportConfig) -> Result<T, TransportError>>;

pub struct OrnoPlugin<T = SerialInstrument> {
    config: Config,
    device: Option<Device<T>>,
    open_transport: Opener<T>,
}

impl OrnoPlugin {
    pub fn new() -> Self {
        OrnoPlugin::with_opener(Box::new(SerialInstrument::open))
    }
}

impl<T: RegisterTransport> OrnoPlugin<T> {
    pub fn with_opener(open_transport: Opener<T>) -> Self {
        OrnoPlugin {
            config: Config::default(),
            device: None,
            open_transport,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn log_verbose(&self, msg: &str) {
        if self.config.verbose {
            log::info!("orno_modbus plugin [verbose]: {msg}");
        } else {
            log::debug!("orno_modbus plugin: {msg}");
        }
    }
}

impl<T: RegisterTransport> Plugin for OrnoPlugin<T> {
    fn configure(&mut self, options: &toml::Table) -> Result<(), ConfigurationError> {
        self.config = Config::from_options(options)?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), PluginError> {
        self.log_verbose("init callback called");
        if self.device.is_some() {
            return Ok(());
        }

        let model = self.config.model.as_deref().ok_or(ConfigurationError::MissingModel)?;
        let profile = MeterProfile::for_model(model).map_err(|e| {
            log::error!("orno_modbus plugin: Unknown model {model}");
            e
        })?;
        let transport_cfg = TransportConfig {
            verbose: self.config.verbose,
            ..TransportConfig::for_model(profile.model, &self.config.device)
        };
        let transport = (self.open_transport)(&transport_cfg)?;
        log::info!(
            "[{}] Connected to {} on {}",
            self.config.instance,
            profile.model,
            transport_cfg.device_path
        );

        self.device = Some(Device::new(
            profile,
            transport,
            self.config.instance.clone(),
            self.config.verbose,
        ));
        Ok(())
    }

    fn poll_once(&mut self, sink: &mut dyn MeasurementSink) -> Result<usize, PluginError> {
        self.log_verbose("Read callback called");
        let device = self.device.as_mut().ok_or(PluginError::NotOpen)?;
        Ok(device.poll(sink)?)
    }

    fn shutdown(&mut self) {
        self.log_verbose("Shutdown callback called");
        match self.device.take() {
            Some(device) => device.close(),
            None => log::debug!("orno_modbus plugin: nothing to close"),
        }
    }
}
