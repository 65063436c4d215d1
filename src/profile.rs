//! Register maps of the supported Orno meters.
//!
//! Each model exposes the same set of electrical quantities at different
//! addresses and in different encodings. The maps below list them in the order
//! they are polled.

use std::{fmt, str::FromStr};

use crate::error::ConfigurationError;

/// Holding registers, the only function the Orno meters answer.
pub const READ_HOLDING: u8 = 3;

/// Words fetched for a split energy counter: total followed by tariffs T1..T4.
pub const ENERGY_BLOCK_LEN: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterModel {
    We514,
    We525,
}

impl MeterModel {
    pub fn profile(self) -> MeterProfile {
        let specs: &'static [RegisterSpec] = match self {
            MeterModel::We514 => &WE514,
            MeterModel::We525 => &WE525,
        };
        MeterProfile { model: self, specs }
    }
}

impl FromStr for MeterModel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WE-514" => Ok(MeterModel::We514),
            "WE-525" => Ok(MeterModel::We525),
            other => Err(ConfigurationError::UnknownModel(other.to_owned())),
        }
    }
}

impl fmt::Display for MeterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterModel::We514 => f.write_str("WE-514"),
            MeterModel::We525 => f.write_str("WE-525"),
        }
    }
}

/// Type tag attached to each value, named after the collectd types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    Frequency,
    Voltage,
    Current,
    Power,
    Gauge,
    Energy,
}

impl MeasurementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementKind::Frequency => "frequency",
            MeasurementKind::Voltage => "voltage",
            MeasurementKind::Current => "current",
            MeasurementKind::Power => "power",
            MeasurementKind::Gauge => "gauge",
            MeasurementKind::Energy => "energy",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoding {
    /// One word divided by `10^decimals`.
    Scaled { decimals: u8, signed: bool },
    /// Two words read as a 32 bit integer, divided by `divisor`.
    Long { signed: bool, divisor: f64 },
    /// A block of [`ENERGY_BLOCK_LEN`] words whose first two hold the total in
    /// hundredths of a kWh.
    EnergySplit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterSpec {
    pub name: &'static str,
    pub kind: MeasurementKind,
    pub address: u16,
    pub function_code: u8,
    pub decoding: Decoding,
}

impl RegisterSpec {
    const fn scaled(
        name: &'static str,
        kind: MeasurementKind,
        address: u16,
        decimals: u8,
        signed: bool,
    ) -> Self {
        RegisterSpec {
            name,
            kind,
            address,
            function_code: READ_HOLDING,
            decoding: Decoding::Scaled { decimals, signed },
        }
    }

    const fn long(
        name: &'static str,
        kind: MeasurementKind,
        address: u16,
        signed: bool,
        divisor: f64,
    ) -> Self {
        RegisterSpec {
            name,
            kind,
            address,
            function_code: READ_HOLDING,
            decoding: Decoding::Long { signed, divisor },
        }
    }

    const fn energy_split(name: &'static str, address: u16) -> Self {
        RegisterSpec {
            name,
            kind: MeasurementKind::Energy,
            address,
            function_code: READ_HOLDING,
            decoding: Decoding::EnergySplit,
        }
    }

    pub fn word_count(&self) -> u16 {
        match self.decoding {
            Decoding::Scaled { .. } => 1,
            Decoding::Long { .. } => 2,
            Decoding::EnergySplit => ENERGY_BLOCK_LEN,
        }
    }
}

use MeasurementKind::*;

static WE514: [RegisterSpec; 9] = [
    RegisterSpec::scaled("frequency", Frequency, 304, 2, true),
    RegisterSpec::scaled("voltage", Voltage, 305, 2, true),
    RegisterSpec::long("current", Current, 313, false, 1000.0),
    RegisterSpec::long("active_power", Power, 320, false, 1.0),
    RegisterSpec::long("reactive_power", Power, 328, false, 1.0),
    RegisterSpec::long("apparent_power", Power, 336, false, 1.0),
    RegisterSpec::scaled("power_factor", Gauge, 344, 3, true),
    RegisterSpec::energy_split("active_energy", 40960),
    RegisterSpec::energy_split("reactive_energy", 40990),
];

static WE525: [RegisterSpec; 11] = [
    RegisterSpec::scaled("frequency", Frequency, 266, 1, false),
    RegisterSpec::long("voltage", Voltage, 256, false, 1000.0),
    RegisterSpec::long("current", Current, 258, true, 1000.0),
    RegisterSpec::long("active_power", Power, 260, false, 1.0),
    RegisterSpec::long("reactive_power", Power, 264, true, 1.0),
    RegisterSpec::long("apparent_power", Power, 262, true, 1.0),
    RegisterSpec::scaled("power_factor", Gauge, 267, 3, true),
    RegisterSpec::long("active_energy", Energy, 270, false, 100.0),
    RegisterSpec::long("reactive_energy", Energy, 304, false, 100.0),
    RegisterSpec::long("reverse_active_energy", Energy, 280, false, 100.0),
    RegisterSpec::long("reverse_reactive_energy", Energy, 310, false, 100.0),
];

#[derive(Debug, Clone, Copy)]
pub struct MeterProfile {
    pub model: MeterModel,
    pub specs: &'static [RegisterSpec],
}

impl MeterProfile {
    pub fn for_model(name: &str) -> Result<Self, ConfigurationError> {
        Ok(name.parse::<MeterModel>()?.profile())
    }
}
