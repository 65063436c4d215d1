//! A single polling cycle over a meter profile.

use crate::{
    codec,
    error::TransportError,
    profile::{Decoding, MeterProfile, RegisterSpec, ENERGY_BLOCK_LEN},
    sink::MeasurementSink,
    transport::RegisterTransport,
};

/// Reads and decodes one measurement.
pub fn read_measurement<T: RegisterTransport + ?Sized>(
    spec: &RegisterSpec,
    transport: &mut T,
) -> Result<f64, TransportError> {
    match spec.decoding {
        Decoding::Scaled { decimals, signed } => {
            transport.read_register(spec.address, decimals, spec.function_code, signed)
        }
        Decoding::Long { signed, divisor } => {
            let raw = transport.read_long(spec.address, spec.function_code, signed)?;
            Ok(codec::scale_long(raw, divisor))
        }
        Decoding::EnergySplit => {
            // The tariff registers following the total are fetched but not used.
            let words =
                transport.read_registers(spec.address, ENERGY_BLOCK_LEN, spec.function_code)?;
            match words.as_slice() {
                [high, low, ..] => Ok(codec::to_kwh(codec::combine32(*high, *low))),
                _ => Err(TransportError::ShortResponse {
                    address: spec.address,
                    expected: ENERGY_BLOCK_LEN,
                    got: words.len(),
                }),
            }
        }
    }
}

/// Reads every register of `profile` in order and hands each value to `sink`.
///
/// Stops at the first failed read; values dispatched before it stay dispatched.
/// Returns the number of measurements dispatched.
pub fn poll<T, S>(
    profile: &MeterProfile,
    transport: &mut T,
    sink: &mut S,
    source_label: &str,
    verbose: bool,
) -> Result<usize, TransportError>
where
    T: RegisterTransport + ?Sized,
    S: MeasurementSink + ?Sized,
{
    let level = if verbose {
        log::Level::Info
    } else {
        log::Level::Debug
    };
    log::log!(level, "[{source_label}] Polling {}", profile.model);

    for (count, spec) in profile.specs.iter().enumerate() {
        let value = read_measurement(spec, transport).map_err(|e| {
            log::log!(level, "[{source_label}] Reading {} failed after {count} values", spec.name);
            e
        })?;
        log::log!(level, "[{source_label}] Sending value: {}={value}", spec.name);
        sink.dispatch_measurement(source_label, spec.name, value, spec.kind);
    }
    Ok(profile.specs.len())
}
