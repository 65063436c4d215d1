//! Conversions from raw Modbus words to physical units.

/// Interprets a single register word, optionally as two's complement.
pub(crate) fn register_value(word: u16, signed: bool) -> i64 {
    if signed {
        i64::from(word as i16)
    } else {
        i64::from(word)
    }
}

/// Interprets two big-endian words (high word first) as a 32 bit integer.
pub(crate) fn long_value(high: u16, low: u16, signed: bool) -> i64 {
    let bits = combine32(high, low);
    if signed {
        i64::from(bits as i32)
    } else {
        i64::from(bits)
    }
}

pub(crate) fn scale_register(raw: i64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(i32::from(decimals))
}

/// Joins the two halves of a split 32 bit counter. The result is always unsigned,
/// even when the high word has its top bit set.
pub(crate) fn combine32(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// Energy counters are transmitted in hundredths of a kWh (or kVarh).
pub(crate) fn to_kwh(raw: u32) -> f64 {
    f64::from(raw) / 100.0
}

pub(crate) fn scale_long(raw: i64, divisor: f64) -> f64 {
    raw as f64 / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine32_concatenates_words() {
        assert_eq!(combine32(0, 130), 130);
        assert_eq!(combine32(1, 0), 65536);
        assert_eq!(combine32(0x1234, 0xabcd), 0x1234_abcd);
        assert_eq!(combine32(0xffff, 0xffff), u32::MAX);
        assert_eq!(combine32(0x8000, 0x0000), 0x8000_0000);
    }

    #[test]
    fn energy_matches_plain_division() {
        let pairs = [
            (0u16, 0u16),
            (0, 130),
            (0, 0xffff),
            (1, 0),
            (0x7fff, 0xffff),
            (0x8000, 1),
            (0xffff, 0xffff),
            (0x00a1, 0x2b3c),
        ];
        for (high, low) in pairs {
            let expected = (((high as u64) << 16) | low as u64) as f64 / 100.0;
            assert_eq!(to_kwh(combine32(high, low)), expected, "{high:#x} {low:#x}");
        }
    }

    #[test]
    fn documented_energy_block() {
        let registers = [0u16, 130, 0, 130, 0, 0, 0, 0, 0, 0];
        assert_eq!(to_kwh(combine32(registers[0], registers[1])), 1.30);
    }

    #[test]
    fn scale_long_divides() {
        for raw in [0i64, 1, 230_512, -1, -4_200, i64::from(i32::MIN), i64::from(u32::MAX)] {
            assert_eq!(scale_long(raw, 1000.0), raw as f64 / 1000.0);
        }
        assert_eq!(scale_long(12_345, 100.0), 123.45);
        assert_eq!(scale_long(42, 1.0), 42.0);
    }

    #[test]
    fn scale_register_applies_decimals() {
        assert_eq!(scale_register(5002, 2), 50.02);
        assert_eq!(scale_register(500, 1), 50.0);
        assert_eq!(scale_register(-998, 3), -0.998);
        assert_eq!(scale_register(7, 0), 7.0);
    }

    #[test]
    fn words_honour_sign_flag() {
        assert_eq!(register_value(0xffff, true), -1);
        assert_eq!(register_value(0xffff, false), 65535);
        assert_eq!(register_value(0x7fff, true), 32767);

        assert_eq!(long_value(0xffff, 0xfffe, true), -2);
        assert_eq!(long_value(0xffff, 0xfffe, false), 4_294_967_294);
        assert_eq!(long_value(0x0003, 0x8470, false), 230_512);
    }
}
