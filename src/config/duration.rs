// ABOUTME: Duration grammar for wait values and readiness markers.
// ABOUTME: `<number>[ms|s|m|h|d]`; a bare number counts milliseconds.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration \"{0}\"")]
pub struct InvalidDuration(pub String);

/// Parse a duration such as `2000`, `2s`, `1.5m` or `1 h`.
pub fn parse_duration(input: &str) -> Result<Duration, InvalidDuration> {
    let s = input.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| InvalidDuration(input.to_string()))?;

    let millis_per_unit = match unit.trim() {
        "" | "ms" => 1.0,
        "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        "d" => 86_400_000.0,
        _ => return Err(InvalidDuration(input.to_string())),
    };

    let millis = value * millis_per_unit;
    if !millis.is_finite() || millis < 0.0 {
        return Err(InvalidDuration(input.to_string()));
    }
    Ok(Duration::from_micros((millis * 1_000.0).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bare_number_is_milliseconds() {
        assert_eq!(parse_duration("2000").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn units() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration(" 3 s ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5 weeks").is_err());
        assert!(parse_duration("1.2.3s").is_err());
    }

    proptest! {
        #[test]
        fn whole_seconds_round_trip(n in 0u64..1_000_000) {
            prop_assert_eq!(parse_duration(&format!("{}s", n)).unwrap(), Duration::from_secs(n));
        }
    }
}
