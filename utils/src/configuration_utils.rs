use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// A value that can be read from an environment variable, falling back to a default.
///
/// `parse` never fails; a value that cannot be interpreted is logged and the default is kept.
pub trait ParsableConfigValue: Sized {
    fn parse_user_value(value: &str) -> Option<Self>;

    fn parse(variable_name: &str, value: Option<String>, default: Self) -> Self {
        let Some(raw) = value else {
            return default;
        };

        match Self::parse_user_value(raw.trim()) {
            Some(v) => v,
            None => {
                warn!("Configuration value {variable_name}={raw:?} could not be parsed; using default.");
                default
            },
        }
    }
}

macro_rules! impl_parsable_from_str {
    ($($t:ty),+) => {
        $(
            impl ParsableConfigValue for $t {
                fn parse_user_value(value: &str) -> Option<Self> {
                    value.parse::<$t>().ok()
                }
            }
        )+
    };
}

impl_parsable_from_str!(u16, u32, u64, usize, i64, f64);

impl ParsableConfigValue for String {
    fn parse_user_value(value: &str) -> Option<Self> {
        Some(value.to_owned())
    }
}

impl ParsableConfigValue for bool {
    fn parse_user_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Some(true),
            "0" | "false" | "no" | "n" | "off" => Some(false),
            _ => None,
        }
    }
}

/// Durations accept a bare integer (milliseconds) or a number followed by `ms`, `s`, or `m`.
impl ParsableConfigValue for Duration {
    fn parse_user_value(value: &str) -> Option<Self> {
        let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
        let (number, unit) = value.split_at(split);
        let n: u64 = number.parse().ok()?;

        match unit.trim() {
            "" | "ms" => Some(Duration::from_millis(n)),
            "s" => Some(Duration::from_secs(n)),
            "m" => Some(Duration::from_secs(n.checked_mul(60)?)),
            _ => None,
        }
    }
}

/// Lists are comma separated; empty entries are skipped.
impl<T: FromStr> ParsableConfigValue for Vec<T> {
    fn parse_user_value(value: &str) -> Option<Self> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<T>().ok())
            .collect()
    }
}
