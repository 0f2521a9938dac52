//! Acceptance policy for decoded sensor readings.
//!
//! Measurements arrive as separate integer and hundredths bytes. Values that
//! are not physically plausible are reclassified as device errors so that
//! every packet still yields exactly one [`Reading`].

use crate::message::Reading;

/// A measurement split into an integer part and a fractional part in hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    pub integer: i16,
    pub fraction: u8,
}

impl FixedPoint {
    pub fn new(integer: impl Into<i16>, fraction: u8) -> Self {
        Self {
            integer: integer.into(),
            fraction,
        }
    }

    /// Combine both parts as `integer + fraction * 0.01`.
    ///
    /// The fractional part is added even for negative integer parts, so
    /// `(-5, 50)` yields `-4.5`. Sensor nodes encode sub-zero readings this way.
    pub fn value(self) -> f64 {
        f64::from(self.integer) + f64::from(self.fraction) * 0.01
    }
}

/// Device-reported fault codes carried by error packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    TemperatureFailure,
    HumidityFailure,
    LowPower,
    Other,
    Unknown(u8),
}

impl From<u8> for ErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0xFC => ErrorCode::TemperatureFailure,
            0xFD => ErrorCode::HumidityFailure,
            0xFE => ErrorCode::LowPower,
            0xFF => ErrorCode::Other,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl ErrorCode {
    /// Human-readable cause published in the `error` field.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::TemperatureFailure => "Temperature measurement error",
            ErrorCode::HumidityFailure => "Humidity measurement error",
            ErrorCode::LowPower => "Low power",
            ErrorCode::Other => "Other error",
            ErrorCode::Unknown(_) => "Unknown error",
        }
    }
}

/// Map a raw error code to its cause. Defined for every `u8`.
pub fn describe_error_code(code: u8) -> &'static str {
    ErrorCode::from(code).description()
}

/// Validate a temperature reading.
///
/// Only the fractional part is range checked: negative integer parts and a
/// zero fraction are legitimate readings.
pub fn classify_temperature(integer: i8, fraction: u8) -> Reading {
    if fraction >= 100 {
        return Reading::Error(format!(
            "Temperature value ({integer}, {fraction}) is invalid"
        ));
    }

    Reading::Temperature(FixedPoint::new(integer, fraction).value())
}

/// Validate a relative humidity reading.
///
/// Zero in either part is treated as a sensor fault, as is anything at or
/// above 100 in either part.
pub fn classify_humidity(integer: u8, fraction: u8) -> Reading {
    let plausible = (1..100).contains(&integer) && (1..100).contains(&fraction);
    if !plausible {
        return Reading::Error(format!(
            "Humidity value ({integer}, {fraction}) is invalid"
        ));
    }

    Reading::Humidity(FixedPoint::new(integer, fraction).value())
}
