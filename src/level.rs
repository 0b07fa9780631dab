//! The normalized brightness value shared between the controller and the UI.

use std::{fmt, str::FromStr};
use thiserror::Error;

/// Backlight intensity relative to the device's maximum, always within
/// `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct BrightnessLevel(f64);

impl BrightnessLevel {
    pub const OFF: BrightnessLevel = BrightnessLevel(0.0);
    pub const FULL: BrightnessLevel = BrightnessLevel(1.0);

    /// Clamps `fraction` into range. NaN is treated as off.
    pub fn new(fraction: f64) -> BrightnessLevel {
        if fraction.is_nan() {
            Self::OFF
        } else {
            BrightnessLevel(fraction.clamp(0.0, 1.0))
        }
    }

    /// Converts a raw device reading. A device reporting a maximum of zero has
    /// no usable range, so it reads as off.
    pub fn from_raw(raw: u64, max: u64) -> BrightnessLevel {
        if max == 0 {
            return Self::OFF;
        }
        if raw >= max {
            return Self::FULL;
        }
        Self::new(raw as f64 / max as f64)
    }

    /// The raw device value for this level, `round(fraction * max)`.
    pub fn to_raw(self, max: u64) -> u64 {
        ((self.fraction() * max as f64).round() as u64).min(max)
    }

    pub fn to_percent(self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl fmt::Display for BrightnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.to_percent())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is neither a fraction between 0 and 1 nor a percentage")]
pub struct ParseLevelError(String);

/// Accepts either a fraction (`0.42`) or a percentage (`42%`). Values out of
/// range are clamped like everywhere else.
impl FromStr for BrightnessLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ParseLevelError(trimmed.to_owned());
        let fraction = match trimmed.strip_suffix('%') {
            Some(percent) => percent.trim().parse::<f64>().map_err(|_| invalid())? / 100.0,
            None => trimmed.parse::<f64>().map_err(|_| invalid())?,
        };
        if fraction.is_nan() {
            return Err(invalid());
        }
        Ok(BrightnessLevel::new(fraction))
    }
}
