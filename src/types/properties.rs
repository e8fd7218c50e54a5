//! Transform properties for image variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CachineError, Result};

/// Target dimensions of an image variant.
///
/// A zero dimension means "unconstrained": the processor scales by the other
/// one, and `0x0` leaves the image untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageProperties {
    pub width: u32,
    pub height: u32,
}

impl ImageProperties {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Coerce textual dimensions (e.g. query parameters) into properties.
    ///
    /// Accepts integral numbers, including forms like `"12.0"` or `" 12 "`.
    /// Negative, fractional, non-finite and out-of-range values are rejected.
    pub fn from_strs(width: &str, height: &str) -> Result<Self> {
        Ok(Self {
            width: coerce_dimension("width", width)?,
            height: coerce_dimension("height", height)?,
        })
    }

    /// Replace the width.
    pub fn width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Replace the height.
    pub fn height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }
}

impl fmt::Display for ImageProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ImageProperties {
    type Err = CachineError;

    /// Parse `"{width}x{height}"`.
    fn from_str(s: &str) -> Result<Self> {
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(|| {
            CachineError::InvalidProperties(format!("expected WIDTHxHEIGHT, got {s:?}"))
        })?;
        Self::from_strs(width, height)
    }
}

fn coerce_dimension(name: &str, raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u32>() {
        return Ok(value);
    }

    let invalid = || {
        CachineError::InvalidProperties(format!(
            "{name} must be a non-negative integer, got {raw:?}"
        ))
    };
    let value: f64 = trimmed.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX)
    {
        return Err(invalid());
    }
    Ok(value as u32)
}
