//! Capture modes and their canonical `WIDTHxHEIGHTxFORMAT` key.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One supported capture mode: frame size plus pixel format.
///
/// The canonical key (`Display`/`FromStr`) is `{width}x{height}x{pixelformat}`,
/// e.g. `1920x1080xMJPG`. It is the unit of equality, lookup and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    width: u32,
    height: u32,
    pixel_format: String,
}

impl Resolution {
    pub fn new(width: u32, height: u32, pixel_format: impl Into<String>) -> Self {
        Self {
            width,
            height,
            pixel_format: pixel_format.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> &str {
        &self.pixel_format
    }

    /// Canonical key, same as `to_string()`.
    pub fn key(&self) -> String {
        Self::stringify(self.width, self.height, &self.pixel_format)
    }

    /// Label for pickers, e.g. `[MJPG] 1920x1080`.
    pub fn label(&self) -> String {
        format!("[{}] {}x{}", self.pixel_format, self.width, self.height)
    }

    /// Four-character code as the little-endian integer V4L2 uses.
    ///
    /// Formats shorter than four characters are padded with spaces
    /// (`Y16` becomes `Y16 `).
    pub fn fourcc(&self) -> u32 {
        u32::from_le_bytes(self.fourcc_bytes())
    }

    pub fn fourcc_bytes(&self) -> [u8; 4] {
        let mut code = [b' '; 4];
        for (slot, byte) in code.iter_mut().zip(self.pixel_format.bytes()) {
            *slot = byte;
        }
        code
    }

    pub fn stringify(width: u32, height: u32, pixel_format: &str) -> String {
        format!("{}x{}x{}", width, height, pixel_format)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.pixel_format)
    }
}

impl FromStr for Resolution {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CameraError::InvalidResolution(s.to_string());

        // The pixel format may itself contain an `x` (e.g. `BGRx`), so only
        // the first two separators count.
        let mut parts = s.splitn(3, 'x');
        let width = parts
            .next()
            .and_then(|w| w.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let height = parts
            .next()
            .and_then(|h| h.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let pixel_format = parts.next().filter(|f| !f.is_empty()).ok_or_else(invalid)?;

        if pixel_format.len() > 4 || !pixel_format.is_ascii() {
            return Err(invalid());
        }

        Ok(Self::new(width, height, pixel_format))
    }
}

impl TryFrom<String> for Resolution {
    type Error = CameraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.key()
    }
}
