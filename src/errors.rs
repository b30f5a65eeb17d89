use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error code attached to a camera status.
///
/// These are the codes carried by `CameraEvent::Error` and by
/// [`Camera::error`](crate::camera::Camera::error). Every [`CameraError`]
/// maps onto one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    NotReady,
    DeviceBusy,
    SetResolution,
    #[serde(rename = "set-pixelformat")]
    SetPixelFormat,
    CameraIo,
    NoResolution,
    NoResolutions,
    BandwidthExceeded,
}

impl ErrorCode {
    /// Stable kebab-case name, suitable for logs and UI lookups.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::NotReady => "not-ready",
            ErrorCode::DeviceBusy => "device-busy",
            ErrorCode::SetResolution => "set-resolution",
            ErrorCode::SetPixelFormat => "set-pixelformat",
            ErrorCode::CameraIo => "camera-io",
            ErrorCode::NoResolution => "no-resolution",
            ErrorCode::NoResolutions => "no-resolutions",
            ErrorCode::BandwidthExceeded => "bandwidth-exceeded",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera is not ready")]
    NotReady,
    #[error("A device probe is already in progress")]
    ProbeInFlight,
    #[error("Device is busy or unavailable: {0}")]
    DeviceBusy(String),
    #[error("Capture bandwidth exceeded: another camera is already feeding")]
    BandwidthExceeded,
    #[error("Unknown control: {0}")]
    UnknownControl(String),
    #[error("Invalid value {value} for control {name}")]
    InvalidControlValue { name: String, value: i64 },
    #[error("Invalid resolution key: {0}")]
    InvalidResolution(String),
    #[error("Resolution not supported by device: {0}")]
    UnsupportedResolution(String),
    #[error("Device reports no supported resolutions")]
    NoResolutions,
    #[error("Device reports no usable current resolution")]
    NoCurrentResolution,
    #[error("Failed to set resolution: {0}")]
    SetResolution(String),
    #[error("Failed to set pixel format: {0}")]
    SetPixelFormat(String),
    #[error("Camera I/O error: {0}")]
    CameraIo(String),
    #[error("Device control tool failed: {0}")]
    ToolFailed(String),
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// The status error code this error is reported under.
    pub fn code(&self) -> ErrorCode {
        match self {
            CameraError::NotReady
            | CameraError::ProbeInFlight
            | CameraError::UnknownControl(_)
            | CameraError::InvalidControlValue { .. }
            | CameraError::Config(_) => ErrorCode::NotReady,
            CameraError::DeviceBusy(_) => ErrorCode::DeviceBusy,
            CameraError::BandwidthExceeded => ErrorCode::BandwidthExceeded,
            CameraError::InvalidResolution(_)
            | CameraError::UnsupportedResolution(_)
            | CameraError::SetResolution(_) => ErrorCode::SetResolution,
            CameraError::SetPixelFormat(_) | CameraError::UnsupportedFormat(_) => {
                ErrorCode::SetPixelFormat
            }
            CameraError::NoResolutions => ErrorCode::NoResolutions,
            CameraError::NoCurrentResolution => ErrorCode::NoResolution,
            CameraError::CameraIo(_) | CameraError::ToolFailed(_) | CameraError::Io(_) => {
                ErrorCode::CameraIo
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_names() {
        assert_eq!(ErrorCode::BandwidthExceeded.name(), "bandwidth-exceeded");
        assert_eq!(ErrorCode::SetPixelFormat.to_string(), "set-pixelformat");
        assert_eq!(
            serde_json::to_string(&ErrorCode::NoResolutions).unwrap(),
            "\"no-resolutions\""
        );
    }

    #[test]
    fn test_error_maps_to_code() {
        assert_eq!(CameraError::NoResolutions.code(), ErrorCode::NoResolutions);
        assert_eq!(CameraError::NoCurrentResolution.code(), ErrorCode::NoResolution);
        assert_eq!(
            CameraError::DeviceBusy("/dev/video0".to_string()).code(),
            ErrorCode::DeviceBusy
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "unplugged");
        assert_eq!(CameraError::from(io).code(), ErrorCode::CameraIo);
    }
}
