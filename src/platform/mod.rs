//! Operating-system seams: device enumeration, the device control utility
//! and the capture handle.
//!
//! Production implementations live in [`linux`] and [`v4l2_ctl`]; the
//! [`crate::testing`] module provides synthetic ones.

pub mod device_monitor;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod v4l2_ctl;

use crate::errors::CameraError;
use crate::resolution::Resolution;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use device_monitor::{Device, DeviceEvent, DeviceRegistry};
pub use v4l2_ctl::V4l2Ctl;

/// A capture-capable device as reported by the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device node, e.g. `/dev/video0`.
    pub name: String,
    pub vendor: String,
    pub model: String,
    pub vendor_id: String,
    pub model_id: String,
    pub revision: String,
    pub can_capture: bool,
}

/// Enumerates devices currently visible to the OS.
pub trait DeviceSource: Send + Sync {
    fn scan(&self) -> Result<Vec<DeviceInfo>, CameraError>;
}

/// Discrete operations of the device control utility.
///
/// Query operations return the utility's text output; parsing lives in
/// [`crate::probe`]. Every call may block on device I/O and must only be
/// made from a worker thread.
pub trait ControlTool: Send + Sync {
    fn list_formats(&self, device: &str) -> Result<String, CameraError>;
    fn current_format(&self, device: &str) -> Result<String, CameraError>;
    fn list_controls(&self, device: &str) -> Result<String, CameraError>;
    fn set_format(&self, device: &str, resolution: &Resolution) -> Result<(), CameraError>;
    fn set_control(&self, device: &str, name: &str, value: i64) -> Result<(), CameraError>;
}

/// Opens capture handles.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, device: &str) -> Result<Box<dyn CaptureStream>, CameraError>;
}

/// An open capture handle. Dropping it releases the device.
pub trait CaptureStream: Send {
    fn set_frame_size(&mut self, width: u32, height: u32) -> Result<(), CameraError>;
    fn set_pixel_format(&mut self, fourcc: [u8; 4]) -> Result<(), CameraError>;
    /// Blocks until the next frame is available.
    fn read_frame(&mut self) -> Result<RawFrame, CameraError>;
}

/// A frame in the device's native pixel format.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub fourcc: [u8; 4],
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, fourcc: [u8; 4]) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            fourcc,
            sequence: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn format_name(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).trim_end().to_string()
    }
}
