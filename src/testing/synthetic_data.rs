//! Synthetic devices and frames
//!
//! A device source whose device list can be changed at runtime, and a capture
//! backend producing gradient frames at whatever size and format the
//! pipeline configures.

use crate::errors::CameraError;
use crate::platform::{CaptureBackend, CaptureStream, DeviceInfo, DeviceSource, RawFrame};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Device record for the `index`-th synthetic camera (`/dev/video{2*index}`).
pub fn device_info(index: u32) -> DeviceInfo {
    DeviceInfo {
        name: format!("/dev/video{}", index * 2),
        vendor: "Synthetic_Optics".to_string(),
        model: format!("Page_Cam_{}", index),
        vendor_id: "1d6b".to_string(),
        model_id: format!("{:04x}", 0x0100 + index),
        revision: "0001".to_string(),
        can_capture: true,
    }
}

/// RGB3 gradient frame that changes with `sequence`.
pub fn synthetic_frame(sequence: u64, width: u32, height: u32) -> RawFrame {
    let mut data = vec![0u8; width as usize * height as usize * 3];
    let base = (sequence % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = (y as usize * width as usize + x as usize) * 3;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    RawFrame::new(data, width, height, *b"RGB3").with_sequence(sequence)
}

/// Device source backed by a list the test can replace at any time.
///
/// Clones share the list, so a test keeps one handle and gives the other to
/// the registry.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceSource {
    devices: Arc<Mutex<Vec<DeviceInfo>>>,
}

impl StaticDeviceSource {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices: Arc::new(Mutex::new(devices)),
        }
    }

    /// Replace the visible devices; takes effect on the next scan.
    pub fn set(&self, devices: Vec<DeviceInfo>) {
        *self.devices.lock().unwrap_or_else(|e| e.into_inner()) = devices;
    }
}

impl DeviceSource for StaticDeviceSource {
    fn scan(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        Ok(self
            .devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// Failure injected into the synthetic capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFailure {
    Open,
    FrameSize,
    PixelFormat,
    /// Reads fail once this many frames were delivered by one stream.
    ReadAfter(u64),
}

#[derive(Debug)]
struct BackendState {
    failure: Option<SyntheticFailure>,
    frame_interval: Duration,
    opens: usize,
}

/// Capture backend producing synthetic frames.
///
/// Supports `RGB3`, `BGR3`, `YUYV` and `GREY`; any other pixel format is
/// refused like a real device would.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    state: Arc<Mutex<BackendState>>,
    open_streams: Arc<AtomicUsize>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                failure: None,
                frame_interval: Duration::from_millis(5),
                opens: 0,
            })),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_frame_interval(self, interval: Duration) -> Self {
        self.state().frame_interval = interval;
        self
    }

    /// Inject a failure into streams opened from now on. `None` clears it.
    pub fn set_failure(&self, failure: Option<SyntheticFailure>) {
        self.state().failure = failure;
    }

    /// How many times a stream was opened.
    pub fn opens(&self) -> usize {
        self.state().opens
    }

    /// Streams currently open (not yet dropped).
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for SyntheticBackend {
    fn open(&self, device: &str) -> Result<Box<dyn CaptureStream>, CameraError> {
        let (failure, frame_interval) = {
            let mut state = self.state();
            if state.failure == Some(SyntheticFailure::Open) {
                return Err(CameraError::DeviceBusy(format!("{} is busy", device)));
            }
            state.opens += 1;
            (state.failure, state.frame_interval)
        };

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticStream {
            device: device.to_string(),
            width: 640,
            height: 480,
            fourcc: *b"RGB3",
            sequence: 0,
            failure,
            frame_interval,
            open_streams: self.open_streams.clone(),
        }))
    }
}

struct SyntheticStream {
    device: String,
    width: u32,
    height: u32,
    fourcc: [u8; 4],
    sequence: u64,
    failure: Option<SyntheticFailure>,
    frame_interval: Duration,
    open_streams: Arc<AtomicUsize>,
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CaptureStream for SyntheticStream {
    fn set_frame_size(&mut self, width: u32, height: u32) -> Result<(), CameraError> {
        if self.failure == Some(SyntheticFailure::FrameSize) || width == 0 || height == 0 {
            return Err(CameraError::SetResolution(format!(
                "{} refused {}x{}",
                self.device, width, height
            )));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn set_pixel_format(&mut self, fourcc: [u8; 4]) -> Result<(), CameraError> {
        let supported = matches!(&fourcc, b"RGB3" | b"BGR3" | b"YUYV" | b"GREY");
        if self.failure == Some(SyntheticFailure::PixelFormat) || !supported {
            return Err(CameraError::SetPixelFormat(format!(
                "{} refused {}",
                self.device,
                String::from_utf8_lossy(&fourcc)
            )));
        }
        self.fourcc = fourcc;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RawFrame, CameraError> {
        if let Some(SyntheticFailure::ReadAfter(limit)) = self.failure {
            if self.sequence >= limit {
                return Err(CameraError::CameraIo(format!("{} disconnected", self.device)));
            }
        }
        std::thread::sleep(self.frame_interval);

        let sequence = self.sequence;
        self.sequence += 1;
        let pixels = self.width as usize * self.height as usize;

        Ok(match &self.fourcc {
            b"YUYV" => RawFrame::new(
                [128u8; 4].repeat((self.width as usize).div_ceil(2) * self.height as usize),
                self.width,
                self.height,
                self.fourcc,
            )
            .with_sequence(sequence),
            b"GREY" => RawFrame::new(
                vec![(sequence % 256) as u8; pixels],
                self.width,
                self.height,
                self.fourcc,
            )
            .with_sequence(sequence),
            _ => {
                let mut frame = synthetic_frame(sequence, self.width, self.height);
                frame.fourcc = self.fourcc;
                frame
            }
        })
    }
}
