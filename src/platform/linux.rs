use crate::errors::CameraError;
use crate::platform::{CaptureBackend, CaptureStream, DeviceInfo, DeviceSource, RawFrame};
use bytes::Bytes;
use std::fs;
use std::path::{Path, PathBuf};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream as _;
use v4l::video::Capture;
use v4l::{Device, FourCC};

/// Enumerates V4L2 devices through sysfs (`/sys/class/video4linux`).
#[derive(Debug, Clone)]
pub struct SysfsDeviceSource {
    sysfs_root: PathBuf,
    dev_root: PathBuf,
    check_caps: bool,
}

impl SysfsDeviceSource {
    pub fn new(sysfs_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            dev_root: dev_root.into(),
            check_caps: true,
        }
    }

    /// Skip the capability ioctl and treat every node as capture-capable.
    pub fn without_capability_check(mut self) -> Self {
        self.check_caps = false;
        self
    }
}

impl Default for SysfsDeviceSource {
    fn default() -> Self {
        Self::new("/sys/class/video4linux", "/dev")
    }
}

impl DeviceSource for SysfsDeviceSource {
    fn scan(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        let entries = match fs::read_dir(&self.sysfs_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut nodes: Vec<(u32, DeviceInfo)> = Vec::new();
        for entry in entries.flatten() {
            let node = entry.file_name().to_string_lossy().into_owned();
            let Some(index) = node
                .strip_prefix("video")
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let devnode = self.dev_root.join(&node);
            let mut info = read_device_info(&entry.path(), &devnode);
            info.can_capture = !self.check_caps || utils::is_capture_device(&devnode);
            nodes.push((index, info));
        }

        nodes.sort_by_key(|(index, _)| *index);
        Ok(nodes.into_iter().map(|(_, info)| info).collect())
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// USB identity of a `video4linux` class entry.
///
/// The USB attributes live on the interface's parent device, so the lookup
/// walks up from `device` until it finds `idVendor`.
pub fn read_device_info(class_dir: &Path, devnode: &Path) -> DeviceInfo {
    let device_dir = fs::canonicalize(class_dir.join("device"))
        .unwrap_or_else(|_| class_dir.join("device"));
    let usb_dir = device_dir
        .ancestors()
        .take(3)
        .find(|dir| dir.join("idVendor").exists())
        .map(Path::to_path_buf);

    let attr = |name: &str| usb_dir.as_deref().and_then(|dir| read_attr(dir, name));
    let card_name = read_attr(class_dir, "name");

    DeviceInfo {
        name: devnode.to_string_lossy().into_owned(),
        vendor: attr("manufacturer").unwrap_or_default(),
        model: attr("product").or(card_name).unwrap_or_default(),
        vendor_id: attr("idVendor").unwrap_or_default(),
        model_id: attr("idProduct").unwrap_or_default(),
        revision: attr("bcdDevice").unwrap_or_default(),
        can_capture: false,
    }
}

/// Capture backend on top of the `v4l` crate using memory-mapped buffers.
#[derive(Debug, Clone)]
pub struct V4lCaptureBackend {
    buffers: u32,
}

impl V4lCaptureBackend {
    pub fn new(buffers: u32) -> Self {
        Self {
            buffers: buffers.max(1),
        }
    }
}

impl Default for V4lCaptureBackend {
    fn default() -> Self {
        Self::new(4)
    }
}

impl CaptureBackend for V4lCaptureBackend {
    fn open(&self, device: &str) -> Result<Box<dyn CaptureStream>, CameraError> {
        let handle = Device::with_path(device)
            .map_err(|e| CameraError::DeviceBusy(format!("Failed to open {}: {}", device, e)))?;

        Ok(Box::new(V4lStream {
            stream: None,
            device: handle,
            path: device.to_string(),
            buffers: self.buffers,
            format: None,
        }))
    }
}

/// Open V4L2 capture handle. The mmap stream is created on the first read.
struct V4lStream {
    // Declared before `device` so the buffers are unmapped first.
    stream: Option<MmapStream<'static>>,
    device: Device,
    path: String,
    buffers: u32,
    format: Option<v4l::Format>,
}

impl CaptureStream for V4lStream {
    fn set_frame_size(&mut self, width: u32, height: u32) -> Result<(), CameraError> {
        let mut format = self
            .device
            .format()
            .map_err(|e| CameraError::SetResolution(format!("{}: {}", self.path, e)))?;
        format.width = width;
        format.height = height;

        let applied = self
            .device
            .set_format(&format)
            .map_err(|e| CameraError::SetResolution(format!("{}: {}", self.path, e)))?;
        if applied.width != width || applied.height != height {
            return Err(CameraError::SetResolution(format!(
                "{} accepted {}x{} instead of {}x{}",
                self.path, applied.width, applied.height, width, height
            )));
        }
        self.format = Some(applied);
        Ok(())
    }

    fn set_pixel_format(&mut self, fourcc: [u8; 4]) -> Result<(), CameraError> {
        let requested = FourCC::new(&fourcc);
        let mut format = self
            .device
            .format()
            .map_err(|e| CameraError::SetPixelFormat(format!("{}: {}", self.path, e)))?;
        format.fourcc = requested;

        let applied = self
            .device
            .set_format(&format)
            .map_err(|e| CameraError::SetPixelFormat(format!("{}: {}", self.path, e)))?;
        if applied.fourcc != requested {
            return Err(CameraError::SetPixelFormat(format!(
                "{} accepted {} instead of {}",
                self.path, applied.fourcc, requested
            )));
        }
        self.format = Some(applied);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RawFrame, CameraError> {
        let format = match self.format {
            Some(format) => format,
            None => {
                let format = self
                    .device
                    .format()
                    .map_err(|e| CameraError::CameraIo(format!("{}: {}", self.path, e)))?;
                self.format = Some(format);
                format
            }
        };

        if self.stream.is_none() {
            let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, self.buffers)
                .map_err(|e| {
                    CameraError::CameraIo(format!("Failed to map buffers of {}: {}", self.path, e))
                })?;
            self.stream = Some(stream);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CameraError::CameraIo(format!("{}: stream not open", self.path)));
        };

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CameraIo(format!("Failed to read {}: {}", self.path, e)))?;
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };

        Ok(RawFrame::new(
            Bytes::copy_from_slice(&buf[..used]),
            format.width,
            format.height,
            format.fourcc.repr,
        )
        .with_sequence(meta.sequence as u64))
    }
}

/// Linux-specific utilities
pub mod utils {
    use std::path::Path;
    use v4l::capability::Flags;

    /// Whether the node can capture video (metadata nodes cannot).
    pub fn is_capture_device(devnode: &Path) -> bool {
        v4l::Device::with_path(devnode)
            .and_then(|device| device.query_caps())
            .map(|caps| caps.capabilities.contains(Flags::VIDEO_CAPTURE))
            .unwrap_or(false)
    }
}
