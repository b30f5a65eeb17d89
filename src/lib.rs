//! vhdscan: camera core for two-webcam book scanning
//!
//! This crate drives V4L2 webcams for page digitization: it discovers
//! capture devices and follows hot-plug, claims a device per camera, probes
//! its resolutions and controls through the device control utility, and runs
//! a latest-frame capture pipeline that publishes RGB frames at a shared rate.
//!
//! # Features
//! - Device registry with exclusive claims and hot-plug polling
//! - Asynchronous device probing and serialized control writes
//! - Buffer/publish capture pipeline with a process-wide feed budget
//! - Setup snapshots for persisting a camera's configuration
//!
//! # Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use vhdscan::{Camera, CameraContext, CameraEvent, Slot, VhdscanConfig};
//!
//! let context = CameraContext::system(&VhdscanConfig::load_or_default());
//! context.registry.refresh()?;
//!
//! let camera = Camera::new(&context, Some(Slot::Left));
//! let events = camera.subscribe();
//! camera.set_device_by_name("/dev/video0", None, None)?;
//! for event in events.iter() {
//!     if let CameraEvent::Ready = event {
//!         camera.start()?;
//!     }
//! }
//! ```
pub mod camera;
pub mod config;
pub mod control;
pub mod convert;
pub mod errors;
pub mod platform;
pub mod probe;
pub mod resolution;
pub mod setup;
pub mod types;

// Testing utilities - synthetic platform for offline testing
pub mod testing;

// Re-exports for convenience
pub use camera::{Camera, CameraContext, FeedSlot};
pub use config::VhdscanConfig;
pub use control::{Control, ControlKind, ControlValues, MenuEntry};
pub use errors::{CameraError, ErrorCode};
pub use platform::{Device, DeviceEvent, DeviceInfo, DeviceRegistry, RawFrame};
pub use resolution::Resolution;
pub use setup::Setup;
pub use types::{CameraEvent, FeedFrame, Outcome, Slot, Status};

/// Initialize logging for the camera system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "vhdscan=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
