//! Status, events and other small types shared across the camera API.

use crate::errors::ErrorCode;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// No device assigned.
    #[default]
    Unset,
    /// Probing a newly assigned device.
    Setup,
    /// Device configured, feed inactive.
    Idle,
    /// Feed requested, capture handle being configured.
    Init,
    /// Frames are being captured and published.
    Feed,
    SetupError,
    InitError,
    FeedError,
}

impl Status {
    /// Numeric code; errors are negative.
    pub fn code(&self) -> i32 {
        match self {
            Status::SetupError => -1,
            Status::InitError => -2,
            Status::FeedError => -3,
            Status::Unset => 0,
            Status::Setup => 1,
            Status::Idle => 2,
            Status::Init => 3,
            Status::Feed => 4,
        }
    }

    pub fn is_error(&self) -> bool {
        self.code() < 0
    }

    /// Idle, starting or feeding: the device is probed and usable.
    pub fn is_ready(&self) -> bool {
        self.code() >= Status::Idle.code()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Status::Unset => "unset",
            Status::Setup => "setup",
            Status::Idle => "idle",
            Status::Init => "init",
            Status::Feed => "feed",
            Status::SetupError => "setup-error",
            Status::InitError => "init-error",
            Status::FeedError => "feed-error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical camera role, used for labeling only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Left,
    Right,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Slot::Left => f.write_str("left"),
            Slot::Right => f.write_str("right"),
        }
    }
}

/// Result of an accepted camera operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request changed (or started changing) the camera.
    Applied,
    /// The camera already was in the requested state.
    Unchanged,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// A converted frame ready for display.
#[derive(Debug, Clone)]
pub struct FeedFrame {
    pub image: Arc<RgbImage>,
    pub width: u32,
    pub height: u32,
    /// Device sequence number of the source frame.
    pub sequence: u64,
}

/// Notifications delivered through [`Camera::subscribe`](crate::camera::Camera::subscribe).
#[derive(Debug, Clone)]
pub enum CameraEvent {
    Status(Status),
    /// Fired right after an error-carrying `Status` event.
    Error(ErrorCode),
    /// The camera finished (re)configuring, or was cleared.
    Ready,
    ResolutionChanged,
    Started,
    Stopped,
    Feed(FeedFrame),
    ControlChanged { name: String, value: i64 },
    SensitivityChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(Status::SetupError.is_error());
        assert!(!Status::Unset.is_error());
        assert!(Status::Init.is_ready());
        assert!(Status::Feed.is_ready());
        assert!(!Status::Setup.is_ready());
        assert!(!Status::FeedError.is_ready());
        assert_eq!(Status::default(), Status::Unset);
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::SetupError.to_string(), "setup-error");
        assert_eq!(Slot::Right.to_string(), "right");
        assert_eq!(serde_json::to_string(&Status::FeedError).unwrap(), "\"feed-error\"");
    }
}
