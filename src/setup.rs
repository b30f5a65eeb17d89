//! Persisted snapshot of one camera's configuration.

use crate::control::{Control, ControlValues};
use crate::errors::CameraError;
use crate::platform::device_monitor::Device;
use crate::resolution::Resolution;
use serde::{Deserialize, Serialize};

/// Device identity, resolution key and control values of a camera.
///
/// Serialized as `{id, udev_name, resolution, controls: {name: value}}`.
/// Missing fields deserialize to their empty defaults. Equality is structural
/// over every field, including the whole control map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setup {
    pub id: String,
    pub udev_name: String,
    pub resolution: String,
    pub controls: ControlValues,
}

impl Setup {
    pub fn new(
        device: Option<&Device>,
        resolution: Option<&Resolution>,
        controls: impl IntoIterator<Item = Control>,
    ) -> Self {
        let (id, udev_name) = device
            .map(|d| (d.id().to_string(), d.name().to_string()))
            .unwrap_or_default();

        Self {
            id,
            udev_name,
            resolution: resolution.map(Resolution::key).unwrap_or_default(),
            controls: controls
                .into_iter()
                .map(|c| (c.name().to_string(), c.value()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Resolution override for an assignment, if one was stored.
    pub fn resolution_key(&self) -> Option<&str> {
        Some(self.resolution.as_str()).filter(|r| !r.is_empty())
    }

    pub fn save(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, CameraError> {
        serde_json::from_value(value)
            .map_err(|e| CameraError::Config(format!("Invalid camera setup: {}", e)))
    }
}
