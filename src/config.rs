//! Configuration management for vhdscan
//!
//! Runtime options for the camera core: publish rate, the device control
//! utility, capture buffering and device discovery.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhdscanConfig {
    pub camera: CameraConfig,
    pub devices: DevicesConfig,
}

/// Camera and capture pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Publish rate shared by all cameras
    pub fps: u32,
    /// Program used for probing and control writes
    pub control_tool: String,
    /// Memory-mapped buffers of a capture stream
    pub capture_buffers: u32,
}

/// Device discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub sysfs_root: PathBuf,
    pub dev_root: PathBuf,
    /// Hot-plug polling period in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            control_tool: "v4l2-ctl".to_string(),
            capture_buffers: 4,
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class/video4linux"),
            dev_root: PathBuf::from("/dev"),
            poll_interval_ms: 2000,
        }
    }
}

impl DevicesConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl VhdscanConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::Config(format!("Failed to read config file: {}", e)))?;

        let config: VhdscanConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate().map_err(CameraError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("vhdscan.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.fps == 0 || self.camera.fps > 120 {
            return Err("Invalid FPS (must be 1-120)".to_string());
        }
        if self.camera.capture_buffers == 0 || self.camera.capture_buffers > 32 {
            return Err("Capture buffers must be between 1 and 32".to_string());
        }
        if self.camera.control_tool.trim().is_empty() {
            return Err("Control tool must not be empty".to_string());
        }
        if self.devices.poll_interval_ms == 0 {
            return Err("Poll interval must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VhdscanConfig::default();
        assert_eq!(config.camera.fps, 15);
        assert_eq!(config.camera.control_tool, "v4l2-ctl");
        assert_eq!(config.devices.poll_interval(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad_fps = VhdscanConfig::default();
        bad_fps.camera.fps = 0;
        assert!(bad_fps.validate().is_err());

        let mut bad_buffers = VhdscanConfig::default();
        bad_buffers.camera.capture_buffers = 64;
        assert!(bad_buffers.validate().is_err());

        let mut bad_tool = VhdscanConfig::default();
        bad_tool.camera.control_tool = " ".to_string();
        assert!(bad_tool.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("vhdscan.toml");

        let mut config = VhdscanConfig::default();
        config.camera.fps = 24;
        config.devices.dev_root = PathBuf::from("/tmp/dev");
        config.save_to_file(&config_path).unwrap();

        let loaded = VhdscanConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("vhdscan.toml");
        fs::write(&config_path, "[camera]\nfps = 5\n").unwrap();

        let loaded = VhdscanConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.camera.fps, 5);
        assert_eq!(loaded.camera.capture_buffers, 4);
        assert_eq!(loaded.devices, DevicesConfig::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("vhdscan.toml");
        fs::write(&config_path, "[camera]\nfps = 500\n").unwrap();
        assert!(matches!(
            VhdscanConfig::load_from_file(&config_path),
            Err(CameraError::Config(_))
        ));
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&VhdscanConfig::default()).unwrap();
        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[devices]"));
        assert!(toml_string.contains("poll_interval_ms"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = VhdscanConfig::load_from_file("nonexistent_file.toml");
        assert_eq!(result.unwrap(), VhdscanConfig::default());
    }
}
