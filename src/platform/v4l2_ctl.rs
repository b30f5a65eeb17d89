//! [`ControlTool`] backed by the `v4l2-ctl` utility.

use crate::errors::CameraError;
use crate::platform::ControlTool;
use crate::resolution::Resolution;
use std::process::Command;

#[derive(Debug, Clone)]
pub struct V4l2Ctl {
    program: String,
}

impl V4l2Ctl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, device: &str, args: &[&str]) -> Result<String, CameraError> {
        log::debug!("{} --device {} {}", self.program, device, args.join(" "));

        let output = Command::new(&self.program)
            .arg("--device")
            .arg(device)
            .args(args)
            .output()
            .map_err(|e| CameraError::ToolFailed(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(CameraError::ToolFailed(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for V4l2Ctl {
    fn default() -> Self {
        Self::new("v4l2-ctl")
    }
}

impl ControlTool for V4l2Ctl {
    fn list_formats(&self, device: &str) -> Result<String, CameraError> {
        self.run(device, &["--list-formats-ext"])
    }

    fn current_format(&self, device: &str) -> Result<String, CameraError> {
        self.run(device, &["--get-fmt-video"])
    }

    fn list_controls(&self, device: &str) -> Result<String, CameraError> {
        self.run(device, &["--list-ctrls-menus"])
    }

    fn set_format(&self, device: &str, resolution: &Resolution) -> Result<(), CameraError> {
        let format = format!(
            "width={},height={},pixelformat={}",
            resolution.width(),
            resolution.height(),
            resolution.pixel_format().trim_end()
        );
        self.run(device, &["--set-fmt-video", &format]).map(|_| ())
    }

    fn set_control(&self, device: &str, name: &str, value: i64) -> Result<(), CameraError> {
        let assignment = format!("{}={}", name, value);
        self.run(device, &["--set-ctrl", &assignment]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_tool_failure() {
        let tool = V4l2Ctl::new("vhdscan-no-such-program");
        match tool.list_formats("/dev/video0") {
            Err(CameraError::ToolFailed(msg)) => assert!(msg.contains("vhdscan-no-such-program")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
