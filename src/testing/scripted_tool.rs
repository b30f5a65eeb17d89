//! Scripted device control utility
//!
//! Keeps a device's formats and controls in memory and renders them the way
//! `v4l2-ctl` prints them. Writes update the state, so a re-read after a
//! write reflects it, including auto controls toggling their dependents.

use crate::control::{Control, ControlKind};
use crate::errors::CameraError;
use crate::platform::ControlTool;
use crate::resolution::Resolution;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// The individual operations of a [`ControlTool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolOp {
    ListFormats,
    CurrentFormat,
    ListControls,
    SetFormat,
    SetControl,
}

#[derive(Debug)]
struct ToolState {
    formats: Vec<Resolution>,
    current: Option<Resolution>,
    controls: Vec<Control>,
    /// `(auto control, dependent)`: the dependent is inactive while the auto
    /// control is non-zero.
    dependencies: Vec<(String, String)>,
    failing: HashSet<ToolOp>,
    delay: Duration,
    write_delay: Duration,
    writes: Vec<(String, String, i64)>,
}

impl ToolState {
    fn apply_dependencies(&mut self) {
        for (auto, dependent) in &self.dependencies {
            let Some(enabled) = self
                .controls
                .iter()
                .find(|c| c.name() == auto)
                .map(|c| c.value() != 0)
            else {
                continue;
            };
            if let Some(control) = self.controls.iter_mut().find(|c| c.name() == dependent) {
                control.set_inactive(enabled);
            }
        }
    }
}

/// In-memory [`ControlTool`]. Clones share state.
#[derive(Debug, Clone)]
pub struct ScriptedControlTool {
    state: Arc<Mutex<ToolState>>,
}

impl Default for ScriptedControlTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedControlTool {
    /// A webcam with two RGB3 modes (current 640x480) and a small control
    /// set including an auto white balance that gates the temperature.
    pub fn new() -> Self {
        let mut power_line = Control::menu("power_line_frequency", 1, 0, 2, 1);
        power_line.add_option(0, "Disabled");
        power_line.add_option(1, "50 Hz");
        power_line.add_option(2, "60 Hz");

        let mut state = ToolState {
            formats: vec![
                Resolution::new(640, 480, "RGB3"),
                Resolution::new(320, 240, "RGB3"),
            ],
            current: Some(Resolution::new(640, 480, "RGB3")),
            controls: vec![
                Control::integer("brightness", 0, -64, 64, 1, 0),
                Control::integer("contrast", 32, 0, 95, 1, 32),
                Control::boolean("white_balance_temperature_auto", 1, 1),
                power_line,
                Control::integer("white_balance_temperature", 4600, 2800, 6500, 10, 4600),
            ],
            dependencies: vec![(
                "white_balance_temperature_auto".to_string(),
                "white_balance_temperature".to_string(),
            )],
            failing: HashSet::new(),
            delay: Duration::ZERO,
            write_delay: Duration::ZERO,
            writes: Vec::new(),
        };
        state.apply_dependencies();

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ToolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_formats(self, formats: Vec<Resolution>) -> Self {
        self.state().formats = formats;
        self
    }

    pub fn with_current(self, current: Option<Resolution>) -> Self {
        self.state().current = current;
        self
    }

    pub fn with_controls(self, controls: Vec<Control>) -> Self {
        {
            let mut state = self.state();
            state.controls = controls;
            state.dependencies.clear();
        }
        self
    }

    /// Delay applied to every query, to keep a probe in flight.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state().delay = delay;
        self
    }

    /// Delay applied to every control write, so later writes queue up
    /// behind it.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state().write_delay = delay;
        self
    }

    pub fn set_failing(&self, op: ToolOp, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing.insert(op);
        } else {
            state.failing.remove(&op);
        }
    }

    /// Successful control writes as `(device, name, value)`, in order.
    pub fn writes(&self) -> Vec<(String, String, i64)> {
        self.state().writes.clone()
    }

    /// Current value of a control on the simulated device.
    pub fn control_value(&self, name: &str) -> Option<i64> {
        self.state()
            .controls
            .iter()
            .find(|c| c.name() == name)
            .map(Control::value)
    }

    /// Change a value behind the camera's back, as another program would.
    pub fn set_device_value(&self, name: &str, value: i64) {
        let mut state = self.state();
        if let Some(control) = state.controls.iter_mut().find(|c| c.name() == name) {
            control.set_value(value);
        }
        state.apply_dependencies();
    }

    fn begin(&self, op: ToolOp) -> Result<MutexGuard<'_, ToolState>, CameraError> {
        let delay = match op {
            ToolOp::SetFormat => Duration::ZERO,
            ToolOp::SetControl => self.state().write_delay,
            _ => self.state().delay,
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let state = self.state();
        if state.failing.contains(&op) {
            return Err(CameraError::ToolFailed(format!("{:?} failed", op)));
        }
        Ok(state)
    }
}

fn render_formats(formats: &[Resolution]) -> String {
    let mut out = String::from("ioctl: VIDIOC_ENUM_FMT\n\tType: Video Capture\n\n");
    let mut seen: Vec<&str> = Vec::new();
    for resolution in formats {
        let format = resolution.pixel_format();
        if seen.contains(&format) {
            continue;
        }
        let _ = writeln!(out, "\t[{}]: '{}' (synthetic)", seen.len(), format);
        for r in formats.iter().filter(|r| r.pixel_format() == format) {
            let _ = writeln!(out, "\t\tSize: Discrete {}x{}", r.width(), r.height());
            let _ = writeln!(out, "\t\t\tInterval: Discrete 0.033s (30.000 fps)");
        }
        seen.push(format);
    }
    out
}

fn render_current(current: Option<&Resolution>) -> String {
    let mut out = String::from("Format Video Capture:\n");
    if let Some(r) = current {
        let _ = writeln!(out, "\tWidth/Height      : {}/{}", r.width(), r.height());
        let _ = writeln!(out, "\tPixel Format      : '{}' (synthetic)", r.pixel_format());
        let _ = writeln!(out, "\tField             : None");
    }
    out
}

fn render_controls(controls: &[Control]) -> String {
    let mut out = String::from("\nUser Controls\n\n");
    for (i, control) in controls.iter().enumerate() {
        let flags = if control.is_inactive() {
            " flags=inactive"
        } else {
            ""
        };
        let id = 0x0098_0900 + i;
        let _ = match control.kind() {
            ControlKind::Integer {
                min,
                max,
                step,
                default,
            } => writeln!(
                out,
                "{:>31} 0x{:08x} (int)    : min={} max={} step={} default={} value={}{}",
                control.name(),
                id,
                min,
                max,
                step,
                default,
                control.value(),
                flags
            ),
            ControlKind::Boolean { default } => writeln!(
                out,
                "{:>31} 0x{:08x} (bool)   : default={} value={}{}",
                control.name(),
                id,
                default,
                control.value(),
                flags
            ),
            ControlKind::Menu {
                min,
                max,
                default,
                options,
            } => {
                let _ = writeln!(
                    out,
                    "{:>31} 0x{:08x} (menu)   : min={} max={} default={} value={}{}",
                    control.name(),
                    id,
                    min,
                    max,
                    default,
                    control.value(),
                    flags
                );
                for option in options {
                    let _ = writeln!(out, "\t\t\t\t{}: {}", option.value, option.label);
                }
                Ok(())
            }
        };
    }
    out
}

impl ControlTool for ScriptedControlTool {
    fn list_formats(&self, _device: &str) -> Result<String, CameraError> {
        let state = self.begin(ToolOp::ListFormats)?;
        Ok(render_formats(&state.formats))
    }

    fn current_format(&self, _device: &str) -> Result<String, CameraError> {
        let state = self.begin(ToolOp::CurrentFormat)?;
        Ok(render_current(state.current.as_ref()))
    }

    fn list_controls(&self, _device: &str) -> Result<String, CameraError> {
        let state = self.begin(ToolOp::ListControls)?;
        Ok(render_controls(&state.controls))
    }

    fn set_format(&self, _device: &str, resolution: &Resolution) -> Result<(), CameraError> {
        let mut state = self.begin(ToolOp::SetFormat)?;
        if !state.formats.contains(resolution) {
            return Err(CameraError::ToolFailed(format!("{} not supported", resolution)));
        }
        state.current = Some(resolution.clone());
        Ok(())
    }

    fn set_control(&self, device: &str, name: &str, value: i64) -> Result<(), CameraError> {
        let mut state = self.begin(ToolOp::SetControl)?;
        let Some(control) = state.controls.iter_mut().find(|c| c.name() == name) else {
            return Err(CameraError::ToolFailed(format!("unknown control {}", name)));
        };
        control.validate(value)?;
        control.set_value(value);
        state.apply_dependencies();
        state
            .writes
            .push((device.to_string(), name.to_string(), value));
        Ok(())
    }
}
