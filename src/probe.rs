//! Device probing: parses the device control utility's text output into
//! resolutions, the current format and controls.
//!
//! The parsers follow `v4l2-ctl` output (`--list-formats-ext`,
//! `--get-fmt-video`, `--list-ctrls-menus`).

use crate::control::{Control, ControlValues};
use crate::errors::CameraError;
use crate::platform::ControlTool;
use crate::resolution::Resolution;

/// Everything learned about a freshly claimed device.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub resolutions: Vec<Resolution>,
    pub resolution: Resolution,
    pub controls: Vec<Control>,
}

/// Text between the first pair of single quotes.
fn quoted(line: &str) -> Option<&str> {
    let start = line.find('\'')? + 1;
    let len = line[start..].find('\'')?;
    Some(&line[start..start + len])
}

/// First `{a}{sep}{b}` pair of decimal numbers in the line.
fn number_pair(line: &str, sep: char) -> Option<(u32, u32)> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if line[i..].starts_with(sep) {
                let rest = &line[i + sep.len_utf8()..];
                let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                if digits > 0 {
                    let a = line[start..i].parse().ok()?;
                    let b = rest[..digits].parse().ok()?;
                    return Some((a, b));
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Value of a `key=value` field, e.g. `min=-64`.
fn field(line: &str, key: &str) -> Option<i64> {
    line.split_whitespace()
        .filter_map(|token| token.strip_prefix(key)?.strip_prefix('='))
        .find_map(|value| value.parse().ok())
}

/// Supported capture modes, in device order, without duplicates.
pub fn parse_formats(output: &str) -> Vec<Resolution> {
    let mut resolutions: Vec<Resolution> = Vec::new();
    let mut pixel_format: Option<&str> = None;

    for line in output.lines() {
        if line.contains("]: '") {
            pixel_format = quoted(line);
        } else if line.contains("Size:") {
            let (Some(format), Some((width, height))) = (pixel_format, number_pair(line, 'x'))
            else {
                continue;
            };
            let resolution = Resolution::new(width, height, format);
            if !resolutions.contains(&resolution) {
                resolutions.push(resolution);
            }
        }
    }
    resolutions
}

/// The device's currently configured capture mode.
pub fn parse_current_format(output: &str) -> Option<Resolution> {
    let mut size = None;
    let mut pixel_format = None;

    for line in output.lines() {
        if line.contains("Width/Height") {
            size = number_pair(line, '/');
        } else if line.contains("Pixel Format") {
            pixel_format = quoted(line);
        }
    }

    match (size, pixel_format) {
        (Some((width, height)), Some(format)) if width > 0 && height > 0 && !format.is_empty() => {
            Some(Resolution::new(width, height, format))
        }
        _ => None,
    }
}

/// Controls with their menu entries, in device order.
pub fn parse_controls(output: &str) -> Vec<Control> {
    let mut controls: Vec<Control> = Vec::new();
    let mut in_menu = false;

    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((name, rest)) = control_header(line) {
            in_menu = false;
            let Some(value) = field(rest, "value") else {
                continue;
            };
            let inactive = rest.contains("flags=inactive");
            let min = field(rest, "min").unwrap_or(0);
            let max = field(rest, "max").unwrap_or(0);
            let default = field(rest, "default").unwrap_or(0);

            let control = if rest.contains("(int)") {
                let step = field(rest, "step").unwrap_or(1);
                Control::integer(name, value, min, max, step, default)
            } else if rest.contains("(bool)") {
                Control::boolean(name, value, default)
            } else if rest.contains("(menu)") || rest.contains("(intmenu)") {
                in_menu = true;
                Control::menu(name, value, min, max, default)
            } else {
                continue;
            };
            controls.push(control.with_inactive(inactive));
        } else if in_menu {
            // Menu entries look like `1: 50 Hz`; anything else (a class
            // heading such as `Camera Controls`) ends the menu.
            match line.split_once(": ") {
                Some((value, label)) if value.parse::<i64>().is_ok() => {
                    if let (Some(control), Ok(value)) = (controls.last_mut(), value.parse()) {
                        control.add_option(value, label);
                    }
                }
                _ => in_menu = false,
            }
        }
    }
    controls
}

/// Control name and the text after its hexadecimal id.
fn control_header(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(" 0x")?;
    let name = name.trim();
    if name.is_empty() || name.contains(' ') {
        return None;
    }
    Some((name, rest))
}

/// `(name, inactive)` for every control in a `--list-ctrls-menus` listing.
pub fn parse_sensitivity(output: &str) -> Vec<(String, bool)> {
    output
        .lines()
        .filter_map(|line| {
            let (name, rest) = control_header(line.trim())?;
            Some((name.to_string(), rest.contains("flags=inactive")))
        })
        .collect()
}

/// Query a device's resolutions, current format and controls, then apply
/// any requested overrides.
///
/// Runs blocking device I/O and must be called from a worker thread.
/// Override writes are confirmed by re-reading the control list.
pub fn probe_device(
    tool: &dyn ControlTool,
    device: &str,
    requested_resolution: Option<&str>,
    requested_controls: Option<&ControlValues>,
) -> Result<ProbeResult, CameraError> {
    log::debug!("Probing {}", device);

    let resolutions = tool
        .list_formats(device)
        .map(|output| parse_formats(&output))
        .unwrap_or_else(|e| {
            log::warn!("Listing formats of {} failed: {}", device, e);
            Vec::new()
        });
    if resolutions.is_empty() {
        return Err(CameraError::NoResolutions);
    }

    let requested = requested_resolution
        .and_then(|key| key.parse::<Resolution>().ok())
        .filter(|res| resolutions.contains(res));

    let resolution = match requested {
        Some(resolution) => resolution,
        None => tool
            .current_format(device)
            .ok()
            .and_then(|output| parse_current_format(&output))
            .ok_or(CameraError::NoCurrentResolution)?,
    };

    let mut controls = read_controls(tool, device);
    if let Some(requested) = requested_controls {
        let mut written = 0;
        for (name, value) in requested {
            let Some(control) = controls.iter().find(|c| c.name() == name) else {
                continue;
            };
            if control.value() == *value {
                continue;
            }
            match tool.set_control(device, name, *value) {
                Ok(()) => written += 1,
                Err(e) => log::warn!("Restoring {}={} on {} failed: {}", name, value, device, e),
            }
        }
        if written > 0 {
            controls = read_controls(tool, device);
        }
    }

    log::debug!(
        "Probed {}: {} resolutions, current {}, {} controls",
        device,
        resolutions.len(),
        resolution,
        controls.len()
    );

    Ok(ProbeResult {
        resolutions,
        resolution,
        controls,
    })
}

fn read_controls(tool: &dyn ControlTool, device: &str) -> Vec<Control> {
    tool.list_controls(device)
        .map(|output| parse_controls(&output))
        .unwrap_or_else(|e| {
            log::warn!("Listing controls of {} failed: {}", device, e);
            Vec::new()
        })
}
