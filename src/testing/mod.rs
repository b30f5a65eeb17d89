//! Testing utilities for vhdscan
//!
//! Synthetic implementations of the platform seams so the camera state
//! machine and capture pipeline can be driven without hardware. The scripted
//! control tool renders its state in `v4l2-ctl` text format, so tests run
//! through the same parsers as production.

pub mod scripted_tool;
pub mod synthetic_data;

pub use scripted_tool::{ScriptedControlTool, ToolOp};
pub use synthetic_data::{
    device_info, synthetic_frame, StaticDeviceSource, SyntheticBackend, SyntheticFailure,
};
