//! Serialized control writes for one claimed device.

use super::Inner;
use crate::errors::CameraError;
use crate::platform::ControlTool;
use crate::probe;
use crossbeam_channel::{unbounded, Sender};
use std::sync::{Arc, Weak};
use std::thread;

#[derive(Debug)]
pub(crate) enum WriteJob {
    Control { name: String, value: i64, epoch: u64 },
    Sensitivity { epoch: u64 },
}

/// Worker thread that owns the device's control-write path.
///
/// Dropping the writer closes its queue; the thread finishes the job in
/// progress and exits without being joined.
pub(crate) struct ControlWriter {
    sender: Sender<WriteJob>,
}

impl ControlWriter {
    pub fn spawn(
        inner: Weak<Inner>,
        tool: Arc<dyn ControlTool>,
        device: String,
    ) -> Result<Self, CameraError> {
        let (sender, receiver) = unbounded::<WriteJob>();

        thread::Builder::new()
            .name("vhdscan-controls".to_string())
            .spawn(move || {
                for job in receiver.iter() {
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    run_job(&inner, tool.as_ref(), &device, job);
                }
                log::debug!("Control writer for {} finished", device);
            })
            .map_err(|e| CameraError::CameraIo(format!("Failed to spawn control writer: {}", e)))?;

        Ok(Self { sender })
    }

    pub fn submit(&self, job: WriteJob) -> Result<(), CameraError> {
        self.sender
            .send(job)
            .map_err(|_| CameraError::CameraIo("Control writer is gone".to_string()))
    }
}

fn run_job(inner: &Arc<Inner>, tool: &dyn ControlTool, device: &str, job: WriteJob) {
    match job {
        WriteJob::Control { name, value, epoch } => {
            if inner.epoch() != epoch {
                log::debug!("Dropping stale write {}={} for {}", name, value, device);
                return;
            }
            log::debug!("Writing {}={} to {}", name, value, device);
            match tool.set_control(device, &name, value) {
                Ok(()) => {
                    if inner.finish_control_write(epoch, &name, value) {
                        refresh_sensitivity(inner, tool, device, epoch);
                    }
                }
                Err(e) => {
                    log::warn!("Writing {}={} to {} failed: {}", name, value, device, e);
                    inner.abandon_control_write(epoch, &name, value);
                }
            }
        }
        WriteJob::Sensitivity { epoch } => {
            if inner.epoch() == epoch {
                refresh_sensitivity(inner, tool, device, epoch);
            }
        }
    }
}

fn refresh_sensitivity(inner: &Arc<Inner>, tool: &dyn ControlTool, device: &str, epoch: u64) {
    match tool.list_controls(device) {
        Ok(output) => inner.apply_sensitivity(epoch, probe::parse_sensitivity(&output)),
        Err(e) => log::warn!("Refreshing control sensitivity of {} failed: {}", device, e),
    }
}
