//! The capture pipeline: a buffer thread reading frames from the device into
//! a single latest-frame slot, and a publish thread converting and emitting
//! that frame at the shared frame rate.

use super::Inner;
use crate::convert;
use crate::errors::{CameraError, ErrorCode};
use crate::platform::{CaptureStream, RawFrame};
use crate::resolution::Resolution;
use crate::types::{FeedFrame, Status};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Latest-wins frame cell shared by the two pipeline threads.
#[derive(Default)]
pub(crate) struct FrameSlot {
    frame: Mutex<Option<RawFrame>>,
}

impl FrameSlot {
    /// Store a frame. Returns true if an unconsumed frame was overwritten.
    pub fn put(&self, frame: RawFrame) -> bool {
        self.frame
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(frame)
            .is_some()
    }

    pub fn take(&self) -> Option<RawFrame> {
        self.frame.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// One-shot cancellation signal with an interruptible wait.
#[derive(Default)]
pub(crate) struct CancelToken {
    cancelled: Mutex<bool>,
    cv: Condvar,
}

impl CancelToken {
    pub fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `timeout` unless cancelled first. Returns true if cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.cancelled.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            cancelled = guard;
        }
    }
}

/// Handles of a running buffer/publish thread pair.
pub(crate) struct Pipeline {
    id: u64,
    cancel: Arc<CancelToken>,
    buffer: Option<JoinHandle<Result<(), ErrorCode>>>,
    publish: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel both threads and wait for them. The device handle is closed
    /// once this returns.
    pub fn shutdown(mut self) -> Result<(), ErrorCode> {
        self.cancel.cancel();

        if let Some(handle) = self.publish.take() {
            if handle.join().is_err() {
                log::error!("Publish thread of pipeline {} panicked", self.id);
            }
        }
        match self.buffer.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => {
                log::error!("Buffer thread of pipeline {} panicked", self.id);
                Err(ErrorCode::CameraIo)
            }
            None => Ok(()),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Detached pipelines still stop; their threads exit on their own.
        self.cancel.cancel();
    }
}

/// Start the buffer and publish threads for `device` at `resolution`.
pub(crate) fn spawn(
    inner: &Arc<Inner>,
    id: u64,
    device: String,
    resolution: Resolution,
) -> Result<Pipeline, CameraError> {
    let frames = Arc::new(FrameSlot::default());
    let cancel = Arc::new(CancelToken::default());

    let publish = {
        let inner = inner.clone();
        let frames = frames.clone();
        let cancel = cancel.clone();
        thread::Builder::new()
            .name("vhdscan-publish".to_string())
            .spawn(move || publish_loop(inner, id, frames, cancel))
            .map_err(|e| CameraError::CameraIo(format!("Failed to spawn publish thread: {}", e)))?
    };

    let buffer = {
        let inner = inner.clone();
        let cancel = cancel.clone();
        thread::Builder::new()
            .name("vhdscan-buffer".to_string())
            .spawn(move || buffer_loop(inner, id, device, resolution, frames, cancel))
    };

    match buffer {
        Ok(buffer) => Ok(Pipeline {
            id,
            cancel,
            buffer: Some(buffer),
            publish: Some(publish),
        }),
        Err(e) => {
            cancel.cancel();
            let _ = publish.join();
            Err(CameraError::CameraIo(format!(
                "Failed to spawn buffer thread: {}",
                e
            )))
        }
    }
}

fn open_configured(
    inner: &Inner,
    device: &str,
    resolution: &Resolution,
) -> Result<Box<dyn CaptureStream>, (ErrorCode, CameraError)> {
    let mut stream = inner
        .context
        .backend
        .open(device)
        .map_err(|e| (ErrorCode::DeviceBusy, e))?;
    stream
        .set_frame_size(resolution.width(), resolution.height())
        .map_err(|e| (ErrorCode::SetResolution, e))?;
    stream
        .set_pixel_format(resolution.fourcc_bytes())
        .map_err(|e| (ErrorCode::SetPixelFormat, e))?;
    Ok(stream)
}

fn buffer_loop(
    inner: Arc<Inner>,
    id: u64,
    device: String,
    resolution: Resolution,
    frames: Arc<FrameSlot>,
    cancel: Arc<CancelToken>,
) -> Result<(), ErrorCode> {
    let mut stream = match open_configured(&inner, &device, &resolution) {
        Ok(stream) => stream,
        Err((code, e)) => {
            cancel.cancel();
            log::warn!("Starting feed on {} at {} failed: {}", device, resolution, e);
            inner.pipeline_failed(id, Status::InitError, code);
            return Err(code);
        }
    };

    log::info!("Feed started on {} at {}", device, resolution);
    inner.pipeline_started(id);

    let result = loop {
        if cancel.is_cancelled() {
            break Ok(());
        }
        match stream.read_frame() {
            Ok(frame) => {
                if frames.put(frame) {
                    inner.count_dropped_frame();
                }
            }
            Err(e) => break Err(e),
        }
    };

    drop(stream);
    cancel.cancel();

    match result {
        Ok(()) => {
            log::info!("Feed on {} stopped", device);
            Ok(())
        }
        Err(e) => {
            log::warn!("Feed on {} failed: {}", device, e);
            let code = e.code();
            inner.pipeline_failed(id, Status::FeedError, code);
            Err(code)
        }
    }
}

fn publish_loop(inner: Arc<Inner>, id: u64, frames: Arc<FrameSlot>, cancel: Arc<CancelToken>) {
    loop {
        let interval = Duration::from_secs(1) / inner.context.feed_slot.fps();
        if cancel.wait(interval) {
            break;
        }

        let Some(frame) = frames.take() else {
            continue;
        };
        match convert::to_rgb(&frame) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                inner.publish_frame(
                    id,
                    FeedFrame {
                        image: Arc::new(image),
                        width,
                        height,
                        sequence: frame.sequence,
                    },
                );
            }
            Err(e) => log::warn!("Dropping frame {}: {}", frame.sequence, e),
        }
    }
}
