//! Camera state machine
//!
//! A [`Camera`] claims one device from the [`DeviceRegistry`], probes it on a
//! worker thread, applies resolution and control changes and runs the
//! capture pipeline. Progress is reported as [`CameraEvent`]s; every public
//! operation returns immediately except [`Camera::stop`] (and operations
//! that stop a running feed), which wait until the device handle is closed.
//!
//! Lock order: the operation lock, then the state lock, then the feed slot,
//! then the observer list. Worker threads never take the operation lock.

mod feed_slot;
mod observers;
mod pipeline;
mod writer;

pub use feed_slot::{FeedSlot, DEFAULT_FPS, MAX_FPS};
pub use observers::MAX_QUEUED_FRAMES;

use crate::control::{Control, ControlValues};
use crate::errors::{CameraError, ErrorCode};
use crate::platform::{CaptureBackend, ControlTool, Device, DeviceRegistry};
use crate::probe::{self, ProbeResult};
use crate::resolution::Resolution;
use crate::setup::Setup;
use crate::types::{CameraEvent, FeedFrame, Outcome, Slot, Status};
use crossbeam_channel::Receiver;
use observers::Observers;
use std::collections::HashMap;
use pipeline::Pipeline;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use uuid::Uuid;
use writer::{ControlWriter, WriteJob};

/// Collaborators shared by all cameras of a process.
#[derive(Clone)]
pub struct CameraContext {
    pub registry: Arc<DeviceRegistry>,
    pub tool: Arc<dyn ControlTool>,
    pub backend: Arc<dyn CaptureBackend>,
    pub feed_slot: Arc<FeedSlot>,
}

impl CameraContext {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        tool: Arc<dyn ControlTool>,
        backend: Arc<dyn CaptureBackend>,
    ) -> Self {
        Self {
            registry,
            tool,
            backend,
            feed_slot: Arc::new(FeedSlot::default()),
        }
    }

    /// Production context: sysfs device discovery, `v4l2-ctl` and `v4l`.
    #[cfg(target_os = "linux")]
    pub fn system(config: &crate::config::VhdscanConfig) -> Self {
        use crate::platform::linux::{SysfsDeviceSource, V4lCaptureBackend};
        use crate::platform::V4l2Ctl;

        let source = SysfsDeviceSource::new(&config.devices.sysfs_root, &config.devices.dev_root);
        Self {
            registry: Arc::new(DeviceRegistry::new(Box::new(source))),
            tool: Arc::new(V4l2Ctl::new(config.camera.control_tool.clone())),
            backend: Arc::new(V4lCaptureBackend::new(config.camera.capture_buffers)),
            feed_slot: Arc::new(FeedSlot::new(config.camera.fps)),
        }
    }

    /// Scan for devices and keep polling for hot-plug changes at the
    /// configured `[devices] poll_interval_ms`. Needs a tokio runtime.
    pub async fn start_monitoring(
        &self,
        config: &crate::config::VhdscanConfig,
    ) -> Result<(), CameraError> {
        self.registry
            .start_monitoring(config.devices.poll_interval())
            .await
    }
}

#[derive(Default)]
struct State {
    status: Status,
    error: Option<ErrorCode>,
    device: Option<Arc<Device>>,
    resolution: Option<Resolution>,
    resolutions: Vec<Resolution>,
    controls: Vec<Control>,
    probing: bool,
    pipeline: Option<Pipeline>,
    /// Id of the pipeline allowed to report status. Cleared on stop and on
    /// pipeline failure.
    active_pipeline: Option<u64>,
    writer: Option<ControlWriter>,
    /// Last value queued per control, until the writer confirms or drops it.
    pending: HashMap<String, i64>,
}

impl State {
    /// The value a control will hold once queued writes land.
    fn requested_value(&self, control: &Control) -> i64 {
        self.pending
            .get(control.name())
            .copied()
            .unwrap_or_else(|| control.value())
    }

    fn settle_pending(&mut self, name: &str, value: i64) {
        if self.pending.get(name) == Some(&value) {
            self.pending.remove(name);
        }
    }
}

pub(crate) struct Inner {
    id: Uuid,
    slot: Option<Slot>,
    context: CameraContext,
    op_lock: Mutex<()>,
    state: Mutex<State>,
    observers: Observers,
    /// Bumped whenever the claimed device changes; completions started
    /// under an older epoch are discarded.
    epoch: AtomicU64,
    next_pipeline: AtomicU64,
    dropped_frames: AtomicU64,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn label(&self) -> String {
        match self.slot {
            Some(slot) => slot.to_string(),
            None => self.id.to_string(),
        }
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, event: CameraEvent) {
        self.observers.emit(event);
    }

    /// Transition and notify. Only error statuses carry a code.
    fn set_status(&self, state: &mut State, status: Status, error: Option<ErrorCode>) {
        let error = error.filter(|_| status.is_error());
        if state.status == status && state.error == error {
            return;
        }

        match error {
            Some(code) => log::warn!("Camera {}: {} -> {} ({})", self.label(), state.status, status, code),
            None => log::info!("Camera {}: {} -> {}", self.label(), state.status, status),
        }
        state.status = status;
        state.error = error;
        self.emit(CameraEvent::Status(status));
        if let Some(code) = error {
            self.emit(CameraEvent::Error(code));
        }
    }

    fn count_dropped_frame(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    fn pipeline_started(&self, id: u64) {
        let mut state = self.lock_state();
        if state.active_pipeline != Some(id) {
            return;
        }
        self.set_status(&mut state, Status::Feed, None);
        self.emit(CameraEvent::Started);
    }

    fn pipeline_failed(&self, id: u64, status: Status, code: ErrorCode) {
        let mut state = self.lock_state();
        if state.active_pipeline != Some(id) {
            log::debug!("Ignoring failure of superseded pipeline {}", id);
            return;
        }
        state.active_pipeline = None;
        self.context.feed_slot.release(self.id);
        self.set_status(&mut state, status, Some(code));
    }

    fn publish_frame(&self, id: u64, frame: FeedFrame) {
        let state = self.lock_state();
        if state.active_pipeline == Some(id) {
            self.emit(CameraEvent::Feed(frame));
        }
    }

    /// Spawn the capture pipeline. Requires `Idle` and a free feed slot.
    fn start_feed(self: &Arc<Self>, state: &mut State) -> Result<Outcome, CameraError> {
        if state.active_pipeline.is_some() {
            return Ok(Outcome::Unchanged);
        }
        if self
            .context
            .feed_slot
            .owner()
            .is_some_and(|owner| owner != self.id)
        {
            return Err(CameraError::BandwidthExceeded);
        }
        if state.status != Status::Idle || state.probing {
            return Err(CameraError::NotReady);
        }
        let device = state.device.clone().ok_or(CameraError::NotReady)?;
        let resolution = state
            .resolution
            .clone()
            .ok_or(CameraError::NoCurrentResolution)?;

        self.context.feed_slot.acquire(self.id)?;
        let id = self.next_pipeline.fetch_add(1, Ordering::SeqCst);
        log::debug!("Camera {}: starting pipeline {}", self.label(), id);

        // A leftover pipeline here has already failed; dropping it cancels
        // whatever is left of it.
        state.pipeline = None;
        match pipeline::spawn(self, id, device.name().to_string(), resolution) {
            Ok(pipeline) => {
                state.pipeline = Some(pipeline);
                state.active_pipeline = Some(id);
                self.set_status(state, Status::Init, None);
                Ok(Outcome::Applied)
            }
            Err(e) => {
                self.context.feed_slot.release(self.id);
                Err(e)
            }
        }
    }

    /// Join a pipeline that ended on its own.
    fn reap_pipeline(&self) {
        let finished = {
            let mut state = self.lock_state();
            if state.active_pipeline.is_some() {
                return;
            }
            state.pipeline.take()
        };
        if let Some(pipeline) = finished {
            let _ = pipeline.shutdown();
        }
    }

    /// Stop an active feed and wait for its threads. Caller holds the
    /// operation lock.
    fn stop_feed(&self) -> Outcome {
        let (pipeline, was_active) = {
            let mut state = self.lock_state();
            let was_active = state.active_pipeline.take().is_some();
            (state.pipeline.take(), was_active)
        };
        let Some(pipeline) = pipeline else {
            return Outcome::Unchanged;
        };

        let id = pipeline.id();
        if let Err(code) = pipeline.shutdown() {
            log::debug!("Pipeline {} ended with {}", id, code);
        }
        if !was_active {
            return Outcome::Unchanged;
        }

        let mut state = self.lock_state();
        self.context.feed_slot.release(self.id);
        self.set_status(&mut state, Status::Idle, None);
        self.emit(CameraEvent::Stopped);
        Outcome::Applied
    }

    /// Release the device and clear everything. Caller holds the operation
    /// lock.
    fn reset_locked(&self) {
        self.stop_feed();

        let mut state = self.lock_state();
        self.bump_epoch();
        state.probing = false;
        state.writer = None;
        state.pending.clear();
        if let Some(device) = state.device.take() {
            log::info!("Camera {}: releasing {}", self.label(), device.name());
            device.release();
        }
        state.resolution = None;
        state.resolutions.clear();
        state.controls.clear();
        self.set_status(&mut state, Status::Unset, None);
    }

    /// Claim-side of an assignment: the device is already marked in use.
    fn begin_probe(
        self: &Arc<Self>,
        device: Arc<Device>,
        resolution: Option<&str>,
        controls: Option<&ControlValues>,
        restart_feed: bool,
    ) -> Result<Outcome, CameraError> {
        let mut state = self.lock_state();
        let epoch = self.bump_epoch();

        if let Some(previous) = state.device.take() {
            if !Arc::ptr_eq(&previous, &device) {
                log::info!("Camera {}: releasing {}", self.label(), previous.name());
                previous.release();
            }
        }
        log::info!("Camera {}: probing {}", self.label(), device.display_name());

        state.device = Some(device.clone());
        state.resolution = None;
        state.resolutions.clear();
        state.controls.clear();
        state.writer = None;
        state.pending.clear();
        state.probing = true;
        self.set_status(&mut state, Status::Setup, None);

        let spawned = ControlWriter::spawn(
            Arc::downgrade(self),
            self.context.tool.clone(),
            device.name().to_string(),
        )
        .and_then(|writer| {
            state.writer = Some(writer);
            self.spawn_probe(device, epoch, resolution, controls, restart_feed)
        });

        if let Err(e) = spawned {
            state.probing = false;
            self.set_status(&mut state, Status::SetupError, Some(e.code()));
            return Err(e);
        }
        Ok(Outcome::Applied)
    }

    fn spawn_probe(
        self: &Arc<Self>,
        device: Arc<Device>,
        epoch: u64,
        resolution: Option<&str>,
        controls: Option<&ControlValues>,
        restart_feed: bool,
    ) -> Result<(), CameraError> {
        let inner = Arc::downgrade(self);
        let tool = self.context.tool.clone();
        let resolution = resolution.map(str::to_string);
        let controls = controls.cloned();

        thread::Builder::new()
            .name("vhdscan-probe".to_string())
            .spawn(move || {
                let result = probe::probe_device(
                    tool.as_ref(),
                    device.name(),
                    resolution.as_deref(),
                    controls.as_ref(),
                );
                if let Some(inner) = inner.upgrade() {
                    inner.finish_probe(epoch, result, restart_feed);
                }
            })
            .map(|_| ())
            .map_err(|e| CameraError::CameraIo(format!("Failed to spawn probe thread: {}", e)))
    }

    fn finish_probe(
        self: &Arc<Self>,
        epoch: u64,
        result: Result<ProbeResult, CameraError>,
        restart_feed: bool,
    ) {
        let mut state = self.lock_state();
        if self.epoch() != epoch {
            log::debug!("Camera {}: discarding stale probe result", self.label());
            return;
        }
        state.probing = false;

        match result {
            Ok(probed) => {
                state.resolutions = probed.resolutions;
                state.resolution = Some(probed.resolution);
                state.controls = probed.controls;
                self.set_status(&mut state, Status::Idle, None);
                self.emit(CameraEvent::Ready);

                if restart_feed {
                    if let Err(e) = self.start_feed(&mut state) {
                        log::warn!("Camera {}: could not resume feed: {}", self.label(), e);
                    }
                }
            }
            Err(e) => {
                log::warn!("Camera {}: probe failed: {}", self.label(), e);
                self.set_status(&mut state, Status::SetupError, Some(e.code()));
            }
        }
    }

    /// Apply a confirmed write. Returns true if the control gates others and
    /// sensitivity should be refreshed.
    fn finish_control_write(&self, epoch: u64, name: &str, value: i64) -> bool {
        let mut state = self.lock_state();
        if self.epoch() != epoch {
            return false;
        }
        state.settle_pending(name, value);
        let Some(control) = state.controls.iter_mut().find(|c| c.name() == name) else {
            return false;
        };
        control.set_value(value);
        let affects_others = control.affects_others();
        log::info!("Camera {}: {} = {}", self.label(), name, value);
        self.emit(CameraEvent::ControlChanged {
            name: name.to_string(),
            value,
        });
        affects_others
    }

    /// Forget a write the device refused.
    fn abandon_control_write(&self, epoch: u64, name: &str, value: i64) {
        let mut state = self.lock_state();
        if self.epoch() == epoch {
            state.settle_pending(name, value);
        }
    }

    fn apply_sensitivity(&self, epoch: u64, flags: Vec<(String, bool)>) {
        let mut state = self.lock_state();
        if self.epoch() != epoch {
            return;
        }
        for (name, inactive) in flags {
            if let Some(control) = state.controls.iter_mut().find(|c| c.name() == name) {
                control.set_inactive(inactive);
            }
        }
        self.emit(CameraEvent::SensitivityChanged);
    }

    /// Queue a control write. Caller checked that the camera is ready.
    fn dispatch_write(&self, state: &mut State, name: &str, value: i64) -> Result<(), CameraError> {
        let writer = state.writer.as_ref().ok_or(CameraError::NotReady)?;
        writer.submit(WriteJob::Control {
            name: name.to_string(),
            value,
            epoch: self.epoch(),
        })?;
        state.pending.insert(name.to_string(), value);
        Ok(())
    }

    /// Apply resolution and controls to the device already held.
    fn reconfigure(
        self: &Arc<Self>,
        resolution: Option<&str>,
        controls: Option<&ControlValues>,
    ) -> Result<Outcome, CameraError> {
        let requested = {
            let state = self.lock_state();
            resolution
                .and_then(|key| match key.parse::<Resolution>() {
                    Ok(resolution) if state.resolutions.contains(&resolution) => Some(resolution),
                    _ => {
                        log::warn!("Camera {}: ignoring unsupported resolution {}", self.label(), key);
                        None
                    }
                })
                .filter(|resolution| state.resolution.as_ref() != Some(resolution))
        };

        let restart = match requested {
            Some(_) => self.stop_feed().is_applied(),
            None => false,
        };

        let mut state = self.lock_state();
        if let Some(resolution) = requested {
            log::info!("Camera {}: resolution {}", self.label(), resolution);
            state.resolution = Some(resolution);
            self.emit(CameraEvent::ResolutionChanged);
        }

        if let Some(requested) = controls {
            for (name, value) in requested {
                let Some(control) = state.controls.iter().find(|c| c.name() == name) else {
                    continue;
                };
                if state.requested_value(control) == *value {
                    continue;
                }
                if let Err(e) = control
                    .validate(*value)
                    .and_then(|()| self.dispatch_write(&mut state, name, *value))
                {
                    log::warn!("Camera {}: skipping {}={}: {}", self.label(), name, value, e);
                }
            }
        }

        self.emit(CameraEvent::Ready);
        if restart {
            if let Err(e) = self.start_feed(&mut state) {
                log::warn!("Camera {}: could not resume feed: {}", self.label(), e);
            }
        }
        Ok(Outcome::Applied)
    }
}

/// One logical camera bound to at most one device.
///
/// Dropping a camera stops its feed and releases its device.
pub struct Camera {
    inner: Arc<Inner>,
}

impl Camera {
    pub fn new(context: &CameraContext, slot: Option<Slot>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                slot,
                context: context.clone(),
                op_lock: Mutex::new(()),
                state: Mutex::new(State::default()),
                observers: Observers::default(),
                epoch: AtomicU64::new(0),
                next_pipeline: AtomicU64::new(1),
                dropped_frames: AtomicU64::new(0),
            }),
        }
    }

    fn op_lock(&self) -> MutexGuard<'_, ()> {
        self.inner.op_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Receive this camera's events from now on. Frames are skipped for a
    /// receiver that has [`MAX_QUEUED_FRAMES`] events waiting.
    pub fn subscribe(&self) -> Receiver<CameraEvent> {
        self.inner.observers.subscribe()
    }

    /// Assign a device, or clear the camera with `None`.
    ///
    /// A new device is claimed and probed in the background; `Ready` follows
    /// on success. Assigning the device already held applies the resolution
    /// and controls directly. Clearing is always accepted; anything else is
    /// rejected while a probe is in flight.
    pub fn assign(
        &self,
        device: Option<Arc<Device>>,
        resolution: Option<&str>,
        controls: Option<&ControlValues>,
    ) -> Result<Outcome, CameraError> {
        let _op = self.op_lock();
        let inner = &self.inner;

        let Some(device) = device else {
            inner.reset_locked();
            let _state = inner.lock_state();
            inner.emit(CameraEvent::Ready);
            return Ok(Outcome::Applied);
        };

        let (same_device, ready) = {
            let state = inner.lock_state();
            if state.probing {
                return Err(CameraError::ProbeInFlight);
            }
            let same = state
                .device
                .as_ref()
                .is_some_and(|held| Arc::ptr_eq(held, &device));
            (same, state.status.is_ready())
        };

        if same_device {
            if ready {
                return inner.reconfigure(resolution, controls);
            }
            // Retry a failed device without giving up the claim.
            inner.reap_pipeline();
            return inner.begin_probe(device, resolution, controls, false);
        }

        if !device.claim() {
            return Err(CameraError::DeviceBusy(device.name().to_string()));
        }
        log::info!("Camera {}: claimed {}", inner.label(), device.name());
        let was_feeding = inner.stop_feed().is_applied();
        inner.begin_probe(device, resolution, controls, was_feeding)
    }

    /// Assign the first free device with this id. An empty id clears.
    pub fn set_device_by_id(
        &self,
        id: &str,
        resolution: Option<&str>,
        controls: Option<&ControlValues>,
    ) -> Result<Outcome, CameraError> {
        if id.is_empty() {
            return self.assign(None, None, None);
        }
        let device = self
            .held_device(|device| device.id() == id)
            .or_else(|| self.inner.context.registry.get_device_by_id(id))
            .ok_or_else(|| CameraError::DeviceBusy(format!("No free device with id {}", id)))?;
        self.assign(Some(device), resolution, controls)
    }

    /// Assign the free device with this node name. An empty name clears.
    pub fn set_device_by_name(
        &self,
        name: &str,
        resolution: Option<&str>,
        controls: Option<&ControlValues>,
    ) -> Result<Outcome, CameraError> {
        if name.is_empty() {
            return self.assign(None, None, None);
        }
        let device = self
            .held_device(|device| device.name() == name)
            .or_else(|| self.inner.context.registry.get_device_by_name(name))
            .ok_or_else(|| CameraError::DeviceBusy(format!("No free device named {}", name)))?;
        self.assign(Some(device), resolution, controls)
    }

    fn held_device(&self, predicate: impl Fn(&Device) -> bool) -> Option<Arc<Device>> {
        self.inner
            .lock_state()
            .device
            .clone()
            .filter(|device| predicate(device))
    }

    /// Switch to a supported capture mode, restarting a running feed.
    pub fn set_resolution(&self, key: &str) -> Result<Outcome, CameraError> {
        let _op = self.op_lock();
        let inner = &self.inner;

        let resolution = {
            let state = inner.lock_state();
            if !state.status.is_ready() || state.probing {
                return Err(CameraError::NotReady);
            }
            let resolution: Resolution = key.parse()?;
            if state.resolution.as_ref() == Some(&resolution) {
                return Ok(Outcome::Unchanged);
            }
            if !state.resolutions.contains(&resolution) {
                return Err(CameraError::UnsupportedResolution(key.to_string()));
            }
            resolution
        };

        let restart = inner.stop_feed().is_applied();

        let mut state = inner.lock_state();
        log::info!("Camera {}: resolution {}", inner.label(), resolution);
        state.resolution = Some(resolution);
        inner.emit(CameraEvent::ResolutionChanged);
        if restart {
            if let Err(e) = inner.start_feed(&mut state) {
                log::warn!("Camera {}: could not resume feed: {}", inner.label(), e);
            }
        }
        Ok(Outcome::Applied)
    }

    /// Write a control value on the control worker. The stored value changes
    /// once the device confirms the write (`ControlChanged`). A request is
    /// `Unchanged` only when it matches the last value asked for.
    pub fn set_control(&self, name: &str, value: i64) -> Result<Outcome, CameraError> {
        let _op = self.op_lock();
        let mut state = self.inner.lock_state();
        if !state.status.is_ready() || state.probing {
            return Err(CameraError::NotReady);
        }
        let control = state
            .controls
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| CameraError::UnknownControl(name.to_string()))?;
        if state.requested_value(control) == value {
            return Ok(Outcome::Unchanged);
        }
        control.validate(value)?;

        self.inner.dispatch_write(&mut state, name, value)?;
        Ok(Outcome::Applied)
    }

    /// Re-read which controls are currently inactive.
    pub fn update_sensitivity(&self) -> Result<Outcome, CameraError> {
        let _op = self.op_lock();
        let state = self.inner.lock_state();
        if !state.status.is_ready() || state.probing {
            return Err(CameraError::NotReady);
        }
        let writer = state.writer.as_ref().ok_or(CameraError::NotReady)?;
        writer.submit(WriteJob::Sensitivity {
            epoch: self.inner.epoch(),
        })?;
        Ok(Outcome::Applied)
    }

    /// Start the capture pipeline. Fails with `BandwidthExceeded` while any
    /// other camera feeds.
    pub fn start(&self) -> Result<Outcome, CameraError> {
        let _op = self.op_lock();
        self.inner.reap_pipeline();
        let mut state = self.inner.lock_state();
        self.inner.start_feed(&mut state)
    }

    /// Stop the feed and wait until the device handle is closed.
    pub fn stop(&self) -> Outcome {
        let _op = self.op_lock();
        self.inner.stop_feed()
    }

    /// Release the device and return to `Unset`.
    pub fn reset(&self) {
        let _op = self.op_lock();
        self.inner.reset_locked();
    }

    /// Apply a persisted setup: find its device (by id and name, then by id
    /// alone) and assign it with the stored resolution and controls.
    pub fn set_setup(&self, setup: &Setup) -> Result<Outcome, CameraError> {
        if self.inner.lock_state().probing {
            return Err(CameraError::ProbeInFlight);
        }
        if setup.is_empty() {
            return self.assign(None, None, None);
        }

        let device = self
            .held_device(|device| device.id() == setup.id && device.name() == setup.udev_name)
            .or_else(|| {
                self.inner
                    .context
                    .registry
                    .get_device(&setup.id, &setup.udev_name)
            });

        match device {
            Some(device) => self.assign(
                Some(device),
                setup.resolution_key(),
                Some(&setup.controls),
            ),
            None => {
                log::warn!(
                    "Camera {}: device {} ({}) is not available",
                    self.inner.label(),
                    setup.id,
                    setup.udev_name
                );
                self.assign(None, None, None)?;
                Err(CameraError::DeviceBusy(format!(
                    "Device {} is not available",
                    setup.id
                )))
            }
        }
    }

    pub fn get_setup(&self) -> Setup {
        let state = self.inner.lock_state();
        Setup::new(
            state.device.as_deref(),
            state.resolution.as_ref(),
            state.controls.iter().cloned(),
        )
    }

    pub fn save(&self) -> serde_json::Value {
        self.get_setup().save()
    }

    pub fn open(&self, value: serde_json::Value) -> Result<Outcome, CameraError> {
        let setup = Setup::from_value(value)?;
        self.set_setup(&setup)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn slot(&self) -> Option<Slot> {
        self.inner.slot
    }

    pub fn status(&self) -> Status {
        self.inner.lock_state().status
    }

    /// Code of the current error status, if any.
    pub fn error(&self) -> Option<ErrorCode> {
        self.inner.lock_state().error
    }

    pub fn is_probing(&self) -> bool {
        self.inner.lock_state().probing
    }

    pub fn device(&self) -> Option<Arc<Device>> {
        self.inner.lock_state().device.clone()
    }

    /// Node name of the device once it is usable.
    pub fn device_name(&self) -> Option<String> {
        let state = self.inner.lock_state();
        if !state.status.is_ready() {
            return None;
        }
        state.device.as_ref().map(|d| d.name().to_string())
    }

    pub fn model_name(&self, fallback: &str) -> String {
        self.inner
            .lock_state()
            .device
            .as_ref()
            .map(|d| d.model().to_string())
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.inner.lock_state().resolution.clone()
    }

    /// Supported capture modes, in device order.
    pub fn resolutions(&self) -> Vec<Resolution> {
        self.inner.lock_state().resolutions.clone()
    }

    /// Controls, in device order.
    pub fn controls(&self) -> Vec<Control> {
        self.inner.lock_state().controls.clone()
    }

    pub fn control(&self, name: &str) -> Option<Control> {
        self.inner
            .lock_state()
            .controls
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub fn is_feeding(&self) -> bool {
        self.inner.lock_state().active_pipeline.is_some()
    }

    /// Frames overwritten before the publish thread consumed them.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn context(&self) -> &CameraContext {
        &self.inner.context
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.reset();
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Camera")
            .field("id", &self.inner.id)
            .field("slot", &self.inner.slot)
            .field("status", &state.status)
            .field("device", &state.device.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{device_info, ScriptedControlTool, StaticDeviceSource, SyntheticBackend};
    use std::time::{Duration, Instant};

    fn context() -> CameraContext {
        let source = StaticDeviceSource::new(vec![device_info(0), device_info(1)]);
        let registry = Arc::new(DeviceRegistry::new(Box::new(source)));
        registry.refresh().unwrap();
        CameraContext::new(
            registry,
            Arc::new(ScriptedControlTool::new()),
            Arc::new(SyntheticBackend::new()),
        )
    }

    fn wait_for(camera: &Camera, status: Status) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while camera.status() != status {
            assert!(Instant::now() < deadline, "timed out waiting for {status}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_new_camera_is_unset() {
        let camera = Camera::new(&context(), Some(Slot::Left));
        assert_eq!(camera.status(), Status::Unset);
        assert_eq!(camera.error(), None);
        assert_eq!(camera.model_name("none"), "none");
        assert!(!camera.is_feeding());
    }

    #[test]
    fn test_operations_require_ready() {
        let camera = Camera::new(&context(), None);
        assert!(matches!(camera.set_resolution("320x240xRGB3"), Err(CameraError::NotReady)));
        assert!(matches!(camera.set_control("brightness", 3), Err(CameraError::NotReady)));
        assert!(matches!(camera.start(), Err(CameraError::NotReady)));
        assert!(matches!(camera.update_sensitivity(), Err(CameraError::NotReady)));
        assert_eq!(camera.stop(), Outcome::Unchanged);
    }

    #[test]
    fn test_drop_releases_device() {
        let context = context();
        let device = context.registry.devices()[0].clone();
        {
            let camera = Camera::new(&context, None);
            camera.assign(Some(device.clone()), None, None).unwrap();
            wait_for(&camera, Status::Idle);
            assert!(device.is_in_use());
        }
        assert!(!device.is_in_use());
    }

    #[test]
    fn test_set_status_skips_repeats() {
        let camera = Camera::new(&context(), None);
        let events = camera.subscribe();
        {
            let mut state = camera.inner.lock_state();
            camera.inner.set_status(&mut state, Status::Unset, None);
            camera
                .inner
                .set_status(&mut state, Status::InitError, Some(ErrorCode::DeviceBusy));
        }
        assert!(matches!(events.try_recv(), Ok(CameraEvent::Status(Status::InitError))));
        assert!(matches!(events.try_recv(), Ok(CameraEvent::Error(ErrorCode::DeviceBusy))));
        assert!(events.try_recv().is_err());
    }
}
