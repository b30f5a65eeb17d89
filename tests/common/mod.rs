//! Shared harness for camera integration tests: two synthetic devices, a
//! scripted control tool and a synthetic capture backend.
#![allow(dead_code)]

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vhdscan::testing::{device_info, ScriptedControlTool, StaticDeviceSource, SyntheticBackend};
use vhdscan::{Camera, CameraContext, CameraEvent, Device, DeviceRegistry, Slot, Status};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub source: StaticDeviceSource,
    pub tool: ScriptedControlTool,
    pub backend: SyntheticBackend,
    pub context: CameraContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tool(ScriptedControlTool::new())
    }

    pub fn with_tool(tool: ScriptedControlTool) -> Self {
        let source = StaticDeviceSource::new(vec![device_info(0), device_info(1)]);
        let registry = Arc::new(DeviceRegistry::new(Box::new(source.clone())));
        registry.refresh().unwrap();

        let backend = SyntheticBackend::new();
        let context = CameraContext::new(
            registry,
            Arc::new(tool.clone()),
            Arc::new(backend.clone()),
        );
        context.feed_slot.set_fps(60);

        Self {
            source,
            tool,
            backend,
            context,
        }
    }

    pub fn device(&self, index: usize) -> Arc<Device> {
        self.context.registry.devices()[index].clone()
    }

    pub fn camera(&self, slot: Slot) -> Camera {
        Camera::new(&self.context, Some(slot))
    }

    /// A camera that finished probing device `index`.
    pub fn ready_camera(&self, slot: Slot, index: usize) -> (Camera, Receiver<CameraEvent>) {
        let camera = self.camera(slot);
        let events = camera.subscribe();
        camera.assign(Some(self.device(index)), None, None).unwrap();
        wait_for_event(&events, |e| matches!(e, CameraEvent::Ready));
        assert_eq!(camera.status(), Status::Idle);
        (camera, events)
    }
}

pub fn wait_for_status(camera: &Camera, status: Status) {
    let deadline = Instant::now() + TIMEOUT;
    while camera.status() != status {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {status}, camera is {}",
            camera.status()
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Events up to and including the first one matching `done`.
pub fn collect_until(
    events: &Receiver<CameraEvent>,
    done: impl Fn(&CameraEvent) -> bool,
) -> Vec<CameraEvent> {
    let deadline = Instant::now() + TIMEOUT;
    let mut seen = Vec::new();
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .unwrap_or_else(|| panic!("timed out; events so far: {seen:?}"));
        match events.recv_timeout(remaining) {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
            Err(_) => panic!("timed out; events so far: {seen:?}"),
        }
    }
}

pub fn wait_for_event(
    events: &Receiver<CameraEvent>,
    done: impl Fn(&CameraEvent) -> bool,
) -> CameraEvent {
    collect_until(events, done)
        .pop()
        .expect("collect_until returns the matching event")
}

/// Everything queued right now, after giving workers `settle` to finish.
pub fn drain(events: &Receiver<CameraEvent>, settle: Duration) -> Vec<CameraEvent> {
    std::thread::sleep(settle);
    events.try_iter().collect()
}

pub fn count(events: &[CameraEvent], pred: impl Fn(&CameraEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}
