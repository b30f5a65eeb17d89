//! Device registry and hot-plug detection
//!
//! Keeps the authoritative list of connected capture devices, gates exclusive
//! claims through each device's `in_use` flag and reports connect/disconnect
//! events found by periodic rescans.

use crate::errors::CameraError;
use crate::platform::{DeviceInfo, DeviceSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// A device currently (or formerly) visible to the OS.
#[derive(Debug)]
pub struct Device {
    id: String,
    name: String,
    vendor: String,
    model: String,
    in_use: AtomicBool,
    present: AtomicBool,
}

impl Device {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            id: device_id(&info),
            name: info.name,
            vendor: info.vendor.replace('_', " "),
            model: info.model.replace('_', " "),
            in_use: AtomicBool::new(false),
            present: AtomicBool::new(true),
        }
    }

    /// Stable identity, `VENDORID:MODELID:REVISION`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Device node, e.g. `/dev/video0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn display_name(&self) -> String {
        format!("{} ({})", self.model, self.name)
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Mark the device as exclusively used. Returns false if it already was.
    pub fn claim(&self) -> bool {
        self.in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn release(&self) {
        self.in_use.store(false, Ordering::SeqCst);
    }

    /// False once the registry has seen the device disappear.
    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn matches(&self, info: &DeviceInfo) -> bool {
        self.name == info.name && self.id == device_id(info)
    }
}

fn device_id(info: &DeviceInfo) -> String {
    let hex = |s: &str| {
        if s.is_empty() {
            "0000".to_string()
        } else {
            s.to_uppercase()
        }
    };
    format!(
        "{}:{}:{}",
        hex(&info.vendor_id),
        hex(&info.model_id),
        hex(&info.revision)
    )
}

/// Device event types
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Connected(Arc<Device>),
    Disconnected(Arc<Device>),
}

impl DeviceEvent {
    pub fn device(&self) -> &Arc<Device> {
        match self {
            DeviceEvent::Connected(device) | DeviceEvent::Disconnected(device) => device,
        }
    }
}

/// Registry of capture devices with optional hot-plug monitoring
pub struct DeviceRegistry {
    source: Box<dyn DeviceSource>,
    devices: RwLock<Vec<Arc<Device>>>,
    event_sender: mpsc::UnboundedSender<DeviceEvent>,
    event_receiver: Mutex<mpsc::UnboundedReceiver<DeviceEvent>>,
    is_monitoring: Arc<AtomicBool>,
}

impl DeviceRegistry {
    /// Create an empty registry. Call [`refresh`](Self::refresh) or
    /// [`start_monitoring`](Self::start_monitoring) to populate it.
    pub fn new(source: Box<dyn DeviceSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            source,
            devices: RwLock::new(Vec::new()),
            event_sender: tx,
            event_receiver: Mutex::new(rx),
            is_monitoring: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Rescan the source and reconcile the visible set.
    ///
    /// Returns the connect/disconnect events that were also queued for
    /// [`poll_event`](Self::poll_event).
    pub fn refresh(&self) -> Result<Vec<DeviceEvent>, CameraError> {
        let scanned: Vec<DeviceInfo> = self
            .source
            .scan()?
            .into_iter()
            .filter(|info| info.can_capture)
            .collect();

        let mut events = Vec::new();
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());

        devices.retain(|device| {
            let still_present = scanned.iter().any(|info| device.matches(info));
            if !still_present {
                log::info!("Device disconnected: {} ({})", device.name(), device.id());
                device.present.store(false, Ordering::SeqCst);
                events.push(DeviceEvent::Disconnected(device.clone()));
            }
            still_present
        });

        for info in scanned {
            if devices.iter().any(|device| device.matches(&info)) {
                continue;
            }
            let device = Arc::new(Device::new(info));
            log::info!("Device connected: {} ({})", device.name(), device.id());
            events.push(DeviceEvent::Connected(device.clone()));
            devices.push(device);
        }
        drop(devices);

        for event in &events {
            let _ = self.event_sender.send(event.clone());
        }
        Ok(events)
    }

    /// Snapshot of the visible devices, claimed or not.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn find(&self, predicate: impl Fn(&Device) -> bool) -> Option<Arc<Device>> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|device| !device.is_in_use() && predicate(device))
            .cloned()
    }

    /// First unclaimed device with the given id.
    pub fn get_device_by_id(&self, id: &str) -> Option<Arc<Device>> {
        if id.is_empty() {
            return None;
        }
        self.find(|device| device.id() == id)
    }

    /// Unclaimed device with the given node name.
    pub fn get_device_by_name(&self, name: &str) -> Option<Arc<Device>> {
        if name.is_empty() {
            return None;
        }
        self.find(|device| device.name() == name)
    }

    /// Unclaimed device matching both id and name, else the first unclaimed
    /// device with the id.
    pub fn get_device(&self, id: &str, name: &str) -> Option<Arc<Device>> {
        if !id.is_empty() && !name.is_empty() {
            if let Some(device) = self.find(|device| device.id() == id && device.name() == name) {
                return Some(device);
            }
        }
        self.get_device_by_id(id)
    }

    /// Start polling the source for changes.
    pub async fn start_monitoring(self: &Arc<Self>, interval: Duration) -> Result<(), CameraError> {
        if self.is_monitoring.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        log::info!("Starting device monitoring every {:?}", interval);

        let registry = self.clone();
        let initial = tokio::task::spawn_blocking(move || registry.refresh())
            .await
            .map_err(|e| CameraError::Config(format!("Device scan task failed: {}", e)))
            .and_then(|result| result);
        if let Err(e) = initial {
            self.is_monitoring.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let registry = self.clone();
        let is_monitoring = self.is_monitoring.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            while is_monitoring.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !is_monitoring.load(Ordering::SeqCst) {
                    break;
                }

                let registry = registry.clone();
                match tokio::task::spawn_blocking(move || registry.refresh()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::warn!("Device scan failed: {}", e),
                    Err(e) => log::warn!("Device scan task failed: {}", e),
                }
            }
            log::debug!("Device monitoring task finished");
        });

        Ok(())
    }

    /// Stop polling for device changes
    pub async fn stop_monitoring(&self) {
        if self.is_monitoring.swap(false, Ordering::SeqCst) {
            log::info!("Stopping device monitoring");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.is_monitoring.load(Ordering::SeqCst)
    }

    /// Get next device event (non-blocking)
    pub async fn poll_event(&self) -> Option<DeviceEvent> {
        let mut rx = self.event_receiver.lock().await;
        rx.try_recv().ok()
    }

    /// Wait for next device event
    pub async fn wait_for_event(&self) -> Option<DeviceEvent> {
        let mut rx = self.event_receiver.lock().await;
        rx.recv().await
    }
}
