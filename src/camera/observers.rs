use crate::types::CameraEvent;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Mutex;

/// A subscriber with this many undelivered events gets no new frames until
/// it catches up. Other events are always queued.
pub const MAX_QUEUED_FRAMES: usize = 4;

/// Per-camera event fan-out. Subscribers whose receiver was dropped are
/// pruned on the next emit.
#[derive(Default)]
pub(crate) struct Observers {
    senders: Mutex<Vec<Sender<CameraEvent>>>,
}

impl Observers {
    pub fn subscribe(&self) -> Receiver<CameraEvent> {
        let (tx, rx) = unbounded();
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub fn emit(&self, event: CameraEvent) {
        let is_frame = matches!(event, CameraEvent::Feed(_));
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|tx| {
            if is_frame && tx.len() >= MAX_QUEUED_FRAMES {
                return true;
            }
            tx.send(event.clone()).is_ok()
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
