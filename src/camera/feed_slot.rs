use crate::errors::CameraError;
use crate::types::Outcome;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub const DEFAULT_FPS: u32 = 15;
pub const MAX_FPS: u32 = 120;

/// Process-wide capture budget: at most one camera feeds at a time.
///
/// Also carries the publish rate, which is shared by every camera.
#[derive(Debug)]
pub struct FeedSlot {
    owner: Mutex<Option<Uuid>>,
    fps: AtomicU32,
}

impl Default for FeedSlot {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

impl FeedSlot {
    pub fn new(fps: u32) -> Self {
        Self {
            owner: Mutex::new(None),
            fps: AtomicU32::new(fps.clamp(1, MAX_FPS)),
        }
    }

    /// Camera currently holding the slot.
    pub fn owner(&self) -> Option<Uuid> {
        *self.owner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.owner().is_some()
    }

    pub(crate) fn acquire(&self, camera: Uuid) -> Result<Outcome, CameraError> {
        let mut owner = self.owner.lock().unwrap_or_else(|e| e.into_inner());
        match *owner {
            None => {
                *owner = Some(camera);
                Ok(Outcome::Applied)
            }
            Some(current) if current == camera => Ok(Outcome::Unchanged),
            Some(_) => Err(CameraError::BandwidthExceeded),
        }
    }

    /// Free the slot if `camera` holds it.
    pub(crate) fn release(&self, camera: Uuid) -> bool {
        let mut owner = self.owner.lock().unwrap_or_else(|e| e.into_inner());
        if *owner == Some(camera) {
            *owner = None;
            true
        } else {
            false
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    /// Set the publish rate, clamped to `1..=120`. Running feeds pick it up
    /// on their next tick.
    pub fn set_fps(&self, fps: u32) {
        self.fps.store(fps.clamp(1, MAX_FPS), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_owner() {
        let slot = FeedSlot::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(slot.acquire(a).unwrap(), Outcome::Applied);
        assert_eq!(slot.acquire(a).unwrap(), Outcome::Unchanged);
        assert!(matches!(slot.acquire(b), Err(CameraError::BandwidthExceeded)));

        assert!(!slot.release(b));
        assert!(slot.release(a));
        assert_eq!(slot.acquire(b).unwrap(), Outcome::Applied);
        assert_eq!(slot.owner(), Some(b));
    }

    #[test]
    fn test_fps_is_clamped() {
        let slot = FeedSlot::default();
        assert_eq!(slot.fps(), DEFAULT_FPS);
        slot.set_fps(0);
        assert_eq!(slot.fps(), 1);
        slot.set_fps(1000);
        assert_eq!(slot.fps(), MAX_FPS);
    }
}
