//! Cooperative shutdown shared by every long-lived unit

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Running flag plus the cancel flag handed to playing scripts
#[derive(Debug, Clone)]
pub struct Shutdown {
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop all loops and interrupt the animation that is playing
    pub fn trigger(&self) {
        self.running.store(false, Ordering::Release);
        self.cancel.store(true, Ordering::Release);
    }

    /// Flag that stays `true` until shutdown
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Flag that becomes `true` on shutdown
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_flips_both_flags() {
        let shutdown = Shutdown::new();
        let running = shutdown.running_flag();
        let cancel = shutdown.cancel_flag();
        assert!(shutdown.is_running());

        shutdown.clone().trigger();
        assert!(!running.load(Ordering::Acquire));
        assert!(cancel.load(Ordering::Acquire));
    }
}
