//! The animator object handed to scripts

use crate::engine::terminated;
use rhai::EvalAltResult;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vfd_display::{lock_display, SharedDisplay};

/// Real sleeps are split into slices so cancellation is noticed promptly
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Longest single `frame_sleep` honoured in real time
const MAX_SLEEP_SECS: f64 = 60.0;

/// How `frame_sleep` relates to wall time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep for real (live playback)
    RealTime,
    /// Only advance the simulated clock (validation)
    Simulated,
}

/// Script-facing handle to a display
///
/// Clones share the clock, the frame counter and the cancel flag, so helper
/// functions that receive a copy still advance the caller's timeline.
#[derive(Clone)]
pub struct ScriptAnimator {
    display: SharedDisplay,
    frame_rate: f64,
    pacing: Pacing,
    clock: Arc<AtomicU64>,
    frames: Arc<AtomicUsize>,
    cancel: Arc<AtomicBool>,
}

impl ScriptAnimator {
    pub fn new(display: SharedDisplay, frame_rate: f64, pacing: Pacing) -> Self {
        Self {
            display,
            frame_rate,
            pacing,
            clock: Arc::new(AtomicU64::new(0f64.to_bits())),
            frames: Arc::new(AtomicUsize::new(0)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally owned cancel flag
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn frame_rate(&mut self) -> f64 {
        self.frame_rate
    }

    /// Simulated seconds since the animation started
    pub fn elapsed(&mut self) -> f64 {
        f64::from_bits(self.clock.load(Ordering::Acquire))
    }

    pub fn frames_written(&self) -> usize {
        self.frames.load(Ordering::Acquire)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn write_frame(&mut self, line1: &str, line2: &str) -> Result<(), Box<EvalAltResult>> {
        if self.cancelled() {
            return Err(terminated());
        }
        let mut display = lock_display(&self.display).map_err(|e| e.to_string())?;
        display
            .write_frame(line1, line2)
            .map_err(|e| format!("write_frame failed: {}", e))?;
        self.frames.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), Box<EvalAltResult>> {
        let mut display = lock_display(&self.display).map_err(|e| e.to_string())?;
        display.clear().map_err(|e| format!("clear failed: {}", e).into())
    }

    pub fn frame_sleep(&mut self, seconds: f64) -> Result<(), Box<EvalAltResult>> {
        let seconds = if seconds.is_finite() {
            seconds.clamp(0.0, MAX_SLEEP_SECS)
        } else {
            0.0
        };

        if self.pacing == Pacing::RealTime {
            let deadline = Instant::now() + Duration::from_secs_f64(seconds);
            loop {
                if self.cancelled() {
                    return Err(terminated());
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                std::thread::sleep(SLEEP_SLICE.min(deadline - now));
            }
        } else if self.cancelled() {
            return Err(terminated());
        }

        let _ = self
            .clock
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + seconds).to_bits())
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfd_display::{shared, CapturingDisplay};

    #[test]
    fn test_simulated_clock_is_shared_between_clones() {
        let display = CapturingDisplay::new("clock");
        let mut animator = ScriptAnimator::new(shared(display), 60.0, Pacing::Simulated);
        let mut helper = animator.clone();

        animator.frame_sleep(0.25).unwrap();
        helper.frame_sleep(0.5).unwrap();
        assert!((animator.elapsed() - 0.75).abs() < 1e-9);

        // Nonsense durations do not move the clock
        animator.frame_sleep(f64::NAN).unwrap();
        animator.frame_sleep(-3.0).unwrap();
        assert!((animator.elapsed() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_write_frame_counts_and_captures() {
        let display = CapturingDisplay::new("frames");
        let log = display.log();
        let mut animator = ScriptAnimator::new(shared(display), 6.0, Pacing::Simulated);

        animator.write_frame("*", "").unwrap();
        animator.write_frame("", "*").unwrap();
        assert_eq!(animator.frames_written(), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_cancelled_sleep_returns_error() {
        let display = CapturingDisplay::new("cancel");
        let mut animator = ScriptAnimator::new(shared(display), 6.0, Pacing::RealTime);
        animator.cancel_flag().store(true, Ordering::Release);

        let started = Instant::now();
        assert!(animator.frame_sleep(30.0).is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(animator.write_frame("a", "b").is_err());
    }
}
