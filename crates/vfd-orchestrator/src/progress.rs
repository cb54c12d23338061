//! Startup progress and the loading indicator
//!
//! The indicator owns the live display until the first animation is ready.
//! It only redraws when the whole-number percentage changes, so a slow
//! generation does not flood the serial line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use vfd_core::{center_line, Frame, Result};
use vfd_display::{lock_display, SharedDisplay};

/// Cells in the loading bar
const BAR_CELLS: usize = 10;
const REFRESH: Duration = Duration::from_millis(100);
/// How long the full bar stays up before the display is cleared
const COMPLETE_HOLD: Duration = Duration::from_millis(150);

/// Fractional progress toward a target, shared between threads
#[derive(Debug)]
pub struct ProgressTracker {
    inner: Mutex<Progress>,
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    current: f64,
    target: f64,
}

impl ProgressTracker {
    pub fn new(target: f64) -> Self {
        Self {
            inner: Mutex::new(Progress {
                current: 0.0,
                target,
            }),
        }
    }

    /// Set progress, clamped to the target
    pub fn set_progress(&self, value: f64) {
        if let Ok(mut progress) = self.inner.lock() {
            progress.current = value.min(progress.target).max(0.0);
        }
    }

    /// `(current, target)`
    pub fn get(&self) -> (f64, f64) {
        self.inner
            .lock()
            .map(|p| (p.current, p.target))
            .unwrap_or((0.0, 0.0))
    }

    pub fn fraction(&self) -> f64 {
        let (current, target) = self.get();
        if target > 0.0 {
            current / target
        } else {
            0.0
        }
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor().clamp(0.0, 100.0) as u8
    }

    pub fn is_complete(&self) -> bool {
        let (current, target) = self.get();
        current >= target
    }
}

/// Two-row loading frame for a percentage
pub fn render_loading(percent: u8) -> Frame {
    let percent = percent.min(100);
    let filled = usize::from(percent) * BAR_CELLS / 100;
    let bar = format!("[{}{}]", "█".repeat(filled), " ".repeat(BAR_CELLS - filled));
    Frame::new(
        &center_line(&format!("LOADING {:03}%", percent)),
        &center_line(&bar),
    )
}

/// Frame shown once generation has caught up
pub fn render_complete() -> Frame {
    Frame::new(
        &center_line("LOADING 100%"),
        &center_line(&"█".repeat(BAR_CELLS)),
    )
}

/// Draw the loading indicator until progress completes or `active` drops
///
/// Blocking; run it on a blocking worker.
pub fn run_loading_indicator(
    display: SharedDisplay,
    progress: Arc<ProgressTracker>,
    active: Arc<AtomicBool>,
) {
    if let Err(e) = draw_until_done(&display, &progress, &active) {
        debug!("Loading error: {}", e);
    }
    active.store(false, Ordering::Release);
}

fn draw_until_done(
    display: &SharedDisplay,
    progress: &ProgressTracker,
    active: &AtomicBool,
) -> Result<()> {
    let mut last_percent = None;

    while active.load(Ordering::Acquire) {
        if progress.is_complete() {
            let frame = render_complete();
            lock_display(display)?.write_frame(&frame.line1, &frame.line2)?;
            std::thread::sleep(COMPLETE_HOLD);
            lock_display(display)?.clear()?;
            return Ok(());
        }

        let percent = progress.percent();
        if last_percent != Some(percent) {
            let frame = render_loading(percent);
            lock_display(display)?.write_frame(&frame.line1, &frame.line2)?;
            last_percent = Some(percent);
        }
        std::thread::sleep(REFRESH);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfd_display::{shared, CapturingDisplay};

    #[test]
    fn test_progress_clamps_to_target() {
        let tracker = ProgressTracker::new(2.0);
        tracker.set_progress(0.9);
        assert_eq!(tracker.percent(), 45);
        tracker.set_progress(7.0);
        assert_eq!(tracker.get(), (2.0, 2.0));
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_render_loading() {
        let frame = render_loading(45);
        assert_eq!(frame.line1.trim(), "LOADING 045%");
        assert_eq!(frame.line2.trim(), "[████      ]");
        assert_eq!(frame.line2.chars().count(), 20);

        assert_eq!(render_loading(0).line2.trim(), "[          ]");
        assert_eq!(render_loading(100).line2.trim(), "[██████████]");
    }

    #[test]
    fn test_indicator_finishes_on_completion() {
        let display = CapturingDisplay::new("loading");
        let log = display.log();
        let progress = Arc::new(ProgressTracker::new(1.0));
        let active = Arc::new(AtomicBool::new(true));

        progress.set_progress(0.5);
        let worker = {
            let (progress, active) = (Arc::clone(&progress), Arc::clone(&active));
            std::thread::spawn(move || run_loading_indicator(shared(display), progress, active))
        };
        std::thread::sleep(Duration::from_millis(250));
        progress.set_progress(1.0);
        worker.join().unwrap();

        let frames = log.frames();
        assert_eq!(frames.first().unwrap().line1.trim(), "LOADING 050%");
        assert_eq!(frames.last().unwrap().line1.trim(), "LOADING 100%");
        // Unchanged percentages are not redrawn
        assert_eq!(frames.len(), 2);
        assert!(!active.load(Ordering::Acquire));
    }

    #[test]
    fn test_indicator_stops_when_cancelled() {
        let display = CapturingDisplay::new("loading");
        let log = display.log();
        let progress = Arc::new(ProgressTracker::new(3.0));
        let active = Arc::new(AtomicBool::new(false));

        run_loading_indicator(shared(display), progress, active);
        assert!(log.is_empty());
    }
}
