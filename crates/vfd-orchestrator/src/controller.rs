//! The consumer: plays animations and collects operator feedback
//!
//! Every play goes through the same cycle:
//! `Dequeuing → Playing → RecordingFeedback → Clearing → Idle`.
//! A failing animation is logged and skipped; nothing short of shutdown ends
//! the loop. The display is cleared after every play, successful or not.

use crate::animation::Animation;
use crate::queue::QueueConsumer;
use crate::replay::ReplayItem;
use crate::shutdown::Shutdown;
use crate::state::StateStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use vfd_core::config::PlaybackConfig;
use vfd_core::fail_open::{fail_open, fail_open_blocking};
use vfd_core::{truncate_chars, AgentConfig, PreferenceEvent, PreferenceKind};
use vfd_display::{lock_display, FrameLog, KeySignals, SharedDisplay};
use vfd_metrics::TelemetrySink;

const STARTUP_POLL: Duration = Duration::from_millis(100);
const STOP_POLL: Duration = Duration::from_millis(50);

/// Where the controller is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dequeuing,
    Placeholder,
    Playing,
    RecordingFeedback,
    Clearing,
}

/// How a saved playback capture is named and tagged
enum CaptureKind<'a> {
    Playback,
    SingleShot,
    Replay(&'a ReplayItem),
}

/// Plays queued animations on the live display
pub struct DisplayController {
    display: SharedDisplay,
    capture: Option<FrameLog>,
    state: Arc<StateStore>,
    telemetry: TelemetrySink,
    signals: Arc<KeySignals>,
    captures_dir: PathBuf,
    playback: PlaybackConfig,
    shutdown: Shutdown,
    phase: Phase,
    plays: usize,
}

impl DisplayController {
    pub fn new(
        config: &AgentConfig,
        display: SharedDisplay,
        state: Arc<StateStore>,
        signals: Arc<KeySignals>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            display,
            capture: None,
            state,
            telemetry: TelemetrySink::new(config.telemetry_dir()),
            signals,
            captures_dir: config.captures_dir(),
            playback: config.playback.clone(),
            shutdown,
            phase: Phase::Idle,
            plays: 0,
        }
    }

    /// Persist the frames recorded into `log` after each play
    ///
    /// `log` must be the capture attached to the live display.
    pub fn with_capture(mut self, log: FrameLog) -> Self {
        self.capture = Some(log);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Animations played so far
    pub fn plays(&self) -> usize {
        self.plays
    }

    /// Continuous mode: play whatever the generator queues
    pub async fn run(&mut self, queue: &mut QueueConsumer) {
        let timeout = self.playback.dequeue_timeout();

        while self.shutdown.is_running() {
            self.phase = Phase::Dequeuing;
            let Some(animation) = queue.recv_timeout(timeout).await else {
                if !self.shutdown.is_running() {
                    break;
                }
                warn!("Queue empty");
                self.show_placeholder(queue).await;
                continue;
            };

            self.plays += 1;
            info!(
                "▶ #{}: {} | Queue: {} | {}",
                self.plays,
                animation.idea,
                queue.len(),
                self.state.stats()
            );
            self.cycle(&animation, Some(CaptureKind::Playback)).await;
        }
        self.phase = Phase::Idle;
    }

    /// Single-shot mode: loop one animation until shutdown
    pub async fn run_single(&mut self, animation: &Animation) {
        info!("Looping: {}", animation.idea);
        let mut loops = 0usize;

        while self.shutdown.is_running() {
            loops += 1;
            self.plays += 1;
            if loops % 10 == 0 {
                info!("Loop {}: {}", loops, animation.idea);
            }
            let capture = (loops == 1).then_some(CaptureKind::SingleShot);
            self.cycle(animation, capture).await;
        }
        self.phase = Phase::Idle;
    }

    /// Replay mode: cycle through animations loaded from disk
    pub async fn run_replay(&mut self, items: &[ReplayItem]) {
        if items.is_empty() {
            return;
        }
        'outer: while self.shutdown.is_running() {
            for item in items {
                if !self.shutdown.is_running() {
                    break 'outer;
                }
                self.plays += 1;
                info!("▶ {}: {}", self.plays, item.animation.idea);
                self.cycle(&item.animation, Some(CaptureKind::Replay(item))).await;
            }
        }
        self.phase = Phase::Idle;
    }

    async fn cycle(&mut self, animation: &Animation, capture: Option<CaptureKind<'_>>) {
        if let Some(log) = &self.capture {
            log.clear();
        }

        self.phase = Phase::Playing;
        if self.play(animation).await {
            self.phase = Phase::RecordingFeedback;
            self.record_feedback(animation).await;
            if let Some(kind) = capture {
                self.save_capture(animation, kind);
            }
        }

        self.phase = Phase::Clearing;
        self.clear_display();
        tokio::time::sleep(self.playback.settle()).await;
        self.phase = Phase::Idle;
    }

    /// Run on a blocking worker; `false` if the animation failed
    ///
    /// A script still running at `duration + overrun grace` is stopped.
    async fn play(&self, animation: &Animation) -> bool {
        let display = Arc::clone(&self.display);
        let stop = Arc::new(AtomicBool::new(false));
        let (frame_rate, duration) = (self.playback.frame_rate, self.playback.duration_secs);
        let playing = animation.clone();
        let flag = Arc::clone(&stop);

        let task = tokio::task::spawn_blocking(move || playing.play(display, frame_rate, duration, flag));
        let watchdog = tokio::spawn(stop_playback(
            Arc::clone(&stop),
            self.shutdown.cancel_flag(),
            self.playback.play_limit(),
        ));
        let result = task.await;
        watchdog.abort();

        match result {
            Ok(Ok(frames)) => {
                debug!("{} wrote {} frames", animation.function_id, frames);
                true
            }
            Ok(Err(e)) if !self.shutdown.is_running() => {
                debug!("{} stopped: {}", animation.function_id, e);
                false
            }
            Ok(Err(_)) if stop.load(Ordering::Acquire) => {
                warn!(
                    "{} overran its {:.1}s slot, stopped",
                    animation.function_id,
                    self.playback.play_limit().as_secs_f64()
                );
                false
            }
            Ok(Err(e)) => {
                error!("Playback error: {}", e);
                false
            }
            Err(e) => {
                error!("Playback error: {}", e);
                false
            }
        }
    }

    async fn record_feedback(&self, animation: &Animation) {
        if self.signals.check_and_clear_bookmark() {
            self.log_preference(PreferenceKind::Bookmark, animation).await;
            info!("★ Bookmarked: {}", truncate_chars(&animation.idea, 40));
        }
        if self.signals.check_and_clear_downvote() {
            self.log_preference(PreferenceKind::Downvote, animation).await;
            info!("✗ Downvoted: {}", truncate_chars(&animation.idea, 40));
        }
    }

    async fn log_preference(&self, kind: PreferenceKind, animation: &Animation) {
        let event = PreferenceEvent::new(kind, &animation.function_id, &animation.idea);
        fail_open("preference", || self.telemetry.log_preference(&event)).await;
    }

    fn save_capture(&self, animation: &Animation, kind: CaptureKind<'_>) {
        let Some(log) = &self.capture else {
            return;
        };
        if log.is_empty() {
            return;
        }

        let (suffix, metadata): (&str, Value) = match kind {
            CaptureKind::Playback => (
                "playback",
                json!({
                    "idea": animation.idea,
                    "playback": true,
                    "duration": self.playback.duration_secs,
                }),
            ),
            CaptureKind::SingleShot => (
                "playback",
                json!({
                    "idea": animation.idea,
                    "playback": true,
                    "single_shot": true,
                }),
            ),
            CaptureKind::Replay(item) => (
                "replay",
                json!({
                    "replay": true,
                    "source": item.source.display().to_string(),
                }),
            ),
        };

        let path = self
            .captures_dir
            .join(format!("{}_{}.jsonl", animation.function_id, suffix));
        if fail_open_blocking("frame capture", || log.save_jsonl(&path, metadata)).is_some() {
            debug!("  └─ ✓ Playback frames saved ({} frames)", log.len());
        }
    }

    /// Waiting message while the generator catches up
    async fn show_placeholder(&mut self, queue: &QueueConsumer) {
        self.phase = Phase::Placeholder;
        let tick = self.playback.placeholder_tick();

        for i in 0..self.playback.placeholder_ticks {
            if !queue.is_empty() || !self.shutdown.is_running() {
                break;
            }
            let text = placeholder_text(i);
            if let Err(e) = lock_display(&self.display).and_then(|mut d| d.write_frame(&text, "")) {
                debug!("Placeholder error: {}", e);
                break;
            }
            tokio::time::sleep(tick).await;
        }
        self.clear_display();
    }

    fn clear_display(&self) {
        if let Err(e) = lock_display(&self.display).and_then(|mut d| d.clear()) {
            warn!("Display clear failed: {}", e);
        }
    }

    /// Blank the display on the way out
    pub fn stop(&mut self) {
        self.clear_display();
        self.phase = Phase::Idle;
    }
}

/// Raise `stop` once `limit` has passed or shutdown cancels playback
async fn stop_playback(stop: Arc<AtomicBool>, cancel: Arc<AtomicBool>, limit: Duration) {
    let deadline = Instant::now() + limit;
    while !cancel.load(Ordering::Acquire) && Instant::now() < deadline {
        tokio::time::sleep(STOP_POLL).await;
    }
    stop.store(true, Ordering::Release);
}

/// Block until the first animation is queued
///
/// Warns every `warn_every` while nothing has arrived. Returns `false` if
/// shutdown came first.
pub async fn wait_for_first(queue: &QueueConsumer, shutdown: &Shutdown, warn_every: Duration) -> bool {
    let mut since_warning = Instant::now();
    while queue.is_empty() {
        if !shutdown.is_running() {
            return false;
        }
        if since_warning.elapsed() > warn_every {
            warn!("Initial generation taking longer than expected...");
            since_warning = Instant::now();
        }
        tokio::time::sleep(STARTUP_POLL).await;
    }
    true
}

/// `GENERATING.` through `GENERATING....`
pub fn placeholder_text(tick: usize) -> String {
    format!("GENERATING{}", ".".repeat(tick % 4 + 1))
}
