//! Sandbox runtime validation
//!
//! Every candidate runs once against a capturing display with pacing
//! disabled. The run happens on a detached helper thread; the caller waits
//! for a completion message up to the hang timeout. A candidate that does not
//! finish in time is reported as hung and its helper is abandoned, after the
//! cooperative cancel flag has been raised so the engine can stop at its next
//! operation.

use crate::animator::{Pacing, ScriptAnimator};
use crate::engine::{ScriptError, ScriptErrorKind};
use crate::failure::ValidationFailure;
use crate::program::Program;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vfd_core::config::ValidationConfig;
use vfd_display::{shared, CapturingDisplay, FrameLog, FrameStats};

/// Successful validation run
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Every frame the candidate wrote
    pub capture: FrameLog,
    pub stats: FrameStats,
    /// Wall time the run took
    pub elapsed: Duration,
}

/// Runs candidates under a hard wall-clock deadline
#[derive(Debug, Clone)]
pub struct SandboxValidator {
    simulated_duration: f64,
    frame_rate: f64,
    hang_timeout: Duration,
}

impl SandboxValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            simulated_duration: config.simulated_duration_secs,
            frame_rate: config.frame_rate,
            hang_timeout: config.hang_timeout(),
        }
    }

    pub fn hang_timeout(&self) -> Duration {
        self.hang_timeout
    }

    /// Execute `program` once and classify the result
    ///
    /// Blocks the calling thread for at most the hang timeout.
    pub fn validate(&self, program: &Program) -> Result<ValidationReport, ValidationFailure> {
        let display = CapturingDisplay::new(program.entry_point());
        let capture = display.log();
        let cancel = Arc::new(AtomicBool::new(false));
        let animator = ScriptAnimator::new(shared(display), self.frame_rate, Pacing::Simulated)
            .with_cancel(Arc::clone(&cancel));

        let (tx, rx) = mpsc::channel();
        let helper_program = program.clone();
        let duration = self.simulated_duration;
        let started = Instant::now();

        let spawned = std::thread::Builder::new()
            .name(format!("sandbox-{}", program.entry_point()))
            .spawn(move || {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    helper_program.run(animator, duration)
                }));
                // The receiver is gone if the caller already gave up
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            return Err(ValidationFailure::crash(
                ScriptErrorKind::RuntimeError,
                &format!("sandbox thread could not start: {}", e),
            ));
        }

        match rx.recv_timeout(self.hang_timeout) {
            Ok(Ok(Ok(()))) => {
                let elapsed = started.elapsed();
                let stats = capture.stats();
                debug!(
                    "Runtime OK ({} frames, {:.2}s)",
                    stats.total_frames,
                    elapsed.as_secs_f64()
                );
                Ok(ValidationReport {
                    capture,
                    stats,
                    elapsed,
                })
            }
            Ok(Ok(Err(ScriptError { kind, message }))) => {
                Err(ValidationFailure::crash(kind, &message))
            }
            Ok(Err(panic)) => Err(ValidationFailure::crash(
                ScriptErrorKind::Panic,
                &panic_message(panic.as_ref()),
            )),
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Release);
                warn!(
                    "{} did not finish within {:.1}s, abandoning helper",
                    program.entry_point(),
                    self.hang_timeout.as_secs_f64()
                );
                Err(ValidationFailure::Hung {
                    timeout: self.hang_timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ValidationFailure::crash(
                ScriptErrorKind::Panic,
                "sandbox thread exited without reporting",
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic in sandbox thread".to_string()
    }
}
