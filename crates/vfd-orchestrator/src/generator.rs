//! The producer: ideas in, validated animations out
//!
//! Each idea gets a fixed attempt budget. An attempt walks the stages in
//! [`crate::stages`]; the first stage to fail ends the attempt, writes a
//! diagnostic file and adds a tagged error to the idea's history, whose
//! latest distinct entries go back to the model with the next request.

use crate::animation::Animation;
use crate::diagnostics;
use crate::progress::ProgressTracker;
use crate::queue::QueueProducer;
use crate::stages::{advance, AttemptError, AttemptStage, ErrorHistory, StageResult};
use crate::state::StateStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vfd_agent::{GenerationClient, GenerationRequest, IdeaSource};
use vfd_core::fail_open::{fail_open, fail_open_blocking};
use vfd_core::{new_function_id, AgentConfig, GenerationOutcome};
use vfd_metrics::{analyze_code, GenerationEvent, TelemetrySink, TrainingExample};
use vfd_validation::{check_syntax, Program, SandboxValidator, Sanitizer, ValidationReport};

/// How often a producer blocked on a full queue re-checks the running flag
const QUEUE_POLL: Duration = Duration::from_secs(1);

/// How progress is reported while generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressScale {
    /// One unit per finished idea, attempts as fractions (continuous mode)
    PerIdea,
    /// One unit per attempt (single-shot mode)
    PerAttempt,
}

struct Accepted {
    animation: Animation,
    report: ValidationReport,
}

struct Rejected {
    error: AttemptError,
    raw_response: String,
}

/// Generates, validates and hands over animations
pub struct Generator {
    client: Arc<dyn GenerationClient>,
    ideas: Arc<dyn IdeaSource>,
    prompt: String,
    output_dir: PathBuf,
    captures_dir: PathBuf,
    sanitizer: Sanitizer,
    validator: SandboxValidator,
    state: Arc<StateStore>,
    telemetry: TelemetrySink,
    max_attempts: usize,
    error_context: usize,
    progress: Option<(Arc<ProgressTracker>, ProgressScale)>,
    finished: AtomicUsize,
}

impl Generator {
    pub fn new(
        config: &AgentConfig,
        prompt: impl Into<String>,
        client: Arc<dyn GenerationClient>,
        ideas: Arc<dyn IdeaSource>,
        state: Arc<StateStore>,
    ) -> Self {
        Self {
            client,
            ideas,
            prompt: prompt.into(),
            output_dir: config.output_dir.clone(),
            captures_dir: config.captures_dir(),
            sanitizer: Sanitizer::new(config.generation.min_body_chars),
            validator: SandboxValidator::new(&config.validation),
            state,
            telemetry: TelemetrySink::new(config.telemetry_dir()),
            max_attempts: config.generation.max_attempts.max(1),
            error_context: config.generation.error_context,
            progress: None,
            finished: AtomicUsize::new(0),
        }
    }

    pub fn with_progress(mut self, tracker: Arc<ProgressTracker>, scale: ProgressScale) -> Self {
        self.progress = Some((tracker, scale));
        self
    }

    /// Ideas that reached a terminal outcome so far
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    /// Spawn the continuous producer loop
    pub fn spawn(self: Arc<Self>, producer: QueueProducer, running: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(producer, running).await })
    }

    /// Keep the queue full until `running` is cleared
    ///
    /// A slot is reserved before each idea starts, so the loop defers while
    /// the queue is full and a finished animation always has room.
    pub async fn run(&self, producer: QueueProducer, running: Arc<AtomicBool>) {
        info!("Generator started");
        while running.load(Ordering::Acquire) {
            let Some(slot) = producer.reserve_while(&running, QUEUE_POLL).await else {
                break;
            };
            if let Some(animation) = self.generate_one().await {
                slot.push(animation);
            }
        }
        info!("Generator stopped");
    }

    /// Generate for the next idea with a fresh function id
    pub async fn generate_one(&self) -> Option<Animation> {
        let idea = self.ideas.next_idea();
        let function_id = new_function_id();
        self.generate(&idea, &function_id).await
    }

    /// Run the full attempt sequence for one idea
    ///
    /// Records exactly one outcome. Returns the animation on success.
    pub async fn generate(&self, idea: &str, function_id: &str) -> Option<Animation> {
        info!("Generating {}: {}", function_id, idea);
        let mut history = ErrorHistory::new();
        let mut last_response = String::new();

        for attempt in 1..=self.max_attempts {
            self.report_progress(attempt);

            match self.attempt(idea, function_id, attempt, &history).await {
                Ok(accepted) => {
                    self.accept(idea, attempt, &accepted).await;
                    return Some(accepted.animation);
                }
                Err(rejected) => {
                    debug!("  ├─ ✗ {}", rejected.error);
                    history.push(&rejected.error);
                    fail_open_blocking("diagnostics", || {
                        diagnostics::write_attempt(
                            &self.output_dir,
                            function_id,
                            idea,
                            attempt,
                            &rejected.error.to_string(),
                            &rejected.raw_response,
                        )
                    });
                    if !rejected.raw_response.is_empty() {
                        last_response = rejected.raw_response;
                    }

                    let next = advance(
                        rejected.error.stage(),
                        StageResult::Failed,
                        attempt,
                        self.max_attempts,
                    );
                    if next == AttemptStage::Exhausted {
                        break;
                    }
                }
            }
        }

        self.exhaust(idea, function_id, &history, &last_response).await;
        None
    }

    async fn attempt(
        &self,
        idea: &str,
        function_id: &str,
        attempt: usize,
        history: &ErrorHistory,
    ) -> Result<Accepted, Rejected> {
        debug!("Generate attempt {}/{}: {}", attempt, self.max_attempts, idea);
        let reject = |error: AttemptError, raw: &str| Rejected {
            error,
            raw_response: raw.to_string(),
        };

        let request = GenerationRequest::new(&self.prompt, idea, function_id, attempt)
            .with_prior_errors(history.recent_distinct(self.error_context));
        let raw = self
            .client
            .generate(&request)
            .await
            .map_err(|failure| reject(AttemptError::Generation { attempt, failure }, ""))?;

        let cleaned = self
            .sanitizer
            .clean(&raw, function_id)
            .map_err(|e| reject(AttemptError::Sanitize(e), &raw))?;
        debug!("  ├─ ✓ Code received ({} chars)", cleaned.source().len());

        check_syntax(cleaned.source()).map_err(|e| reject(e.into(), &raw))?;
        debug!("  ├─ ✓ Syntax valid");

        let program = Program::bind(cleaned.source(), function_id).map_err(|e| reject(e.into(), &raw))?;
        debug!("  ├─ ✓ Compiled successfully");

        let validator = self.validator.clone();
        let candidate = program.clone();
        let report = tokio::task::spawn_blocking(move || validator.validate(&candidate))
            .await
            .map_err(|e| reject(AttemptError::Runtime(format!("validator task failed: {}", e)), &raw))?
            .map_err(|e| reject(e.into(), &raw))?;

        // Only validated code lands where replay looks for it
        let code_file = self.output_dir.join(format!("{}.rhai", function_id));
        let saved = async {
            tokio::fs::create_dir_all(&self.output_dir).await?;
            tokio::fs::write(&code_file, cleaned.source()).await
        };
        saved
            .await
            .map_err(|e| reject(AttemptError::Save(e.to_string()), &raw))?;
        debug!("  ├─ ✓ Saved to {}", code_file.display());

        Ok(Accepted {
            animation: Animation::new(function_id, idea, program),
            report,
        })
    }

    async fn accept(&self, idea: &str, attempt: usize, accepted: &Accepted) {
        let animation = &accepted.animation;
        let id = animation.function_id.as_str();

        let capture_file = self.captures_dir.join(format!("{}.jsonl", id));
        fail_open_blocking("frame capture", || {
            accepted
                .report
                .capture
                .save_jsonl(&capture_file, json!({ "idea": idea, "validation": true }))
        });
        debug!("  ├─ ✓ Frames captured ({} frames)", accepted.report.stats.total_frames);

        let metrics = analyze_code(animation.code(), id);
        let event = GenerationEvent::success(id, idea, attempt, metrics.clone());
        fail_open("telemetry", || self.telemetry.log_generation(&event)).await;
        let example = TrainingExample::new(idea, animation.code(), metrics);
        fail_open("training example", || self.telemetry.log_training_example(&example)).await;

        self.state
            .record_async(GenerationOutcome::success(id, idea, attempt))
            .await;
        self.finish();
        info!("✓ {} ready after {} attempt(s)", id, attempt);
    }

    async fn exhaust(&self, idea: &str, function_id: &str, history: &ErrorHistory, last_response: &str) {
        let final_error = history.recent_distinct(self.error_context).join("\n");
        warn!("✗ All {} attempts failed for '{}'", self.max_attempts, idea);

        let event = GenerationEvent::failure(function_id, idea, self.max_attempts, &final_error);
        fail_open("telemetry", || self.telemetry.log_generation(&event)).await;

        self.state
            .record_async(GenerationOutcome::failure(
                function_id,
                idea,
                self.max_attempts,
                &final_error,
            ))
            .await;
        fail_open_blocking("diagnostics", || {
            diagnostics::write_summary(
                &self.output_dir,
                function_id,
                idea,
                self.max_attempts,
                &history.recent_distinct(history.len()),
                last_response,
            )
        });
        self.finish();
    }

    fn finish(&self) {
        let done = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some((tracker, scale)) = &self.progress {
            match scale {
                ProgressScale::PerIdea => tracker.set_progress(done as f64),
                ProgressScale::PerAttempt => tracker.set_progress(self.max_attempts as f64),
            }
        }
    }

    fn report_progress(&self, attempt: usize) {
        let Some((tracker, scale)) = &self.progress else {
            return;
        };
        let before = (attempt - 1) as f64;
        match scale {
            ProgressScale::PerIdea => {
                let done = self.finished() as f64;
                tracker.set_progress(done + before / self.max_attempts as f64);
            }
            ProgressScale::PerAttempt => tracker.set_progress(before),
        }
    }
}
