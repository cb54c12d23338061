//! End-to-end retry loop and queue behaviour with a scripted generation client

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vfd_agent::{FixedIdea, GenerationClient, GenerationFailure, GenerationRequest};
use vfd_core::{AgentConfig, OutcomeStatus};
use vfd_display::FrameRecording;
use vfd_metrics::TelemetrySink;
use vfd_orchestrator::{diagnostics, work_queue, Generator, Shutdown, StateStore};

const IDEA: &str = "falling stars";
const ID: &str = "anim_1_1000";

/// A reply template; `{id}` is replaced with the requested function id
#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Fail(GenerationFailure),
}

const VALID: &str = r#"Here you go:
```rhai
fn {id}(animator, duration) {
    let x = 0;
    while animator.elapsed < duration {
        animator.write_frame(`${x % 20}`, "*");
        x += 1;
        animator.frame_sleep(1.0 / animator.frame_rate);
    }
}
```"#;

const SYNTAX_ERROR: &str = r#"fn {id}(animator, duration) {
    let x = ;
    animator.write_frame("a", "b");
}"#;

const NEVER_SLEEPS: &str = r#"fn {id}(animator, duration) {
    while animator.elapsed < duration {
        animator.write_frame("stuck", "");
    }
}"#;

const NO_FUNCTION: &str = "I cannot draw that, but here is a poem about stars instead.";

struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback: Reply::Text(VALID),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationFailure> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Text(template) => Ok(template.replace("{id}", &request.function_id)),
            Reply::Fail(failure) => Err(failure),
        }
    }
}

fn config(dir: &TempDir) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.output_dir = dir.path().to_path_buf();
    config.validation.simulated_duration_secs = 0.2;
    config
}

fn generator(config: &AgentConfig, client: Arc<ScriptedClient>) -> (Generator, Arc<StateStore>) {
    let state = Arc::new(StateStore::load(config.state_file()));
    let generator = Generator::new(
        config,
        "SYSTEM PROMPT",
        client,
        Arc::new(FixedIdea::new(IDEA)),
        Arc::clone(&state),
    );
    (generator, state)
}

fn attempt_artifacts(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("failed_") && n.contains("_attempt"))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn success_on_third_attempt_leaves_two_diagnostics() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let client = ScriptedClient::new(vec![
        Reply::Fail(GenerationFailure::Timeout),
        Reply::Text(NO_FUNCTION),
        Reply::Text(VALID),
    ]);
    let (generator, state) = generator(&config, Arc::clone(&client));

    let animation = generator.generate(IDEA, ID).await.expect("third attempt succeeds");
    assert_eq!(animation.function_id, ID);
    assert_eq!(animation.idea, IDEA);

    assert_eq!(
        attempt_artifacts(&dir),
        vec![
            "failed_anim_1_1000_attempt1.txt".to_string(),
            "failed_anim_1_1000_attempt2.txt".to_string(),
        ]
    );
    let second = std::fs::read_to_string(diagnostics::attempt_path(dir.path(), ID, 2)).unwrap();
    assert!(second.contains("Sanitize: No function found"));
    assert!(second.contains(NO_FUNCTION));
    assert!(!diagnostics::summary_path(dir.path(), ID).exists());

    // Earlier failures travel with the retry
    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].prior_errors.is_empty());
    assert_eq!(
        requests[2].prior_errors,
        vec!["Gen[1]: Timeout".to_string(), "Sanitize: No function found".to_string()]
    );
    assert!(requests[2].temperature() < requests[0].temperature());

    let snapshot = state.snapshot();
    assert_eq!((snapshot.success, snapshot.failure), (1, 0));
    assert_eq!(snapshot.generations[0].status, OutcomeStatus::Success);
    assert_eq!(snapshot.generations[0].attempts, 3);

    assert!(dir.path().join("anim_1_1000.rhai").exists());
    let capture = FrameRecording::load(&config.captures_dir().join("anim_1_1000.jsonl")).unwrap();
    assert_eq!(capture.meta["validation"], true);
    assert!(!capture.frames.is_empty());

    let sink = TelemetrySink::new(config.telemetry_dir());
    let events = sink.read_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["success"], true);
    assert_eq!(events[0]["attempt"], 3);
    let training = std::fs::read_to_string(sink.training_path()).unwrap();
    assert_eq!(training.lines().count(), 1);
}

#[tokio::test]
async fn success_after_two_syntax_failures() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let client = ScriptedClient::new(vec![
        Reply::Text(SYNTAX_ERROR),
        Reply::Text(SYNTAX_ERROR),
        Reply::Text(VALID),
    ]);
    let (generator, state) = generator(&config, Arc::clone(&client));

    assert!(generator.generate(IDEA, ID).await.is_some());

    assert_eq!(
        attempt_artifacts(&dir),
        vec![
            "failed_anim_1_1000_attempt1.txt".to_string(),
            "failed_anim_1_1000_attempt2.txt".to_string(),
        ]
    );
    for attempt in [1, 2] {
        let text = std::fs::read_to_string(diagnostics::attempt_path(dir.path(), ID, attempt)).unwrap();
        assert!(text.contains("Syntax: Line "), "attempt {}: {}", attempt, text);
    }

    // The repeated error is sent once
    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].prior_errors.len(), 1);
    assert!(requests[2].prior_errors[0].starts_with("Syntax: Line "));

    let snapshot = state.snapshot();
    assert_eq!((snapshot.success, snapshot.failure), (1, 0));
    assert_eq!(snapshot.generations[0].attempts, 3);
    assert!(dir.path().join("anim_1_1000.rhai").exists());
}

#[tokio::test]
async fn exhaustion_records_last_three_distinct_errors() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let client = ScriptedClient::new(vec![
        Reply::Fail(GenerationFailure::Timeout),
        Reply::Text(NO_FUNCTION),
        Reply::Text(SYNTAX_ERROR),
        Reply::Text(NO_FUNCTION),
        Reply::Fail(GenerationFailure::Empty),
    ]);
    let (generator, state) = generator(&config, Arc::clone(&client));

    assert!(generator.generate(IDEA, ID).await.is_none());
    assert_eq!(client.requests().len(), 5);
    assert_eq!(attempt_artifacts(&dir).len(), 5);
    assert!(diagnostics::summary_path(dir.path(), ID).exists());
    // Nothing unvalidated is left for replay
    assert!(!dir.path().join("anim_1_1000.rhai").exists());

    let events = TelemetrySink::new(config.telemetry_dir())
        .read_events()
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["success"], false);
    assert_eq!(events[0]["attempt"], 5);

    let error = events[0]["error"].as_str().unwrap();
    let lines: Vec<&str> = error.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Syntax: Line "), "got {}", lines[0]);
    assert_eq!(lines[1], "Sanitize: No function found");
    assert_eq!(lines[2], "Gen[5]: Empty response");

    let snapshot = state.snapshot();
    assert_eq!((snapshot.success, snapshot.failure), (0, 1));
    assert_eq!(snapshot.generations[0].attempts, 5);
    assert!(snapshot.generations[0].error.starts_with("Syntax: "));
    assert_eq!(generator.finished(), 1);
}

#[tokio::test]
async fn hung_candidate_is_retried_with_runtime_context() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let client = ScriptedClient::new(vec![Reply::Text(NEVER_SLEEPS), Reply::Text(VALID)]);
    let (generator, _state) = generator(&config, Arc::clone(&client));

    assert!(generator.generate(IDEA, ID).await.is_some());

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].prior_errors.len(), 1);
    assert!(requests[1].prior_errors[0].starts_with("Runtime: Timeout: animation hung"));
    let hung = std::fs::read_to_string(diagnostics::attempt_path(dir.path(), ID, 1)).unwrap();
    assert!(hung.contains("animation hung"));
}

#[tokio::test]
async fn producer_defers_while_queue_is_full() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.generation.queue_capacity = 2;
    let client = ScriptedClient::new(Vec::new());
    let (generator, state) = generator(&config, client);
    let generator = Arc::new(generator);

    let (producer, mut consumer) = work_queue(config.generation.queue_capacity);
    let shutdown = Shutdown::new();
    let handle = Arc::clone(&generator).spawn(producer, shutdown.running_flag());

    // Two fill the queue; the producer then waits for a slot
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(consumer.len(), 2);
    assert_eq!(generator.finished(), 2);

    let first = consumer.recv_timeout(Duration::from_millis(100)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(generator.finished(), 3);
    assert_eq!(consumer.len(), 2);

    // FIFO: what was generated first comes out first
    let second = consumer.recv_timeout(Duration::from_millis(100)).await.unwrap();
    assert!(first.created_at <= second.created_at);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("generator stops after shutdown")
        .unwrap();
    assert_eq!(state.snapshot().success, generator.finished());
}
