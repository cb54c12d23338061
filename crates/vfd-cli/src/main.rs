//! VFD animation agent
//!
//! Usage:
//!   vfd-agent                       Continuous generation and playback
//!   vfd-agent --idea "<text>"       Generate one animation and loop it
//!   vfd-agent --replay [DIR]        Replay previously generated animations
//!
//! Press `b` to bookmark or `d` to downvote the animation that is playing,
//! Ctrl+C to stop.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use vfd_agent::{load_prompt, FixedIdea, IdeaSource, OllamaClient, VocabularyIdeas};
use vfd_core::AgentConfig;
use vfd_display::{
    shared, Cd5220Display, ConsoleDisplay, Display, FrameLog, KeySignals, KeyboardListener,
    MirroredDisplay, SharedDisplay,
};
use vfd_orchestrator::{
    find_scripts, load_scripts, run_loading_indicator, wait_for_first, work_queue,
    DisplayController, Generator, ProgressScale, ProgressTracker, Shutdown, StateStore,
};
use vfd_validation::SandboxValidator;

/// Warn this often while waiting for the first animation
const STARTUP_WARNING: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "vfd-agent")]
#[command(author, version, about = "Generate and play animations on a 20x2 VFD")]
struct Cli {
    /// Animation duration in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Playback frame rate in Hz
    #[arg(short, long)]
    fps: Option<f64>,

    /// Prompt file path
    #[arg(short, long)]
    prompt: Option<PathBuf>,

    /// Custom animation idea (single-shot mode)
    #[arg(long)]
    idea: Option<String>,

    /// Echo every frame to the console
    #[arg(long)]
    preview: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Replay existing animations (defaults to the output directory)
    #[arg(long, value_name = "DIR")]
    replay: Option<Option<PathBuf>>,

    /// Configuration file (defaults to ./vfd.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory for code, captures, state and telemetry
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = build_config(&cli)?;
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    match cli.replay.clone() {
        Some(dir) => {
            let dir = dir.unwrap_or_else(|| config.output_dir.clone());
            check_display(&config)?;
            cmd_replay(config, dir).await
        }
        None => {
            let prompt = load_prompt(&config.prompt_file)?;
            check_display(&config)?;
            let client = check_service(&config).await?;
            match cli.idea.clone() {
                Some(idea) => cmd_single(config, prompt, client, idea).await,
                None => cmd_continuous(config, prompt, client).await,
            }
        }
    }
}

fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = AgentConfig::load_or_default(cli.config.as_deref())?;
    config.apply_env()?;

    if let Some(duration) = cli.duration {
        config.playback.duration_secs = duration;
    }
    if let Some(fps) = cli.fps {
        config.playback.frame_rate = fps;
    }
    if let Some(prompt) = &cli.prompt {
        config.prompt_file = prompt.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    config.preview |= cli.preview;

    config.validate()?;
    Ok(config)
}

fn check_display(config: &AgentConfig) -> Result<()> {
    if config.is_simulator() {
        info!("Display: console simulator");
        return Ok(());
    }
    Cd5220Display::check_access(Path::new(&config.device))
        .context("Display check failed (set VFD_DEVICE=simulator to run without hardware)")?;
    info!("Display: {}", config.device);
    Ok(())
}

/// Service reachable and the configured model pulled
async fn check_service(config: &AgentConfig) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(&config.service)?;
    client
        .health_check()
        .await
        .with_context(|| format!("Generation service check failed ({})", config.service.api_base))?;
    info!("Model: {}", client.model());
    Ok(Arc::new(client))
}

/// Live display plus the playback capture log, when capturing
fn open_display(config: &AgentConfig) -> Result<(SharedDisplay, Option<FrameLog>)> {
    let primary: Box<dyn Display> = if config.is_simulator() {
        // The preview echo already prints every frame
        if config.preview {
            Box::new(ConsoleDisplay::new())
        } else {
            Box::new(ConsoleDisplay::rendering())
        }
    } else {
        Box::new(Cd5220Display::open(&config.device)?)
    };

    let mut display = MirroredDisplay::new(primary).with_preview(config.preview);
    let capture = config.capture_playback().then(|| FrameLog::new("playback"));
    if let Some(log) = &capture {
        display = display.with_capture(log.clone());
    }
    Ok((shared(display), capture))
}

/// Everything the playback modes share
struct Session {
    config: AgentConfig,
    display: SharedDisplay,
    keyboard: KeyboardListener,
    shutdown: Shutdown,
    state: Arc<StateStore>,
    controller: DisplayController,
    interrupts: JoinHandle<()>,
}

impl Session {
    fn open(config: AgentConfig) -> Result<Self> {
        let (display, capture) = open_display(&config)?;
        let state = Arc::new(StateStore::load(config.state_file()));

        let mut keyboard = KeyboardListener::new();
        keyboard.start();
        let shutdown = Shutdown::new();
        let interrupts = watch_interrupts(shutdown.clone(), keyboard.signals());

        let mut controller = DisplayController::new(
            &config,
            Arc::clone(&display),
            Arc::clone(&state),
            keyboard.signals(),
            shutdown.clone(),
        );
        if let Some(log) = capture {
            controller = controller.with_capture(log);
        }

        if config.preview {
            info!("Console output enabled");
        }
        info!("Press 'b' to bookmark, 'd' to downvote, Ctrl+C to stop");

        Ok(Self {
            config,
            display,
            keyboard,
            shutdown,
            state,
            controller,
            interrupts,
        })
    }

    /// Show the loading bar until `progress` completes or the handle is dropped
    fn start_loading(&self, progress: Arc<ProgressTracker>) -> LoadingHandle {
        let active = Arc::new(AtomicBool::new(true));
        let display = Arc::clone(&self.display);
        let flag = Arc::clone(&active);
        let task = tokio::task::spawn_blocking(move || run_loading_indicator(display, progress, flag));
        LoadingHandle { active, task }
    }

    fn close(mut self) {
        self.shutdown.trigger();
        self.keyboard.stop();
        self.controller.stop();
        self.interrupts.abort();
        info!("Stopped");
    }
}

struct LoadingHandle {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl LoadingHandle {
    async fn finish(self) {
        self.active.store(false, Ordering::Release);
        let _ = tokio::time::timeout(Duration::from_millis(500), self.task).await;
    }
}

/// Ctrl+C from the terminal, or from the keyboard listener while in raw mode
fn watch_interrupts(shutdown: Shutdown, signals: Arc<KeySignals>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut tick = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = tick.tick() => {
                    if signals.interrupted() || !shutdown.is_running() {
                        break;
                    }
                }
            }
        }
        if shutdown.is_running() {
            info!("Stopping...");
        }
        shutdown.trigger();
    })
}

async fn until_shutdown(shutdown: &Shutdown) {
    while shutdown.is_running() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn cmd_continuous(config: AgentConfig, prompt: String, client: Arc<OllamaClient>) -> Result<()> {
    info!("=== Continuous Generation Mode ===");
    info!("Display will NEVER be blank");
    info!("Animations generate in background");

    let ideas: Arc<dyn IdeaSource> =
        Arc::new(VocabularyIdeas::from_file(config.vocabulary_file.as_deref())?);
    let mut session = Session::open(config)?;
    let capacity = session.config.generation.queue_capacity;

    let progress = Arc::new(ProgressTracker::new(capacity as f64));
    let generator = Arc::new(
        Generator::new(&session.config, prompt, client, ideas, Arc::clone(&session.state))
            .with_progress(Arc::clone(&progress), ProgressScale::PerIdea),
    );

    let (producer, mut consumer) = work_queue(capacity);
    info!("Pre-generating initial animations...");
    let loading = session.start_loading(progress);
    let producer_task = Arc::clone(&generator).spawn(producer, session.shutdown.running_flag());

    let ready = wait_for_first(&consumer, &session.shutdown, STARTUP_WARNING).await;
    loading.finish().await;

    if ready {
        info!("✓ Queue filled ({} ready)", consumer.len());
        session.controller.run(&mut consumer).await;
    }

    session.shutdown.trigger();
    if tokio::time::timeout(Duration::from_secs(2), producer_task)
        .await
        .is_err()
    {
        info!("Generator still finishing an idea, not waiting");
    }
    session.close();
    Ok(())
}

async fn cmd_single(
    config: AgentConfig,
    prompt: String,
    client: Arc<OllamaClient>,
    idea: String,
) -> Result<()> {
    info!("=== Single-Shot Mode ===");
    info!("Generating ONE animation, will loop forever");

    let mut session = Session::open(config)?;
    let budget = session.config.generation.max_attempts;
    let progress = Arc::new(ProgressTracker::new(budget as f64));
    let generator = Generator::new(
        &session.config,
        prompt,
        client,
        Arc::new(FixedIdea::new(idea)),
        Arc::clone(&session.state),
    )
    .with_progress(Arc::clone(&progress), ProgressScale::PerAttempt);

    info!("Generating animation...");
    let loading = session.start_loading(progress);
    let animation = tokio::select! {
        animation = generator.generate_one() => animation,
        _ = until_shutdown(&session.shutdown) => None,
    };
    loading.finish().await;

    let Some(animation) = animation else {
        let interrupted = !session.shutdown.is_running();
        let output_dir = session.config.output_dir.clone();
        session.close();
        if interrupted {
            return Ok(());
        }
        error!("Generation failed after max retries");
        error!("Check {}/failed_*.txt for details", output_dir.display());
        bail!("no animation generated");
    };

    info!("✓ Generated: {}", animation.idea);
    session.controller.run_single(&animation).await;
    session.close();
    Ok(())
}

async fn cmd_replay(config: AgentConfig, dir: PathBuf) -> Result<()> {
    info!("=== Replay Mode ===");

    let paths = find_scripts(&dir)?;
    let validator = SandboxValidator::new(&config.validation);
    let items = tokio::task::spawn_blocking(move || load_scripts(&paths, &validator))
        .await
        .context("Replay loading task failed")?;
    if items.is_empty() {
        bail!("No valid animations loaded from {}", dir.display());
    }
    info!("✓ Loaded {} animations", items.len());

    let mut session = Session::open(config)?;
    session.controller.run_replay(&items).await;
    session.close();
    Ok(())
}
