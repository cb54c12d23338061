//! Raw-mode keyboard listener for operator feedback
//!
//! `b` bookmarks and `d` downvotes the animation currently playing. Each key
//! sets an edge-triggered flag; the playback controller is the only reader
//! and clears the flag as it reads it, so repeated presses between two reads
//! collapse into one signal.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Poll interval for pending key events
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Signals the listener understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySignal {
    Bookmark,
    Downvote,
    /// Ctrl+C; raw mode swallows the terminal's own SIGINT
    Interrupt,
}

/// Map a key event to a signal
pub fn classify_key(key: KeyEvent) -> Option<KeySignal> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
            .then_some(KeySignal::Interrupt);
    }
    match key.code {
        KeyCode::Char('b') | KeyCode::Char('B') => Some(KeySignal::Bookmark),
        KeyCode::Char('d') | KeyCode::Char('D') => Some(KeySignal::Downvote),
        _ => None,
    }
}

/// Single-writer / single-reader mailbox of pending signals
#[derive(Debug, Default)]
pub struct KeySignals {
    bookmark: AtomicBool,
    downvote: AtomicBool,
    interrupt: AtomicBool,
}

impl KeySignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, signal: KeySignal) {
        let flag = match signal {
            KeySignal::Bookmark => &self.bookmark,
            KeySignal::Downvote => &self.downvote,
            KeySignal::Interrupt => &self.interrupt,
        };
        flag.store(true, Ordering::Release);
    }

    /// True once per bookmark press burst
    pub fn check_and_clear_bookmark(&self) -> bool {
        self.bookmark.swap(false, Ordering::AcqRel)
    }

    /// True once per downvote press burst
    pub fn check_and_clear_downvote(&self) -> bool {
        self.downvote.swap(false, Ordering::AcqRel)
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }
}

/// RAII guard for raw terminal mode
///
/// Restores the previous mode on drop, including on panic unwinding.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self;
        keep_output_processing()?;
        Ok(guard)
    }
}

/// Raw mode clears OPOST, after which `\n` no longer returns the carriage.
/// Logs and the console display keep writing while keys are read, so output
/// processing goes back on; input stays raw.
#[cfg(unix)]
fn keep_output_processing() -> std::io::Result<()> {
    use nix::sys::termios::{tcgetattr, tcsetattr, SetArg};

    let stdin = std::io::stdin();
    let mut termios = tcgetattr(&stdin).map_err(std::io::Error::other)?;
    termios.output_flags = with_output_processing(termios.output_flags);
    tcsetattr(&stdin, SetArg::TCSANOW, &termios).map_err(std::io::Error::other)
}

#[cfg(not(unix))]
fn keep_output_processing() -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn with_output_processing(
    flags: nix::sys::termios::OutputFlags,
) -> nix::sys::termios::OutputFlags {
    use nix::sys::termios::OutputFlags;
    flags | OutputFlags::OPOST | OutputFlags::ONLCR
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best effort restore - ignore errors in destructor
        let _ = disable_raw_mode();
    }
}

/// Background listener thread
pub struct KeyboardListener {
    signals: Arc<KeySignals>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyboardListener {
    pub fn new() -> Self {
        Self {
            signals: Arc::new(KeySignals::new()),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Handle for the reader side
    pub fn signals(&self) -> Arc<KeySignals> {
        Arc::clone(&self.signals)
    }

    /// Start listening; a no-op when stdin is not a terminal
    ///
    /// Returns whether the listener is active.
    pub fn start(&mut self) -> bool {
        if self.handle.is_some() {
            return true;
        }
        if !std::io::stdin().is_terminal() {
            debug!("Not a TTY, keyboard listener disabled");
            return false;
        }

        self.running.store(true, Ordering::Release);
        let signals = Arc::clone(&self.signals);
        let running = Arc::clone(&self.running);
        let spawned = std::thread::Builder::new()
            .name("vfd-keyboard".into())
            .spawn(move || listen(&signals, &running));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                debug!("Keyboard listener started");
                true
            }
            Err(e) => {
                warn!("Keyboard listener could not start: {}", e);
                self.running.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Stop the listener and restore the terminal mode
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn check_and_clear(&self) -> bool {
        self.signals.check_and_clear_bookmark()
    }

    pub fn check_and_clear_downvote(&self) -> bool {
        self.signals.check_and_clear_downvote()
    }
}

impl Default for KeyboardListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(signals: &KeySignals, running: &AtomicBool) {
    let _guard = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(e) => {
            debug!("Keyboard listener error: {}", e);
            return;
        }
    };

    while running.load(Ordering::Acquire) {
        match event::poll(POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if let Some(signal) = classify_key(key) {
                        announce(signal);
                        signals.record(signal);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Keyboard listener error: {}", e);
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                debug!("Keyboard listener error: {}", e);
                break;
            }
        }
    }
}

fn announce(signal: KeySignal) {
    match signal {
        KeySignal::Bookmark => info!("[★ Bookmark recorded!]"),
        KeySignal::Downvote => info!("[✗ Downvote recorded!]"),
        KeySignal::Interrupt => info!("Interrupt requested"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keys() {
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(classify_key(press(KeyCode::Char('b'))), Some(KeySignal::Bookmark));
        assert_eq!(classify_key(press(KeyCode::Char('B'))), Some(KeySignal::Bookmark));
        assert_eq!(classify_key(press(KeyCode::Char('d'))), Some(KeySignal::Downvote));
        assert_eq!(classify_key(press(KeyCode::Char('x'))), None);
        assert_eq!(classify_key(press(KeyCode::Enter)), None);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(classify_key(ctrl_c), Some(KeySignal::Interrupt));

        let ctrl_b = KeyEvent::new(KeyCode::Char('b'), KeyModifiers::CONTROL);
        assert_eq!(classify_key(ctrl_b), None);
    }

    #[test]
    fn test_release_events_ignored() {
        let mut release = KeyEvent::new(KeyCode::Char('b'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(classify_key(release), None);
    }

    #[test]
    fn test_signals_are_edge_triggered() {
        let signals = KeySignals::new();
        assert!(!signals.check_and_clear_bookmark());

        signals.record(KeySignal::Bookmark);
        signals.record(KeySignal::Bookmark);
        assert!(signals.check_and_clear_bookmark());
        assert!(!signals.check_and_clear_bookmark());

        // Flags are independent
        signals.record(KeySignal::Downvote);
        assert!(!signals.check_and_clear_bookmark());
        assert!(signals.check_and_clear_downvote());
    }

    #[cfg(unix)]
    #[test]
    fn test_output_processing_flags() {
        use nix::sys::termios::OutputFlags;

        // cfmakeraw leaves no output flags set
        let restored = with_output_processing(OutputFlags::empty());
        assert!(restored.contains(OutputFlags::OPOST | OutputFlags::ONLCR));

        // Unrelated flags survive
        let restored = with_output_processing(OutputFlags::OCRNL);
        assert!(restored.contains(OutputFlags::OCRNL | OutputFlags::OPOST));
    }

    #[cfg(unix)]
    #[test]
    fn test_raw_mode_keeps_newline_translation() {
        use nix::sys::termios::{tcgetattr, LocalFlags, OutputFlags};

        if !std::io::stdin().is_terminal() {
            return;
        }
        let guard = RawModeGuard::enable().unwrap();
        let termios = tcgetattr(&std::io::stdin()).unwrap();
        drop(guard);

        assert!(termios
            .output_flags
            .contains(OutputFlags::OPOST | OutputFlags::ONLCR));
        assert!(!termios.local_flags.contains(LocalFlags::ICANON));
    }

    #[test]
    fn test_listener_reads_shared_signals() {
        let listener = KeyboardListener::new();
        listener.signals().record(KeySignal::Bookmark);
        assert!(listener.check_and_clear());
        assert!(!listener.check_and_clear());
        assert!(!listener.is_active());
    }
}
