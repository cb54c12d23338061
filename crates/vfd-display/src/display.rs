//! The display abstraction shared by hardware, simulator and sandbox

use std::sync::{Arc, Mutex, MutexGuard};
use vfd_core::{Result, VfdError};

/// A two-row, twenty-column character display
///
/// Implementations receive raw lines; normalizing to the display width is
/// their responsibility (see [`vfd_core::Frame::new`]).
pub trait Display: Send {
    /// Show one frame
    fn write_frame(&mut self, line1: &str, line2: &str) -> Result<()>;

    /// Blank the display
    fn clear(&mut self) -> Result<()>;
}

/// A display handle that can be handed to script animators
///
/// Exclusivity is structural: the live display is only locked by the
/// playback controller, and validation always gets its own instance.
pub type SharedDisplay = Arc<Mutex<dyn Display>>;

/// Wrap a display for sharing with animators
pub fn shared<D: Display + 'static>(display: D) -> SharedDisplay {
    Arc::new(Mutex::new(display))
}

/// Lock a shared display, mapping poisoning to a display error
pub fn lock_display(display: &SharedDisplay) -> Result<MutexGuard<'_, dyn Display + 'static>> {
    display
        .lock()
        .map_err(|_| VfdError::Display("display lock poisoned".to_string()))
}
