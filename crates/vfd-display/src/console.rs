//! Console simulator backend

use crate::Display;
use std::io::Write;
use vfd_core::{Frame, Result, FRAME_WIDTH};

/// Simulated display that keeps the last frame and optionally renders it
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    render: bool,
    current: Option<Frame>,
    frames_written: usize,
}

impl ConsoleDisplay {
    /// Silent simulator (no terminal output)
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulator that draws a boxed 20x2 panel on stderr for every frame
    pub fn rendering() -> Self {
        Self {
            render: true,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn draw(&self, frame: &Frame) {
        let border = format!("+{}+", "-".repeat(FRAME_WIDTH));
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}\n|{}|\n|{}|\n{}", border, frame.line1, frame.line2, border);
    }
}

impl Display for ConsoleDisplay {
    fn write_frame(&mut self, line1: &str, line2: &str) -> Result<()> {
        let frame = Frame::new(line1, line2);
        if self.render {
            self.draw(&frame);
        }
        self.current = Some(frame);
        self.frames_written += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_tracks_current_frame() {
        let mut display = ConsoleDisplay::new();
        assert!(display.current().is_none());

        display.write_frame("hello", "world").unwrap();
        let frame = display.current().unwrap();
        assert_eq!(frame.line1.trim_end(), "hello");
        assert_eq!(frame.line2.len(), FRAME_WIDTH);
        assert_eq!(display.frames_written(), 1);

        display.clear().unwrap();
        assert!(display.current().is_none());
    }
}
