//! Primary display plus optional console preview and capture

use crate::{Display, FrameLog};
use std::io::Write;
use vfd_core::{Frame, Result, FRAME_WIDTH};

/// Forwards frames to a primary display, echoing and recording on the side
pub struct MirroredDisplay {
    primary: Box<dyn Display>,
    preview: bool,
    capture: Option<FrameLog>,
}

impl MirroredDisplay {
    pub fn new(primary: Box<dyn Display>) -> Self {
        Self {
            primary,
            preview: false,
            capture: None,
        }
    }

    /// Echo every frame to stderr
    pub fn with_preview(mut self, enabled: bool) -> Self {
        self.preview = enabled;
        self
    }

    /// Record every frame into `log`
    pub fn with_capture(mut self, log: FrameLog) -> Self {
        self.capture = Some(log);
        self
    }
}

impl Display for MirroredDisplay {
    fn write_frame(&mut self, line1: &str, line2: &str) -> Result<()> {
        self.primary.write_frame(line1, line2)?;

        let frame = Frame::new(line1, line2);
        if self.preview {
            let rule = "-".repeat(FRAME_WIDTH);
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}\n{}\n{}\n{}", rule, frame.line1, frame.line2, rule);
        }
        if let Some(log) = &self.capture {
            log.push(frame);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.primary.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CapturingDisplay;

    #[test]
    fn test_mirror_forwards_and_captures() {
        let primary = CapturingDisplay::new("primary");
        let primary_log = primary.log();
        let side_log = FrameLog::new("playback");

        let mut mirror = MirroredDisplay::new(Box::new(primary)).with_capture(side_log.clone());
        mirror.write_frame("one", "two").unwrap();
        mirror.write_frame("three", "four").unwrap();
        mirror.clear().unwrap();

        assert_eq!(primary_log.len(), 2);
        assert_eq!(side_log.len(), 2);
        assert_eq!(side_log.frames()[1].line1.trim_end(), "three");
    }
}
