//! CD5220 customer display over a serial device node
//!
//! The port itself (baud rate, framing) is expected to be configured by the
//! host, e.g. `stty -F /dev/ttyUSB0 9600 raw`. This backend only speaks the
//! CD5220 command set: initialize, clear, and cursor positioning. Rows that
//! did not change since the previous frame are not re-sent.

use crate::Display;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use vfd_core::{Frame, Result, VfdError};

const ESC: u8 = 0x1B;
const CMD_INIT: [u8; 2] = [ESC, b'@'];
const CMD_CLEAR: u8 = 0x0C;

/// Serial CD5220 display
#[derive(Debug)]
pub struct Cd5220Display {
    path: PathBuf,
    port: File,
    last: Option<Frame>,
}

impl Cd5220Display {
    /// Open and initialize the device
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Self::check_access(&path)?;

        let port = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut device = Self {
            path,
            port,
            last: None,
        };
        device.send(&CMD_INIT)?;
        device.clear()?;
        debug!("CD5220 initialized on {}", device.path.display());
        Ok(device)
    }

    /// Verify that the device node exists and is readable and writable
    pub fn check_access(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(VfdError::DeviceNotFound(path.display().to_string()));
        }
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(VfdError::DevicePermission(path.display().to_string()))
            }
            Err(e) => Err(VfdError::Io(e)),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .and_then(|_| self.port.flush())
            .map_err(|e| VfdError::Display(format!("write to {} failed: {}", self.path.display(), e)))
    }

    fn write_row(&mut self, row: u8, text: &str) -> Result<()> {
        // ESC l x y: move cursor to column x, row y (1-based)
        let mut bytes = vec![ESC, b'l', 1, row];
        bytes.extend(encode(text));
        self.send(&bytes)
    }
}

/// Map a row to the display's single-byte character set
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '█' => 0xDB,
            '░' | '▒' | '▓' => 0xB1,
            _ => b'?',
        })
        .collect()
}

impl Display for Cd5220Display {
    fn write_frame(&mut self, line1: &str, line2: &str) -> Result<()> {
        let frame = Frame::new(line1, line2);
        let (row1_changed, row2_changed) = match &self.last {
            Some(prev) => (prev.line1 != frame.line1, prev.line2 != frame.line2),
            None => (true, true),
        };

        if row1_changed {
            self.write_row(1, &frame.line1)?;
        }
        if row2_changed {
            self.write_row(2, &frame.line2)?;
        }
        self.last = Some(frame);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.send(&[CMD_CLEAR])?;
        self.last = Some(Frame::blank());
        Ok(())
    }
}
