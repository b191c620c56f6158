//! Serial device transport.
//!
//! Opens a character device non-blocking and exposes it as a
//! [`WireTransport`]: `poll_read` maps would-block to 0 so the channel's
//! accumulation loop owns the waiting. Port parameter configuration (baud,
//! parity, stop bits) is left to the environment.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use super::WireTransport;

pub struct SerialPort {
    file: File,
}

impl SerialPort {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self { file })
    }
}

impl WireTransport for SerialPort {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        match self.file.write(bytes) {
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            other => other,
        }
    }

    fn poll_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.file.read(buf) {
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            other => other,
        }
    }
}
