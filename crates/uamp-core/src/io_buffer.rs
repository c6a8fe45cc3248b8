//! Length-declared framed I/O over a [`Transport`].
//!
//! A caller opens a frame with [`FrameBuffer::begin_read`] or
//! [`FrameBuffer::begin_write`], declaring exactly how many bytes the
//! upcoming sequence of typed reads/writes will consume, then issues typed
//! operations until the declared total is exhausted. Exceeding or
//! under-running that total is a programmer error: the original library
//! treats it as an assertion failure rather than a recoverable error, and
//! this port does the same with a debug assertion.

use crate::error::Result;
use crate::transport::Transport;

const CAPACITY: usize = crate::wire::IO_BUFFER_SIZE;

/// A single reusable framing buffer bound to one [`Transport`].
///
/// Read frames and write frames never overlap in time on one session, so
/// one backing array serves both directions — exactly as the original
/// `uampIOBuffer` does.
pub struct FrameBuffer {
    buffer: [u8; CAPACITY],
    /// Bytes currently staged in `buffer` and not yet consumed (read side)
    /// or not yet flushed (write side).
    in_buffer: usize,
    /// Declared total for the current frame.
    total: u64,
    /// Bytes returned to the caller (read side) or accepted from the
    /// caller (write side) so far in the current frame.
    passed: u64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        FrameBuffer {
            buffer: [0u8; CAPACITY],
            in_buffer: 0,
            total: 0,
            passed: 0,
        }
    }

    /// Declares that the next `total` bytes read through this buffer form
    /// one logical message.
    pub fn begin_read(&mut self, total: u64) {
        self.total = total;
        self.passed = 0;
        self.in_buffer = 0;
    }

    /// Declares that the next `total` bytes written through this buffer
    /// form one logical message.
    pub fn begin_write(&mut self, total: u64) {
        self.total = total;
        self.passed = 0;
        self.in_buffer = 0;
    }

    fn check_tight(&self, additional: u64) {
        let total_passed = self.passed + additional;
        debug_assert!(
            total_passed <= self.total,
            "frame buffer contract violated: {total_passed} > declared total {}",
            self.total
        );
    }

    pub fn read_u8(&mut self, transport: &mut Transport) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_raw(transport, &mut byte)?;
        Ok(byte[0])
    }

    pub fn read_u32(&mut self, transport: &mut Transport) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_raw(transport, &mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn read_bytes(&mut self, transport: &mut Transport, out: &mut [u8]) -> Result<()> {
        self.read_raw(transport, out)
    }

    /// Drains `data.len()` bytes into `data`, refilling from the socket in
    /// chunks of at most `CAPACITY` bytes whenever the staging buffer runs
    /// dry. A short fill is placed at the high end of the backing array so
    /// the next drain always starts from a known offset.
    fn read_raw(&mut self, transport: &mut Transport, data: &mut [u8]) -> Result<()> {
        self.check_tight(data.len() as u64);

        let mut written = 0usize;
        while written < data.len() {
            if self.in_buffer == 0 {
                let remaining = self.total - self.passed;
                let this_time = remaining.min(CAPACITY as u64) as usize;
                let offset = CAPACITY - this_time;
                transport.read_all(&mut self.buffer[offset..offset + this_time])?;
                self.in_buffer = this_time;
            }

            let take = (data.len() - written).min(self.in_buffer);
            let offset = CAPACITY - self.in_buffer;
            data[written..written + take].copy_from_slice(&self.buffer[offset..offset + take]);
            self.in_buffer -= take;
            self.passed += take as u64;
            written += take;
        }
        Ok(())
    }

    pub fn write_u8(&mut self, transport: &mut Transport, value: u8) -> Result<()> {
        self.write_raw(transport, &[value])
    }

    pub fn write_u32(&mut self, transport: &mut Transport, value: u32) -> Result<()> {
        self.write_raw(transport, &value.to_be_bytes())
    }

    pub fn write_bytes(&mut self, transport: &mut Transport, data: &[u8]) -> Result<()> {
        self.write_raw(transport, data)
    }

    /// Stages `data` into the backing buffer, flushing to the socket
    /// whenever the buffer fills or the declared total has been supplied.
    fn write_raw(&mut self, transport: &mut Transport, data: &[u8]) -> Result<()> {
        self.check_tight(data.len() as u64);

        let mut offset = 0usize;
        while offset < data.len() {
            let space = CAPACITY - self.in_buffer;
            let this_time = (data.len() - offset).min(space);
            self.buffer[self.in_buffer..self.in_buffer + this_time]
                .copy_from_slice(&data[offset..offset + this_time]);
            self.in_buffer += this_time;
            self.passed += this_time as u64;
            offset += this_time;

            if self.in_buffer == CAPACITY || self.passed == self.total {
                transport.write_all(&self.buffer[..self.in_buffer])?;
                self.in_buffer = 0;
            }
        }
        Ok(())
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
