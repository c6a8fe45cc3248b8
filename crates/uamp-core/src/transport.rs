//! Bare TCP transport: connect, then chunked blocking read/write loops.
//!
//! This is the only module that touches an actual socket. Everything above
//! it (the framed I/O buffer, the handshake, the session) goes through
//! [`Transport::read_all`] / [`Transport::write_all`].

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::config::SessionOptions;
use crate::error::{Error, Result};

/// The largest chunk handed to a single `read`/`write` syscall. Mirrors the
/// original client's chunking to `SSIZE_MAX` per call; there is no platform
/// reason to chunk on a 64-bit target, but a single call is still capped so
/// a pathological `total` can't be handed to the OS in one shot.
const MAX_CHUNK: usize = i32::MAX as usize;

/// An open, connected session socket.
pub struct Transport {
    stream: TcpStream,
}

impl Transport {
    /// Resolves `host:port`, opens a stream socket, and connects it.
    ///
    /// Port `0` is rejected before any syscall, matching the original
    /// client: there is no such thing as "any port" for an outbound
    /// connection here.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        if port == 0 {
            return Err(Error::InvalidPort);
        }

        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::HostnameInformation)?;
        let addr = addrs.next().ok_or(Error::HostnameInformation)?;

        let stream = TcpStream::connect(addr).map_err(|_| Error::ConnectSocket)?;
        debug!(%host, port, "connected");

        Ok(Transport { stream })
    }

    /// Applies session-level socket options (currently: read/write
    /// timeouts). A blocked call is uninterruptible at the core layer
    /// regardless; this only bounds how long that block may last.
    pub fn apply_options(&mut self, options: &SessionOptions) -> Result<()> {
        self.stream
            .set_read_timeout(options.socket_timeout)
            .map_err(|_| Error::ConnectSocket)?;
        self.stream
            .set_write_timeout(options.socket_timeout)
            .map_err(|_| Error::ConnectSocket)?;
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes, looping over short reads. A
    /// zero-byte read before the buffer is full is a dried-up socket, not a
    /// short read to retry.
    pub fn read_all(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut offset = 0;
        while offset < buf.len() {
            let chunk_end = offset + (buf.len() - offset).min(MAX_CHUNK);
            match self.stream.read(&mut buf[offset..chunk_end]) {
                Ok(0) => return Err(Error::SocketDry),
                Ok(n) => offset += n,
                Err(_) => return Err(Error::SocketRead),
            }
        }
        Ok(())
    }

    /// Writes exactly `buf`, looping over short writes.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut offset = 0;
        while offset < buf.len() {
            let chunk_end = offset + (buf.len() - offset).min(MAX_CHUNK);
            match self.stream.write(&buf[offset..chunk_end]) {
                Ok(0) => return Err(Error::SocketWrite),
                Ok(n) => offset += n,
                Err(_) => return Err(Error::SocketWrite),
            }
        }
        Ok(())
    }

    /// Shuts the socket down in both directions. Idempotent; errors (e.g.
    /// already closed) are swallowed since the caller is tearing down
    /// regardless.
    pub fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    /// Best-effort single-byte write that swallows any error. Used only for
    /// the handshake-reject byte: the session is being torn down regardless
    /// of whether the server is still listening.
    pub fn write_best_effort(&mut self, byte: u8) {
        let _ = self.stream.write_all(&[byte]);
    }
}
