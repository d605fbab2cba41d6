//! In-memory and TCP host links.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use cartpole_common::consts::INITIAL_OUTPUT_STOP_MARKER;
use cartpole_common::protocol::{Command, ProtocolError, Report};

use super::lock;
use crate::hal::Transport;

// ─── Loopback ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Buffers {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

/// Controller end of an in-memory link.
///
/// Reading an empty link returns `Ok(0)`, so a truncated packet surfaces
/// as `UnexpectedEof` instead of blocking forever.
#[derive(Debug)]
pub struct LoopbackTransport {
    buffers: Arc<Mutex<Buffers>>,
}

/// Host end of an in-memory link.
#[derive(Debug, Clone)]
pub struct LoopbackHost {
    buffers: Arc<Mutex<Buffers>>,
}

impl LoopbackTransport {
    pub fn pair() -> (Self, LoopbackHost) {
        let buffers = Arc::new(Mutex::new(Buffers::default()));
        (
            Self {
                buffers: Arc::clone(&buffers),
            },
            LoopbackHost { buffers },
        )
    }
}

impl Read for LoopbackTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut buffers = lock(&self.buffers);
        let n = buf.len().min(buffers.inbound.len());
        for (dst, src) in buf.iter_mut().zip(buffers.inbound.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for LoopbackTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.buffers).outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for LoopbackTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(lock(&self.buffers).inbound.len())
    }
}

impl LoopbackHost {
    pub fn send_bytes(&self, bytes: &[u8]) {
        lock(&self.buffers).inbound.extend(bytes.iter().copied());
    }

    pub fn send(&self, command: &Command) {
        self.send_bytes(command.encode().as_bytes());
    }

    /// Bytes the host has not read yet.
    pub fn pending_inbound(&self) -> usize {
        lock(&self.buffers).inbound.len()
    }

    /// Everything the controller wrote since the last take.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.buffers).outbound)
    }

    /// Decode everything the controller wrote since the last take.
    ///
    /// Boot output up to and including the initialisation marker is
    /// discarded, the way the host does.
    pub fn take_reports(&self) -> Result<Vec<Report>, ProtocolError> {
        let output = self.take_output();
        let start = find_marker_end(&output).unwrap_or(0);

        let mut cursor = Cursor::new(&output[start..]);
        let mut reports = Vec::new();
        while (cursor.position() as usize) < output.len() - start {
            reports.push(Report::read_from(&mut cursor)?);
        }
        Ok(reports)
    }
}

fn find_marker_end(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(INITIAL_OUTPUT_STOP_MARKER.len())
        .position(|w| w == INITIAL_OUTPUT_STOP_MARKER)
        .map(|start| start + INITIAL_OUTPUT_STOP_MARKER.len())
}

// ─── TCP ────────────────────────────────────────────────────────────

/// Host link over TCP, standing in for the serial port.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    closed: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(false)?;
        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Whether the peer has shut down its side.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut peek_buf = [0u8; 256];
        self.stream.set_nonblocking(true)?;
        let peeked = self.stream.peek(&mut peek_buf);
        self.stream.set_nonblocking(false)?;

        match peeked {
            Ok(0) => {
                self.closed = true;
                Err(io::Error::from(io::ErrorKind::ConnectionAborted))
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}
