//! Outbound side of the host link.

use std::io::{self, Write};

use cartpole_common::protocol::Report;
use tracing::trace;

/// Destination for controller → host packets.
pub trait ReportSink {
    fn send(&mut self, report: Report) -> io::Result<()>;

    fn send_debug(&mut self, text: &str) -> io::Result<()> {
        self.send(Report::Debug(text.to_string()))
    }

    fn send_info(&mut self, text: &str) -> io::Result<()> {
        self.send(Report::Info(text.to_string()))
    }

    fn send_error(&mut self, text: &str) -> io::Result<()> {
        self.send(Report::Error(text.to_string()))
    }
}

/// Collects reports in memory.
impl ReportSink for Vec<Report> {
    fn send(&mut self, report: Report) -> io::Result<()> {
        self.push(report);
        Ok(())
    }
}

/// Encodes reports onto a byte stream.
///
/// Owns the transport; the reactor reads commands through
/// [`transport_mut`](Self::transport_mut).
#[derive(Debug)]
pub struct PacketSender<W> {
    transport: W,
    sent: u64,
}

impl<W: Write> PacketSender<W> {
    pub fn new(transport: W) -> Self {
        Self { transport, sent: 0 }
    }

    #[inline]
    pub fn transport_mut(&mut self) -> &mut W {
        &mut self.transport
    }

    pub fn into_inner(self) -> W {
        self.transport
    }

    /// Packets written so far.
    #[inline]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Unframed bytes, e.g. the end-of-boot marker.
    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.transport.write_all(bytes)?;
        self.transport.flush()
    }
}

impl<W: Write> ReportSink for PacketSender<W> {
    fn send(&mut self, report: Report) -> io::Result<()> {
        trace!(id = ?report.packet_id(), "send");
        self.transport.write_all(report.encode().as_bytes())?;
        self.transport.flush()?;
        self.sent += 1;
        Ok(())
    }
}
