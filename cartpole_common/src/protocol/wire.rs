//! Little-endian wire codec.
//!
//! [`RawPacket`] builds an outgoing packet byte by byte; [`WireRead`] reads
//! fixed-width fields from any blocking [`std::io::Read`]. Reads block until
//! the whole field is available. There is no deadline here; framing and
//! timeout policy belong to the transport.

use std::io::{self, Read};

use static_assertions::assert_eq_size;

use super::error::ProtocolError;
use super::ids::PacketId;
use crate::consts::{CRLF, MAX_MESSAGE_LEN};

assert_eq_size!(f32, u32);

/// Growable byte sequence for one outgoing packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPacket {
    bytes: Vec<u8>,
}

impl RawPacket {
    /// Start a packet with its identifier byte.
    pub fn with_id(id: PacketId) -> Self {
        let mut packet = Self { bytes: Vec::with_capacity(16) };
        packet.push_u8(id.as_u8());
        packet
    }

    #[inline]
    pub fn push_u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    #[inline]
    pub fn push_i8(&mut self, value: i8) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[inline]
    pub fn push_i16(&mut self, value: i16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[inline]
    pub fn push_u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[inline]
    pub fn push_i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    #[inline]
    pub fn push_f32(&mut self, value: f32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Length-prefixed text (`u32` length, then the bytes).
    ///
    /// Text longer than [`MAX_MESSAGE_LEN`] is truncated at a char boundary
    /// so that the receiver never rejects it.
    pub fn push_message(&mut self, text: &str) -> &mut Self {
        let mut end = text.len().min(MAX_MESSAGE_LEN as usize);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.push_u32(end as u32);
        self.bytes.extend_from_slice(&text.as_bytes()[..end]);
        self
    }

    pub fn push_crlf(&mut self) -> &mut Self {
        self.bytes.extend_from_slice(&CRLF);
        self
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fixed-width little-endian field readers for any blocking reader.
pub trait WireRead: Read {
    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(i8::from_le_bytes(buf))
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    /// Length-prefixed text followed by the CRLF terminator.
    ///
    /// An oversized message is skipped in full, terminator included, before
    /// `MessageTooLong` is returned; the next byte is a packet identifier.
    fn read_message(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u32()?;
        if len > MAX_MESSAGE_LEN {
            let framed = u64::from(len) + CRLF.len() as u64;
            let skipped = io::copy(&mut (&mut *self).take(framed), &mut io::sink())?;
            if skipped < framed {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            return Err(ProtocolError::MessageTooLong { len });
        }

        let mut text = vec![0u8; len as usize];
        self.read_exact(&mut text)?;

        let mut terminator = [0u8; 2];
        self.read_exact(&mut terminator)?;

        String::from_utf8(text).map_err(|_| ProtocolError::InvalidText)
    }
}

impl<R: Read + ?Sized> WireRead for R {}
