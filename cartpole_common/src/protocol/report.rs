//! Controller → host packets.

use super::error::ProtocolError;
use super::ids::PacketId;
use super::types::{read_failure_mode, ExperimentInfo, FailureMode, Observation};
use super::wire::{RawPacket, WireRead};

/// Every packet the controller sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Debug(String),
    Info(String),
    Error(String),
    Pong { timestamp: u32 },
    /// Limit finding completed.
    FindLimits,
    /// Limit check completed.
    CheckLimit,
    SoftLimitReached,
    /// Jiggle completed.
    DoJiggle,
    Observation(Observation),
    ExperimentStart { timestamp_us: u32 },
    ExperimentStop,
    /// `cart_id` precedes `failure_mode` on the wire.
    ExperimentDone { cart_id: u8, failure_mode: FailureMode },
    ExperimentInfo(ExperimentInfo),
}

impl Report {
    pub fn packet_id(&self) -> PacketId {
        match self {
            Self::Debug(_) => PacketId::Debug,
            Self::Info(_) => PacketId::Info,
            Self::Error(_) => PacketId::Error,
            Self::Pong { .. } => PacketId::Pong,
            Self::FindLimits => PacketId::FindLimits,
            Self::CheckLimit => PacketId::CheckLimit,
            Self::SoftLimitReached => PacketId::SoftLimitReached,
            Self::DoJiggle => PacketId::DoJiggle,
            Self::Observation(_) => PacketId::Observation,
            Self::ExperimentStart { .. } => PacketId::ExperimentStart,
            Self::ExperimentStop => PacketId::ExperimentStop,
            Self::ExperimentDone { .. } => PacketId::ExperimentDone,
            Self::ExperimentInfo(_) => PacketId::ExperimentInfo,
        }
    }

    /// Serialize to wire bytes. Never fails.
    pub fn encode(&self) -> RawPacket {
        let mut packet = RawPacket::with_id(self.packet_id());

        match self {
            Self::Debug(text) | Self::Info(text) | Self::Error(text) => {
                packet.push_message(text).push_crlf();
            }
            Self::Pong { timestamp } => {
                packet.push_u32(*timestamp);
            }
            Self::FindLimits
            | Self::CheckLimit
            | Self::SoftLimitReached
            | Self::DoJiggle
            | Self::ExperimentStop => {}
            Self::Observation(obs) => {
                packet
                    .push_u32(obs.timestamp_us)
                    .push_u8(obs.cart_id)
                    .push_i32(obs.position_steps)
                    .push_f32(obs.angle_deg);
            }
            Self::ExperimentStart { timestamp_us } => {
                packet.push_u32(*timestamp_us);
            }
            Self::ExperimentDone { cart_id, failure_mode } => {
                packet.push_u8(*cart_id).push_i8(failure_mode.as_i8());
            }
            Self::ExperimentInfo(info) => info.write(&mut packet),
        }

        packet
    }

    /// Read one report from a blocking reader (host side).
    pub fn read_from<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self, ProtocolError> {
        let id = reader.read_u8()?;
        let packet_id = PacketId::from_u8(id)
            .filter(|pid| pid.is_writable())
            .ok_or(ProtocolError::UnexpectedId(id))?;

        Ok(match packet_id {
            PacketId::Debug => Self::Debug(reader.read_message()?),
            PacketId::Info => Self::Info(reader.read_message()?),
            PacketId::Error => Self::Error(reader.read_message()?),
            PacketId::Pong => Self::Pong {
                timestamp: reader.read_u32()?,
            },
            PacketId::FindLimits => Self::FindLimits,
            PacketId::CheckLimit => Self::CheckLimit,
            PacketId::SoftLimitReached => Self::SoftLimitReached,
            PacketId::DoJiggle => Self::DoJiggle,
            PacketId::Observation => Self::Observation(Observation {
                timestamp_us: reader.read_u32()?,
                cart_id: reader.read_u8()?,
                position_steps: reader.read_i32()?,
                angle_deg: reader.read_f32()?,
            }),
            PacketId::ExperimentStart => Self::ExperimentStart {
                timestamp_us: reader.read_u32()?,
            },
            PacketId::ExperimentStop => Self::ExperimentStop,
            PacketId::ExperimentDone => {
                let cart_id = reader.read_u8()?;
                let failure_mode = read_failure_mode(reader)?;
                Self::ExperimentDone { cart_id, failure_mode }
            }
            PacketId::ExperimentInfo => Self::ExperimentInfo(ExperimentInfo::read(reader)?),
            _ => return Err(ProtocolError::UnexpectedId(id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(bytes: &[u8]) {
        let mut cursor = Cursor::new(bytes);
        let report = Report::read_from(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, bytes.len());
        assert_eq!(report.encode().as_bytes(), bytes, "{report:?}");
    }

    #[test]
    fn fixed_layout_reports_round_trip() {
        round_trip(&[0x50, 0x64, 0x00, 0x00, 0x00]);
        round_trip(&[0x7C]);
        round_trip(&[0x2F]);
        round_trip(&[0x5C]);
        round_trip(&[0xA7]);
        round_trip(&[0x40, 0x10, 0x27, 0x00, 0x00, 0x01, 0xF4, 0x01, 0x00, 0x00, 0x00, 0x00, 0xB4, 0x42]);
        round_trip(&[0x02, 0xE8, 0x03, 0x00, 0x00]);
        round_trip(&[0x03]);
        round_trip(&[0x04, 0x02, 0x01]);
        round_trip(&[0x3A, 0x00, 0x01]);
        round_trip(&[0x3A, 0x01, 0x01, 0xF6, 0xFF, 0xFF, 0xFF]);
        round_trip(&[0x3A, 0x02, 0x00, 0x10, 0x27, 0x00, 0x00]);
        round_trip(&[0x3A, 0x03, 0x01, 0x7F]);
    }

    #[test]
    fn observation_layout() {
        let report = Report::Observation(Observation {
            timestamp_us: 1,
            cart_id: 2,
            position_steps: -3,
            angle_deg: 90.0,
        });
        let bytes = report.encode().into_bytes();
        assert_eq!(bytes.len(), 1 + 4 + 1 + 4 + 4);
        assert_eq!(&bytes[5..6], &[2]);
        assert_eq!(&bytes[6..10], &(-3i32).to_le_bytes());
        assert_eq!(&bytes[10..14], &90.0f32.to_le_bytes());
    }

    #[test]
    fn debug_report_has_crlf() {
        let bytes = Report::Debug("x".into()).encode().into_bytes();
        assert_eq!(bytes, vec![0x23, 1, 0, 0, 0, b'x', 0x0D, 0x0A]);
    }

    #[test]
    fn inbound_only_id_rejected_on_host_side() {
        let mut cursor = Cursor::new(&[0x70, 0, 0, 0, 0][..]);
        assert!(matches!(
            Report::read_from(&mut cursor),
            Err(ProtocolError::UnexpectedId(0x70))
        ));
    }
}
