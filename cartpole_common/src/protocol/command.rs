//! Host → controller packets.

use super::error::ProtocolError;
use super::ids::PacketId;
use super::types::{read_failure_mode, FailureMode, Setpoint};
use super::wire::{RawPacket, WireRead};

/// Every packet the controller accepts from the host.
///
/// Constructed fresh per message and consumed immediately by the reactor.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// No data was available.
    Null,
    /// Identifier not readable by the controller; keeps the raw byte.
    Unknown { observed_id: u8 },
    Debug(String),
    Info(String),
    Error(String),
    Ping { timestamp: u32 },
    RequestDebugInfo,
    SetPosition(Setpoint),
    SetVelocity(Setpoint),
    /// Same wire shape as `SetVelocity`.
    SetMaxVelocity(Setpoint),
    FindLimits,
    CheckLimit,
    DoJiggle,
    ExperimentStart { timestamp_us: u32 },
    ExperimentStop,
    ExperimentDone { cart_id: u8, failure_mode: FailureMode },
}

impl Command {
    /// Decode the payload for an identifier byte that was already read.
    ///
    /// Reads exactly the fixed payload of the resolved variant. An
    /// identifier that is not readable yields `Unknown` and reads nothing.
    pub fn read_payload<R: WireRead + ?Sized>(id: u8, reader: &mut R) -> Result<Self, ProtocolError> {
        let Some(packet_id) = PacketId::from_u8(id).filter(|pid| pid.is_readable()) else {
            return Ok(Self::Unknown { observed_id: id });
        };

        Ok(match packet_id {
            PacketId::Null => Self::Null,
            PacketId::Unknown => Self::Unknown { observed_id: id },
            PacketId::Debug => Self::Debug(reader.read_message()?),
            PacketId::Info => Self::Info(reader.read_message()?),
            PacketId::Error => Self::Error(reader.read_message()?),
            PacketId::Ping => Self::Ping {
                timestamp: reader.read_u32()?,
            },
            PacketId::RequestDebugInfo => Self::RequestDebugInfo,
            PacketId::SetPosition => Self::SetPosition(Setpoint::read(reader)?),
            PacketId::SetVelocity => Self::SetVelocity(Setpoint::read(reader)?),
            PacketId::SetMaxVelocity => Self::SetMaxVelocity(Setpoint::read(reader)?),
            PacketId::FindLimits => Self::FindLimits,
            PacketId::CheckLimit => Self::CheckLimit,
            PacketId::DoJiggle => Self::DoJiggle,
            PacketId::ExperimentStart => Self::ExperimentStart {
                timestamp_us: reader.read_u32()?,
            },
            PacketId::ExperimentStop => Self::ExperimentStop,
            PacketId::ExperimentDone => {
                let cart_id = reader.read_u8()?;
                let failure_mode = read_failure_mode(reader)?;
                Self::ExperimentDone { cart_id, failure_mode }
            }
            PacketId::Pong
            | PacketId::SoftLimitReached
            | PacketId::Observation
            | PacketId::ExperimentInfo => return Err(ProtocolError::UnexpectedId(id)),
        })
    }

    /// Read identifier and payload from a blocking reader.
    pub fn read_from<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self, ProtocolError> {
        let id = reader.read_u8()?;
        Self::read_payload(id, reader)
    }

    /// Identifier byte this command is sent with.
    pub fn id_byte(&self) -> u8 {
        match self {
            Self::Unknown { observed_id } => *observed_id,
            other => other.packet_id().as_u8(),
        }
    }

    pub fn packet_id(&self) -> PacketId {
        match self {
            Self::Null => PacketId::Null,
            Self::Unknown { .. } => PacketId::Unknown,
            Self::Debug(_) => PacketId::Debug,
            Self::Info(_) => PacketId::Info,
            Self::Error(_) => PacketId::Error,
            Self::Ping { .. } => PacketId::Ping,
            Self::RequestDebugInfo => PacketId::RequestDebugInfo,
            Self::SetPosition(_) => PacketId::SetPosition,
            Self::SetVelocity(_) => PacketId::SetVelocity,
            Self::SetMaxVelocity(_) => PacketId::SetMaxVelocity,
            Self::FindLimits => PacketId::FindLimits,
            Self::CheckLimit => PacketId::CheckLimit,
            Self::DoJiggle => PacketId::DoJiggle,
            Self::ExperimentStart { .. } => PacketId::ExperimentStart,
            Self::ExperimentStop => PacketId::ExperimentStop,
            Self::ExperimentDone { .. } => PacketId::ExperimentDone,
        }
    }

    /// Encode as the host would send it.
    pub fn encode(&self) -> RawPacket {
        let mut packet = RawPacket::default();
        packet.push_u8(self.id_byte());

        match self {
            Self::Null
            | Self::Unknown { .. }
            | Self::RequestDebugInfo
            | Self::FindLimits
            | Self::CheckLimit
            | Self::DoJiggle
            | Self::ExperimentStop => {}
            Self::Debug(text) | Self::Info(text) | Self::Error(text) => {
                packet.push_message(text).push_crlf();
            }
            Self::Ping { timestamp } => {
                packet.push_u32(*timestamp);
            }
            Self::SetPosition(setpoint)
            | Self::SetVelocity(setpoint)
            | Self::SetMaxVelocity(setpoint) => setpoint.write(&mut packet),
            Self::ExperimentStart { timestamp_us } => {
                packet.push_u32(*timestamp_us);
            }
            Self::ExperimentDone { cart_id, failure_mode } => {
                packet.push_u8(*cart_id).push_i8(failure_mode.as_i8());
            }
        }

        packet
    }
}
