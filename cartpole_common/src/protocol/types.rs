//! Payload value types shared by [`Command`](super::Command) and
//! [`Report`](super::Report).

use super::error::ProtocolError;
use super::wire::{RawPacket, WireRead};

/// Operation applied by the Set* commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SetOperation {
    Add = b'+',
    Subtract = b'-',
    Equal = b'=',
    /// Leave the quantity unchanged.
    Nul = b'0',
}

impl SetOperation {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'+' => Some(Self::Add),
            b'-' => Some(Self::Subtract),
            b'=' => Some(Self::Equal),
            b'0' => Some(Self::Nul),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Reason an experiment ended.
///
/// Negative values are the left (near) side, positive values the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum FailureMode {
    #[default]
    Nul = 0,
    PositionLeft = -1,
    PositionRight = 1,
    AngleLeft = -2,
    AngleRight = 2,
    Other = 127,
}

impl FailureMode {
    #[inline]
    pub const fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Self::Nul),
            -1 => Some(Self::PositionLeft),
            1 => Some(Self::PositionRight),
            -2 => Some(Self::AngleLeft),
            2 => Some(Self::AngleRight),
            127 => Some(Self::Other),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_i8(self) -> i8 {
        self as i8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nul => "nul",
            Self::PositionLeft => "position/left",
            Self::PositionRight => "position/right",
            Self::AngleLeft => "angle/left",
            Self::AngleRight => "angle/right",
            Self::Other => "other/other",
        }
    }
}

/// Payload of SetPosition / SetVelocity / SetMaxVelocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setpoint {
    pub operation: SetOperation,
    /// 1-based carriage id. Not validated here; the axis lookup rejects
    /// ids that are not configured.
    pub cart_id: u8,
    pub value: i16,
}

impl Setpoint {
    pub(crate) fn read<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self, ProtocolError> {
        // The whole payload is consumed before validation so a bad
        // operation byte does not desynchronise the stream.
        let op = reader.read_u8()?;
        let cart_id = reader.read_u8()?;
        let value = reader.read_i16()?;
        let operation = SetOperation::from_u8(op).ok_or(ProtocolError::InvalidOperation(op))?;
        Ok(Self { operation, cart_id, value })
    }

    pub(crate) fn write(&self, packet: &mut RawPacket) {
        packet
            .push_u8(self.operation.as_u8())
            .push_u8(self.cart_id)
            .push_i16(self.value);
    }
}

/// One telemetry sample for a carriage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub timestamp_us: u32,
    pub cart_id: u8,
    pub position_steps: i32,
    pub angle_deg: f32,
}

/// Discriminant of [`ExperimentInfo`] on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InfoSpecifier {
    Nul = 0,
    PositionDrift = 1,
    TrackLengthSteps = 2,
    FailureMode = 3,
}

impl InfoSpecifier {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Nul),
            1 => Some(Self::PositionDrift),
            2 => Some(Self::TrackLengthSteps),
            3 => Some(Self::FailureMode),
            _ => None,
        }
    }
}

/// Out-of-band experiment information. The specifier fixes the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentInfo {
    Nul { cart_id: u8 },
    /// Offset of the re-measured left bound from the previous zero [steps].
    PositionDrift { cart_id: u8, steps: i32 },
    TrackLengthSteps { cart_id: u8, steps: i32 },
    FailureMode { cart_id: u8, mode: FailureMode },
}

impl ExperimentInfo {
    pub const fn specifier(&self) -> InfoSpecifier {
        match self {
            Self::Nul { .. } => InfoSpecifier::Nul,
            Self::PositionDrift { .. } => InfoSpecifier::PositionDrift,
            Self::TrackLengthSteps { .. } => InfoSpecifier::TrackLengthSteps,
            Self::FailureMode { .. } => InfoSpecifier::FailureMode,
        }
    }

    pub const fn cart_id(&self) -> u8 {
        match *self {
            Self::Nul { cart_id }
            | Self::PositionDrift { cart_id, .. }
            | Self::TrackLengthSteps { cart_id, .. }
            | Self::FailureMode { cart_id, .. } => cart_id,
        }
    }

    pub(crate) fn read<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self, ProtocolError> {
        let raw = reader.read_u8()?;
        let specifier = InfoSpecifier::from_u8(raw).ok_or(ProtocolError::InvalidSpecifier(raw))?;
        let cart_id = reader.read_u8()?;

        Ok(match specifier {
            InfoSpecifier::Nul => Self::Nul { cart_id },
            InfoSpecifier::PositionDrift => Self::PositionDrift {
                cart_id,
                steps: reader.read_i32()?,
            },
            InfoSpecifier::TrackLengthSteps => Self::TrackLengthSteps {
                cart_id,
                steps: reader.read_i32()?,
            },
            InfoSpecifier::FailureMode => {
                let raw = reader.read_i8()?;
                let mode = FailureMode::from_i8(raw).ok_or(ProtocolError::InvalidFailureMode(raw))?;
                Self::FailureMode { cart_id, mode }
            }
        })
    }

    pub(crate) fn write(&self, packet: &mut RawPacket) {
        packet.push_u8(self.specifier() as u8).push_u8(self.cart_id());
        match *self {
            Self::Nul { .. } => {}
            Self::PositionDrift { steps, .. } | Self::TrackLengthSteps { steps, .. } => {
                packet.push_i32(steps);
            }
            Self::FailureMode { mode, .. } => {
                packet.push_i8(mode.as_i8());
            }
        }
    }
}

pub(crate) fn read_failure_mode<R: WireRead + ?Sized>(
    reader: &mut R,
) -> Result<FailureMode, ProtocolError> {
    let raw = reader.read_i8()?;
    FailureMode::from_i8(raw).ok_or(ProtocolError::InvalidFailureMode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn failure_mode_encoding() {
        assert_eq!(FailureMode::Nul.as_i8(), 0);
        assert_eq!(FailureMode::PositionLeft.as_i8(), -1);
        assert_eq!(FailureMode::PositionRight.as_i8(), 1);
        assert_eq!(FailureMode::AngleLeft.as_i8(), -2);
        assert_eq!(FailureMode::AngleRight.as_i8(), 2);
        assert_eq!(FailureMode::Other.as_i8(), 127);
        assert_eq!(FailureMode::from_i8(5), None);
    }

    #[test]
    fn setpoint_rejects_unknown_operation() {
        let mut cursor = Cursor::new(&[b'*', 1, 0, 0][..]);
        assert!(matches!(
            Setpoint::read(&mut cursor),
            Err(ProtocolError::InvalidOperation(b'*'))
        ));
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn info_payload_width_follows_specifier() {
        let mut packet = RawPacket::default();
        ExperimentInfo::Nul { cart_id: 1 }.write(&mut packet);
        assert_eq!(packet.len(), 2);

        let mut packet = RawPacket::default();
        ExperimentInfo::FailureMode { cart_id: 2, mode: FailureMode::AngleLeft }.write(&mut packet);
        assert_eq!(packet.as_bytes(), &[3, 2, 0xFE]);

        let mut packet = RawPacket::default();
        ExperimentInfo::TrackLengthSteps { cart_id: 0, steps: 10_000 }.write(&mut packet);
        assert_eq!(packet.len(), 6);
    }

    #[test]
    fn info_rejects_unknown_specifier() {
        let mut cursor = Cursor::new(&[9u8, 1][..]);
        assert!(matches!(
            ExperimentInfo::read(&mut cursor),
            Err(ProtocolError::InvalidSpecifier(9))
        ));
    }
}
