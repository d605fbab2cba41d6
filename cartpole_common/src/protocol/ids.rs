//! Packet identifiers and their direction capability.
//!
//! "Inbound" is host → controller, "Outbound" is controller → host.

use static_assertions::const_assert;

/// Direction capability of a packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Never transmitted; stands for "no data".
    None,
    /// Host → controller only.
    Inbound,
    /// Controller → host only.
    Outbound,
    /// Legal in both directions.
    Bidirectional,
}

/// One-byte packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketId {
    Null = 0x00,
    Unknown = 0x3F,
    Debug = 0x23,
    Info = 0x7E,
    Error = 0x21,
    Ping = 0x70,
    Pong = 0x50,
    RequestDebugInfo = 0x24,
    SetPosition = 0x78,
    SetVelocity = 0x76,
    SetMaxVelocity = 0x77,
    FindLimits = 0x7C,
    CheckLimit = 0x2F,
    SoftLimitReached = 0x5C,
    DoJiggle = 0xA7,
    Observation = 0x40,
    ExperimentStart = 0x02,
    ExperimentStop = 0x03,
    ExperimentDone = 0x04,
    ExperimentInfo = 0x3A,
}

impl PacketId {
    /// Every identifier of the protocol.
    pub const ALL: [PacketId; 20] = [
        Self::Null,
        Self::Unknown,
        Self::Debug,
        Self::Info,
        Self::Error,
        Self::Ping,
        Self::Pong,
        Self::RequestDebugInfo,
        Self::SetPosition,
        Self::SetVelocity,
        Self::SetMaxVelocity,
        Self::FindLimits,
        Self::CheckLimit,
        Self::SoftLimitReached,
        Self::DoJiggle,
        Self::Observation,
        Self::ExperimentStart,
        Self::ExperimentStop,
        Self::ExperimentDone,
        Self::ExperimentInfo,
    ];

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        let mut i = 0;
        while i < Self::ALL.len() {
            if Self::ALL[i] as u8 == value {
                return Some(Self::ALL[i]);
            }
            i += 1;
        }
        None
    }

    pub const fn direction(self) -> Direction {
        match self {
            Self::Null => Direction::None,
            Self::Unknown
            | Self::Ping
            | Self::RequestDebugInfo
            | Self::SetPosition
            | Self::SetVelocity
            | Self::SetMaxVelocity => Direction::Inbound,
            Self::Pong | Self::SoftLimitReached | Self::Observation | Self::ExperimentInfo => {
                Direction::Outbound
            }
            Self::Debug
            | Self::Info
            | Self::Error
            | Self::FindLimits
            | Self::CheckLimit
            | Self::DoJiggle
            | Self::ExperimentStart
            | Self::ExperimentStop
            | Self::ExperimentDone => Direction::Bidirectional,
        }
    }

    /// Whether the controller accepts this identifier from the host.
    #[inline]
    pub const fn is_readable(self) -> bool {
        matches!(
            self.direction(),
            Direction::Inbound | Direction::Bidirectional | Direction::None
        )
    }

    /// Whether the controller may send this identifier to the host.
    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(self.direction(), Direction::Outbound | Direction::Bidirectional)
    }
}

const fn ids_are_unique(ids: &[PacketId]) -> bool {
    let mut i = 0;
    while i < ids.len() {
        let mut j = i + 1;
        while j < ids.len() {
            if ids[i] as u8 == ids[j] as u8 {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const_assert!(ids_are_unique(&PacketId::ALL));
