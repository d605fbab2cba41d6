//! Binary packet protocol between host and controller.
//!
//! Every message starts with a one-byte [`PacketId`], followed by a
//! fixed-order, little-endian payload. Debug/Info/Error messages carry a
//! `u32` length prefix and a CRLF terminator.
//!
//! Packets are split by direction capability:
//!
//! - [`Command`]: host → controller (readable by the controller)
//! - [`Report`]: controller → host (writable by the controller)
//!
//! Bidirectional identifiers (e.g. `FindLimits`) appear in both.

pub mod command;
pub mod error;
pub mod ids;
pub mod report;
pub mod types;
pub mod wire;

pub use command::Command;
pub use error::ProtocolError;
pub use ids::{Direction, PacketId};
pub use report::Report;
pub use types::{ExperimentInfo, FailureMode, InfoSpecifier, Observation, SetOperation, Setpoint};
pub use wire::{RawPacket, WireRead};
