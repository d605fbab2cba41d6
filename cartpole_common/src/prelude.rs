//! Prelude module for common re-exports.
//!
//! ```rust
//! use cartpole_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{CRLF, INITIAL_OUTPUT_STOP_MARKER, MAX_CARTS};

// ─── Protocol ───────────────────────────────────────────────────────
pub use crate::protocol::{
    Command, Direction, ExperimentInfo, FailureMode, InfoSpecifier, Observation, PacketId,
    ProtocolError, RawPacket, Report, SetOperation, Setpoint, WireRead,
};
