//! Cartpole Common Library
//!
//! This crate provides the binary wire protocol spoken between the host
//! computer and the cartpole controller, together with shared constants
//! and configuration loading utilities.
//!
//! # Module Structure
//!
//! - [`protocol`] - Packet identifiers, wire codec and packet model
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Protocol-level constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cartpole_common::prelude::*;
//!
//! let ping = Command::Ping { timestamp: 100 };
//! assert_eq!(ping.encode().as_bytes(), &[0x70, 100, 0, 0, 0]);
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod protocol;
