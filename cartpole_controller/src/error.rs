//! Controller error type.
//!
//! Safety faults are not errors: the motion APIs return classification
//! values and the fault path reports them to the host as packets.

use std::io;

use cartpole_common::config::ConfigError;
use cartpole_common::protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the controller runtime.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Malformed packet payload.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A command addressed a carriage that is not configured.
    #[error("Invalid cart id: {0}")]
    InvalidCartId(u8),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ControllerError {
    /// Whether the main loop may report the error and keep running.
    ///
    /// Transport failures end the session; everything else is local to
    /// one packet.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Protocol(ProtocolError::Io { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cart_is_recoverable() {
        assert!(ControllerError::InvalidCartId(3).is_recoverable());
        assert_eq!(
            ControllerError::InvalidCartId(3).to_string(),
            "Invalid cart id: 3"
        );
    }

    #[test]
    fn transport_errors_are_fatal() {
        let err = ControllerError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(!err.is_recoverable());

        let err = ControllerError::from(ProtocolError::from(io::Error::from(
            io::ErrorKind::UnexpectedEof,
        )));
        assert!(!err.is_recoverable());

        let err = ControllerError::from(ProtocolError::InvalidOperation(b'*'));
        assert!(err.is_recoverable());
    }
}
