use thiserror::Error;

/// Errors raised while decoding packets from a byte stream.
///
/// Encoding never fails; every error here comes from the read side.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The transport failed or closed while a field was being read.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Setpoint operation byte is not one of `+`, `-`, `=`, `0`.
    #[error("Invalid set operation: {0:#04x}")]
    InvalidOperation(u8),

    /// Failure mode byte outside the known encoding.
    #[error("Invalid failure mode: {0}")]
    InvalidFailureMode(i8),

    /// ExperimentInfo specifier outside the known encoding.
    #[error("Invalid experiment info specifier: {0}")]
    InvalidSpecifier(u8),

    /// Message length prefix exceeds the protocol maximum.
    #[error("Message too long: {len} bytes")]
    MessageTooLong { len: u32 },

    /// Message text is not valid UTF-8.
    #[error("Message text is not valid UTF-8")]
    InvalidText,

    /// Identifier is not legal in the direction being decoded.
    #[error("Unexpected packet id {0:#04x} for this direction")]
    UnexpectedId(u8),
}
