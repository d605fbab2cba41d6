//! Protocol-level constants shared by the controller and host tooling.

/// Maximum number of carriages on one track.
pub const MAX_CARTS: usize = 2;

/// Terminator appended to every Debug/Info/Error packet.
pub const CRLF: [u8; 2] = [0x0D, 0x0A];

/// Upper bound for the text length of a message packet.
///
/// Decoding rejects longer lengths instead of allocating whatever the
/// length prefix claims.
pub const MAX_MESSAGE_LEN: u32 = 4096;

/// Raw marker written once after the startup banner.
///
/// The host reads and discards everything up to and including this marker
/// before it starts parsing packets.
pub const INITIAL_OUTPUT_STOP_MARKER: &[u8] = b"END OF INITIALISATION\n";
