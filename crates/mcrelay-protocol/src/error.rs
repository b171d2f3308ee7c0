use thiserror::Error;

/// A fatal defect in the byte stream: the parser can no longer determine
/// where the next packet starts.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid packet: opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("invalid metadata type: 0x{0:02x}")]
    InvalidMetadata(u8),
    #[error("string payload is not valid UTF-16")]
    InvalidString,
    #[error("map-chunk packet claims a negative payload length: {0}")]
    NegativeMapChunkLength(i32),
}
