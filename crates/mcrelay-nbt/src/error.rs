use thiserror::Error;

/// Failure reading or writing a Named Binary Tag stream.
#[derive(Debug, Error)]
pub enum NbtError {
    #[error("unexpected end of NBT data")]
    Eof,
    #[error("unknown NBT tag: {0}")]
    UnknownTag(u8),
    #[error("negative length in NBT data: {0}")]
    NegativeLength(i32),
    #[error("NBT string is not valid UTF-8")]
    InvalidUtf8,
    #[error("trailing bytes after NBT root")]
    TrailingData,
}

impl From<std::io::Error> for NbtError {
    fn from(_: std::io::Error) -> Self {
        Self::Eof
    }
}
