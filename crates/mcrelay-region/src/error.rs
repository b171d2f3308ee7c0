use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Nbt(#[from] mcrelay_nbt::NbtError),
    #[error("chunk compressed size {0} bytes exceeds the 255-sector limit")]
    ChunkTooLarge(usize),
    #[error("patch data length {actual} does not match the {sx}x{sy}x{sz} volume (expected {expected})")]
    PatchSizeMismatch { sx: i32, sy: i32, sz: i32, expected: usize, actual: usize },
    #[error("map-chunk payload is too short to hold every section its bitmaps declare")]
    MapChunkTruncated,
    #[error("chunk sector header declares a zero-length payload")]
    ZeroLengthChunk,
}

pub type Result<T> = std::result::Result<T, RegionError>;
