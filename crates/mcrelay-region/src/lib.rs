//! Chunk storage, `.mcr` region files, and the `maplog` patch format.
//!
//! A [`Chunk`] is a 16x128x16 cell volume; a [`RegionFile`] is the 32x32
//! sector-paged container that holds up to 1024 of them. `maplog` is this
//! system's own append-only patch log: every record names a sub-volume and
//! a zlib-compressed payload, replayed onto a region's chunks in order. See
//! [`decode_wire_chunk`] for the seam between a live `0x33` packet payload
//! and a maplog record.

mod chunk;
mod error;
mod maplog;
mod nibble;
mod region;
mod wire;

#[cfg(test)]
mod tests;

pub use chunk::{Chunk, DEPTH, HEIGHT, VOLUME, WIDTH};
pub use error::{RegionError, Result};
pub use maplog::{append_record, append_record_precompressed, read_records, MaplogRecord};
pub use region::{RegionFile, REGION_WIDTH};
pub use wire::{decode_wire_chunk, SectionPatch};
