//! Decodes a `0x33` map-chunk packet's still-compressed wire payload into
//! per-section patch volumes in [`crate::Chunk::put`]'s shape.
//!
//! The wire groups section data by field across every populated section
//! (all Block arrays, then all Data nibbles, then all Block Light nibbles,
//! then all Sky Light nibbles) rather than per-section, and orders the
//! light nibbles block-light-before-sky-light; `Chunk::put` expects one
//! combined nibble stream per section ordered data/sky/block-light. This
//! module is the seam that reshapes one into the other.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{RegionError, Result};
use crate::nibble;

const SECTION_BLOCKS: usize = 16 * 16 * 16;
const SECTION_NIBBLE_BYTES: usize = SECTION_BLOCKS / 2;
const SECTIONS: u32 = 16;

/// One populated 16-tall section's patch, ready for `Chunk::put(x=0, y0,
/// z=0, 16, 16, 16, data)`.
pub struct SectionPatch {
    pub y0: i32,
    pub data: Vec<u8>,
}

/// Inflates `compressed` and splits it into one [`SectionPatch`] per bit set
/// in `primary_bitmap`. The `add_bitmap` extension (a second block-id nibble
/// plane for ids above 255) and any trailing biome array are not consumed by
/// this system and are left unread at the end of the buffer.
pub fn decode_wire_chunk(primary_bitmap: u16, compressed: &[u8]) -> Result<Vec<SectionPatch>> {
    let mut decompressed = Vec::new();
    ZlibDecoder::new(compressed).read_to_end(&mut decompressed)?;

    let sections: Vec<u32> = (0..SECTIONS).filter(|i| primary_bitmap & (1 << i) != 0).collect();
    let n = sections.len();
    let needed = n * (SECTION_BLOCKS + 3 * SECTION_NIBBLE_BYTES);
    if decompressed.len() < needed {
        return Err(RegionError::MapChunkTruncated);
    }

    let mut offset = 0;
    let blocks_all = take(&decompressed, &mut offset, n * SECTION_BLOCKS);
    let data_all = take(&decompressed, &mut offset, n * SECTION_NIBBLE_BYTES);
    let blocklight_all = take(&decompressed, &mut offset, n * SECTION_NIBBLE_BYTES);
    let skylight_all = take(&decompressed, &mut offset, n * SECTION_NIBBLE_BYTES);

    let mut out = Vec::with_capacity(n);
    for (idx, §ion) in sections.iter().enumerate() {
        let blocks = &blocks_all[idx * SECTION_BLOCKS..(idx + 1) * SECTION_BLOCKS];
        let data_nibs = nibble::unpack(&data_all[idx * SECTION_NIBBLE_BYTES..(idx + 1) * SECTION_NIBBLE_BYTES]);
        let blocklight_nibs =
            nibble::unpack(&blocklight_all[idx * SECTION_NIBBLE_BYTES..(idx + 1) * SECTION_NIBBLE_BYTES]);
        let skylight_nibs =
            nibble::unpack(&skylight_all[idx * SECTION_NIBBLE_BYTES..(idx + 1) * SECTION_NIBBLE_BYTES]);

        let mut combined_nibs = Vec::with_capacity(3 * SECTION_BLOCKS);
        combined_nibs.extend_from_slice(&data_nibs);
        combined_nibs.extend_from_slice(&skylight_nibs);
        combined_nibs.extend_from_slice(&blocklight_nibs);

        let mut patch = blocks.to_vec();
        patch.extend_from_slice(&nibble::pack(&combined_nibs));
        out.push(SectionPatch { y0: (section * 16) as i32, data: patch });
    }
    Ok(out)
}

fn take<'a>(buf: &'a [u8], offset: &mut usize, len: usize) -> &'a [u8] {
    let slice = &buf[*offset..*offset + len];
    *offset += len;
    slice
}
