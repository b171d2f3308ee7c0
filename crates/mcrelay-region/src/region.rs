//! The 32x32-chunk sector-paged `.mcr` container.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::chunk::Chunk;
use crate::error::{RegionError, Result};
use crate::maplog;

/// Chunks per side of a region.
pub const REGION_WIDTH: i32 = 32;
const SECTOR_SIZE: u64 = 4096;
const HEADER_SIZE: u64 = 2 * SECTOR_SIZE;
const ENTRIES: usize = 1024;

/// An in-memory region: up to 1024 chunks keyed by region-local coordinate,
/// plus the region's own world coordinate (used to decide whether a maplog
/// record belongs to it).
pub struct RegionFile {
    pub region_x: i32,
    pub region_z: i32,
    chunks: HashMap<(i32, i32), Chunk>,
}

impl RegionFile {
    #[must_use]
    pub fn new(region_x: i32, region_z: i32) -> Self {
        Self { region_x, region_z, chunks: HashMap::new() }
    }

    #[must_use]
    pub fn chunk(&self, cx: i32, cz: i32) -> Option<&Chunk> {
        self.chunks.get(&(cx, cz))
    }

    pub fn chunk_mut_or_insert(&mut self, cx: i32, cz: i32) -> &mut Chunk {
        self.chunks.entry((cx, cz)).or_insert_with(|| Chunk::new(cx, cz))
    }

    pub fn insert_chunk(&mut self, chunk: Chunk) {
        self.chunks.insert((chunk.chunk_x, chunk.chunk_z), chunk);
    }

    /// Overlays another region's chunks onto this one, in place: on a shared
    /// chunk key, `other`'s chunk wins. Used to merge several `.mcr` inputs
    /// for the same region key in listed order.
    pub fn merge_from(&mut self, other: Self) {
        for (_, chunk) in other.chunks {
            self.insert_chunk(chunk);
        }
    }

    #[must_use]
    pub fn keys(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.chunks.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Loads every chunk referenced by an existing `.mcr` file's two header
    /// pages, sorting by sector offset first so the reads are strictly
    /// forward (matters on spinning disks, and avoids re-reading the header
    /// pages mid-stream).
    pub fn load_mcr(region_x: i32, region_z: i32, reader: &mut (impl Read + Seek)) -> Result<Self> {
        let mut locations = [(0_u32, 0_u8); ENTRIES];
        for slot in &mut locations {
            let mut buf = [0_u8; 4];
            reader.read_exact(&mut buf)?;
            let sector = (u32::from(buf[0]) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]);
            *slot = (sector, buf[3]);
        }
        let mut timestamps = [0_i32; ENTRIES];
        for slot in &mut timestamps {
            *slot = reader.read_i32::<BigEndian>()?;
        }

        let mut entries: Vec<(usize, u32, i32)> = locations
            .iter()
            .zip(timestamps.iter())
            .enumerate()
            .filter(|(_, ((_, count), _))| *count != 0)
            .map(|(i, (&(sector, _count), &ts))| (i, sector, ts))
            .collect();
        entries.sort_by_key(|&(_, sector, _)| sector);

        let mut region = Self::new(region_x, region_z);
        for (i, sector, timestamp) in entries {
            let cx = (i % 32) as i32;
            let cz = (i / 32) as i32;
            reader.seek(SeekFrom::Start(u64::from(sector) * SECTOR_SIZE))?;
            let (chunk, _consumed) = Chunk::load(cx, cz, timestamp, reader)?;
            region.chunks.insert((cx, cz), chunk);
        }
        Ok(region)
    }

    /// Applies every record of a `maplog` reader whose world chunk falls
    /// inside this region; records addressed to other regions are skipped
    /// (a maplog filed under the wrong region key, or one covering a
    /// boundary-straddling capture).
    pub fn load_log(&mut self, reader: &mut impl Read) -> Result<()> {
        for record in maplog::read_records(reader)? {
            let world_cx = record.x >> 4;
            let world_cz = record.z >> 4;
            if world_cx.div_euclid(REGION_WIDTH) != self.region_x
                || world_cz.div_euclid(REGION_WIDTH) != self.region_z
            {
                continue;
            }
            let local_cx = world_cx.rem_euclid(REGION_WIDTH);
            let local_cz = world_cz.rem_euclid(REGION_WIDTH);
            let chunk = self.chunk_mut_or_insert(local_cx, local_cz);
            chunk.put(record.x & 15, record.y & 127, record.z & 15, record.sx, record.sy, record.sz, &record.data)?;
        }
        Ok(())
    }

    /// Writes every held chunk: reserves the two header pages, packs chunks
    /// starting at sector 2 in arbitrary iteration order padded to a sector
    /// boundary, then rewinds to fill in the location and timestamp tables.
    pub fn write(&mut self, writer: &mut (impl Write + Seek)) -> Result<()> {
        writer.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut locations = [(0_u32, 0_u8); ENTRIES];
        let mut timestamps = [0_i32; ENTRIES];
        let mut sector = 2_u32;

        for (&(cx, cz), chunk) in &mut self.chunks {
            let i = (32 * cz.rem_euclid(REGION_WIDTH) + cx.rem_euclid(REGION_WIDTH)) as usize;
            let size = chunk.write(writer)?;
            let sector_count = size.div_ceil(4096);
            if sector_count > 255 {
                return Err(RegionError::ChunkTooLarge(size));
            }
            let padded = sector_count * 4096;
            writer.write_all(&vec![0_u8; padded - size])?;
            locations[i] = (sector, sector_count as u8);
            timestamps[i] = chunk.timestamp;
            sector += sector_count as u32;
        }

        writer.seek(SeekFrom::Start(0))?;
        for &(offset, count) in &locations {
            let be = offset.to_be_bytes();
            writer.write_all(&be[1..])?;
            writer.write_u8(count)?;
        }
        for &timestamp in &timestamps {
            writer.write_i32::<BigEndian>(timestamp)?;
        }
        Ok(())
    }
}
