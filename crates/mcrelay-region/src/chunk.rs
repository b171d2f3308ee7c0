use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use mcrelay_nbt::{Compound, Value};

use crate::error::{RegionError, Result};
use crate::nibble;

pub const WIDTH: i32 = 16;
pub const HEIGHT: i32 = 128;
pub const DEPTH: i32 = 16;
pub const VOLUME: usize = (WIDTH * HEIGHT * DEPTH) as usize;

const fn cell_index(x: i32, z: i32, y: i32) -> usize {
    (x * HEIGHT * DEPTH + z * HEIGHT + y) as usize
}

/// A single 16x128x16 column of blocks, kept in the same in-memory shape the
/// wire and the `.mcr` NBT format both use: one byte per block id and one
/// nibble per `Data`/`SkyLight`/`BlockLight` cell (unpacked to a full byte of
/// storage here for easy indexing).
pub struct Chunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub timestamp: i32,
    blocks: Vec<u8>,
    data: Vec<u8>,
    skylight: Vec<u8>,
    blocklight: Vec<u8>,
    /// The full NBT root as last read from disk (or freshly built), kept so
    /// that `write` round-trips any field this crate does not interpret.
    nbt: Value,
}

impl Chunk {
    #[must_use]
    pub fn new(chunk_x: i32, chunk_z: i32) -> Self {
        let mut level = Compound::new();
        level.insert("Blocks", Value::ByteArray(vec![0; VOLUME]));
        level.insert("Data", Value::ByteArray(vec![0; VOLUME / 2]));
        level.insert("SkyLight", Value::ByteArray(vec![0; VOLUME / 2]));
        level.insert("BlockLight", Value::ByteArray(vec![0; VOLUME / 2]));
        level.insert("xPos", Value::Int(chunk_x));
        level.insert("zPos", Value::Int(chunk_z));
        let mut root = Compound::new();
        root.insert("Level", Value::Compound(level));
        let mut wrapper = Compound::new();
        wrapper.insert("", Value::Compound(root));

        Self {
            chunk_x,
            chunk_z,
            timestamp: 0,
            blocks: vec![0; VOLUME],
            data: vec![0; VOLUME],
            skylight: vec![0; VOLUME],
            blocklight: vec![0; VOLUME],
            nbt: Value::Compound(wrapper),
        }
    }

    /// Copies a `sx`x`sy`x`sz` sub-volume of blocks/data/light into this
    /// chunk at local offset `(x0,y0,z0)`. `data` is block ids followed by
    /// nibble-packed `Data`, `SkyLight`, `BlockLight` in that order, matching
    /// the maplog record payload shape exactly.
    ///
    /// Columns or cells that fall outside `[0,16)x[0,128)x[0,16)` are
    /// silently dropped rather than rejected.
    pub fn put(&mut self, x0: i32, y0: i32, z0: i32, sx: i32, sy: i32, sz: i32, data: &[u8]) -> Result<()> {
        let nblks = i64::from(sx) * i64::from(sy) * i64::from(sz);
        if nblks < 0 {
            return Err(RegionError::PatchSizeMismatch { sx, sy, sz, expected: 0, actual: data.len() });
        }
        let nblks = nblks as usize;
        // block ids (1 byte each) plus data/sky/block light (1 nibble each, packed
        // continuously across all three arrays, 2 nibbles per byte).
        let expected = nblks + (3 * nblks).div_ceil(2);
        if data.len() != expected {
            return Err(RegionError::PatchSizeMismatch { sx, sy, sz, expected, actual: data.len() });
        }

        let blockids = &data[..nblks];
        let nibs = nibble::unpack(&data[nblks..]);
        let blockdata = &nibs[..nblks];
        let skylight = &nibs[nblks..nblks * 2];
        let blocklight = &nibs[nblks * 2..nblks * 3];

        if x0 == 0 && y0 == 0 && z0 == 0 && sx == WIDTH && sz == DEPTH && sy == HEIGHT {
            self.blocks.copy_from_slice(blockids);
            self.data.copy_from_slice(blockdata);
            self.skylight.copy_from_slice(skylight);
            self.blocklight.copy_from_slice(blocklight);
            return Ok(());
        }

        for dx in 0..sx {
            let x = x0 + dx;
            if !(0..WIDTH).contains(&x) {
                continue;
            }
            for dz in 0..sz {
                let z = z0 + dz;
                if !(0..DEPTH).contains(&z) {
                    continue;
                }
                let n = (HEIGHT - y0 - sy).min(sy).max(0);
                if n <= 0 || y0 < 0 || y0 >= HEIGHT {
                    continue;
                }
                let n = n as usize;
                let i1 = cell_index(x, z, y0);
                let j1 = (dx as usize) * (sz as usize) * (sy as usize) + (dz as usize) * (sy as usize);
                self.blocks[i1..i1 + n].copy_from_slice(&blockids[j1..j1 + n]);
                self.data[i1..i1 + n].copy_from_slice(&blockdata[j1..j1 + n]);
                self.skylight[i1..i1 + n].copy_from_slice(&skylight[j1..j1 + n]);
                self.blocklight[i1..i1 + n].copy_from_slice(&blocklight[j1..j1 + n]);
            }
        }
        Ok(())
    }

    /// The full block-id array, in `index = x*16*128 + z*128 + y` order.
    #[must_use]
    pub fn blocks(&self) -> &[u8] {
        &self.blocks
    }

    /// The block id at local coordinates `(x, y, z)`.
    #[must_use]
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> u8 {
        self.blocks[cell_index(x, z, y)]
    }

    fn level_mut(&mut self) -> &mut Compound {
        let Value::Compound(wrapper) = &mut self.nbt else { unreachable!("chunk NBT root is always a compound") };
        let Some(Value::Compound(root)) = wrapper.get_mut("") else {
            unreachable!("chunk NBT root always has an unnamed child")
        };
        let Some(Value::Compound(level)) = root.get_mut("Level") else {
            unreachable!("chunk NBT root always has a Level child")
        };
        level
    }

    /// Reads a chunk sector: `u32 length, u8 method` header followed by
    /// `length-1` zlib-compressed bytes. Returns the chunk and the number of
    /// bytes consumed from `reader` (`length + 4`).
    pub fn load(chunk_x: i32, chunk_z: i32, timestamp: i32, reader: &mut impl Read) -> Result<(Self, usize)> {
        let length = reader.read_u32::<BigEndian>()?;
        if length == 0 {
            return Err(RegionError::ZeroLengthChunk);
        }
        let _method = reader.read_u8()?;
        let mut compressed = vec![0_u8; (length - 1) as usize];
        reader.read_exact(&mut compressed)?;
        let mut raw = Vec::new();
        ZlibDecoder::new(&compressed[..]).read_to_end(&mut raw)?;

        let nbt = mcrelay_nbt::parse(&raw)?;
        let level = {
            let Value::Compound(wrapper) = &nbt else { unreachable!() };
            let root = wrapper.get("").and_then(Value::as_compound);
            root.and_then(|root| root.get("Level")).and_then(Value::as_compound).expect("chunk NBT has Level")
        };
        let blocks = level.get("Blocks").and_then(Value::as_byte_array).unwrap_or(&[]).to_vec();
        let data = nibble::unpack(level.get("Data").and_then(Value::as_byte_array).unwrap_or(&[]));
        let skylight = nibble::unpack(level.get("SkyLight").and_then(Value::as_byte_array).unwrap_or(&[]));
        let blocklight = nibble::unpack(level.get("BlockLight").and_then(Value::as_byte_array).unwrap_or(&[]));

        let chunk = Self { chunk_x, chunk_z, timestamp, blocks, data, skylight, blocklight, nbt };
        Ok((chunk, length as usize + 4))
    }

    /// Re-packs the four arrays into the retained NBT tree, zlib-compresses
    /// it, and writes the sector header plus payload. Returns the number of
    /// bytes written (`5 + compressed length`).
    pub fn write(&mut self, writer: &mut impl Write) -> Result<usize> {
        let blocks = self.blocks.clone();
        let data = nibble::pack(&self.data);
        let skylight = nibble::pack(&self.skylight);
        let blocklight = nibble::pack(&self.blocklight);
        let level = self.level_mut();
        level.insert("Blocks", Value::ByteArray(blocks));
        level.insert("Data", Value::ByteArray(data));
        level.insert("SkyLight", Value::ByteArray(skylight));
        level.insert("BlockLight", Value::ByteArray(blocklight));

        let raw = mcrelay_nbt::serialize(&self.nbt);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;

        writer.write_u32::<BigEndian>(compressed.len() as u32 + 1)?;
        writer.write_u8(2)?;
        writer.write_all(&compressed)?;
        Ok(compressed.len() + 5)
    }
}
