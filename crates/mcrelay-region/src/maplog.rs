//! Append-only chunk-patch log: a sequence of
//! `x,y,z,sx-1,sy-1,sz-1,n,zlib[n]` records with no trailer. Each record's
//! decompressed payload is a [`crate::Chunk::put`]-shaped sub-volume.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::Result;

/// One decoded maplog record: a patch volume at world coordinates `(x,y,z)`
/// of shape `sx`x`sy`x`sz`, with its payload already inflated.
pub struct MaplogRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub sx: i32,
    pub sy: i32,
    pub sz: i32,
    pub data: Vec<u8>,
}

/// Compresses `data` and appends a record. `sx`/`sy`/`sz` are the patch's
/// actual dimensions; the wire format stores each minus one.
pub fn append_record(
    writer: &mut impl Write,
    x: i32,
    y: i32,
    z: i32,
    sx: i32,
    sy: i32,
    sz: i32,
    data: &[u8],
) -> Result<()> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    append_record_precompressed(writer, x, y, z, sx, sy, sz, &compressed)
}

/// As [`append_record`], but `compressed` is already zlib bytes the caller
/// holds (no recompression).
pub fn append_record_precompressed(
    writer: &mut impl Write,
    x: i32,
    y: i32,
    z: i32,
    sx: i32,
    sy: i32,
    sz: i32,
    compressed: &[u8],
) -> Result<()> {
    writer.write_i32::<BigEndian>(x)?;
    writer.write_i32::<BigEndian>(y)?;
    writer.write_i32::<BigEndian>(z)?;
    writer.write_i32::<BigEndian>(sx - 1)?;
    writer.write_i32::<BigEndian>(sy - 1)?;
    writer.write_i32::<BigEndian>(sz - 1)?;
    writer.write_i32::<BigEndian>(compressed.len() as i32)?;
    writer.write_all(compressed)?;
    Ok(())
}

/// Reads every record until EOF. A maplog file has no trailer or count
/// prefix, so end-of-file at a record boundary is the only valid stop.
pub fn read_records(reader: &mut impl Read) -> Result<Vec<MaplogRecord>> {
    let mut out = Vec::new();
    loop {
        let mut header = [0_u8; 28];
        if !read_full_or_eof(reader, &mut header)? {
            break;
        }
        let mut cur = &header[..];
        let x = cur.read_i32::<BigEndian>()?;
        let y = cur.read_i32::<BigEndian>()?;
        let z = cur.read_i32::<BigEndian>()?;
        let sx = cur.read_i32::<BigEndian>()? + 1;
        let sy = cur.read_i32::<BigEndian>()? + 1;
        let sz = cur.read_i32::<BigEndian>()? + 1;
        let n = cur.read_i32::<BigEndian>()?;
        let mut compressed = vec![0_u8; n.max(0) as usize];
        reader.read_exact(&mut compressed)?;
        let mut data = Vec::new();
        ZlibDecoder::new(&compressed[..]).read_to_end(&mut data)?;
        out.push(MaplogRecord { x, y, z, sx, sy, sz, data });
    }
    Ok(out)
}

/// Reads exactly `buf.len()` bytes, or reports a clean EOF if zero bytes
/// were available at all (a truncated record mid-header is a real I/O
/// error, not end-of-file).
fn read_full_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        filled += n;
    }
    Ok(true)
}
