use std::io::Cursor;

use crate::{maplog, Chunk, RegionFile, DEPTH, HEIGHT, WIDTH};

fn full_chunk_patch(block_id: u8) -> Vec<u8> {
    let nblks = (WIDTH * HEIGHT * DEPTH) as usize;
    let mut data = vec![block_id; nblks];
    data.extend(vec![0_u8; nblks / 2 * 3]); // Data/SkyLight/BlockLight nibbles, all zero
    data
}

#[test]
fn region_round_trip_preserves_blocks_and_timestamp() {
    // S5: one chunk at key (0,0,0), all-stone block array.
    let mut region = RegionFile::new(0, 0);
    let mut chunk = Chunk::new(0, 0);
    chunk.timestamp = 1234;
    chunk.put(0, 0, 0, WIDTH, HEIGHT, DEPTH, &full_chunk_patch(1)).unwrap();
    region.insert_chunk(chunk);

    let mut buf = Cursor::new(Vec::new());
    region.write(&mut buf).unwrap();

    let mut reader = Cursor::new(buf.into_inner());
    let reloaded = RegionFile::load_mcr(0, 0, &mut reader).unwrap();

    assert_eq!(reloaded.len(), 1);
    let chunk = reloaded.chunk(0, 0).expect("chunk present");
    assert_eq!(chunk.timestamp, 1234);
    assert_eq!(chunk.blocks(), &vec![1_u8; (WIDTH * HEIGHT * DEPTH) as usize][..]);
}

#[test]
fn region_round_trip_accounts_for_every_sector() {
    let mut region = RegionFile::new(0, 0);
    for i in 0..3 {
        let mut chunk = Chunk::new(i, 0);
        chunk.put(0, 0, 0, WIDTH, HEIGHT, DEPTH, &full_chunk_patch(i as u8)).unwrap();
        region.insert_chunk(chunk);
    }
    let mut buf = Cursor::new(Vec::new());
    region.write(&mut buf).unwrap();
    let bytes = buf.into_inner();
    assert_eq!(bytes.len() % 4096, 0);

    let mut reader = Cursor::new(bytes);
    let reloaded = RegionFile::load_mcr(0, 0, &mut reader).unwrap();
    assert_eq!(reloaded.len(), 3);
}

#[test]
fn maplog_merge_places_single_block() {
    // S6: empty region, one 1x1x1 patch at world (5,70,7) placing block id 2.
    let mut log = Vec::new();
    maplog::append_record(&mut log, 5, 70, 7, 1, 1, 1, &[2, 0, 0]).unwrap();

    let mut region = RegionFile::new(0, 0);
    region.load_log(&mut Cursor::new(log)).unwrap();

    let chunk = region.chunk(0, 0).expect("chunk created by patch");
    assert_eq!(chunk.block_at(5, 70, 7), 2);
    assert_eq!(chunk.block_at(5, 71, 7), 0);
    assert_eq!(chunk.block_at(6, 70, 7), 0);
}

#[test]
fn maplog_last_write_wins_on_overlap() {
    let mut log = Vec::new();
    maplog::append_record(&mut log, 0, 0, 0, 1, 1, 1, &[1, 0, 0]).unwrap();
    maplog::append_record(&mut log, 0, 0, 0, 1, 1, 1, &[9, 0, 0]).unwrap();

    let mut region = RegionFile::new(0, 0);
    region.load_log(&mut Cursor::new(log)).unwrap();

    assert_eq!(region.chunk(0, 0).unwrap().block_at(0, 0, 0), 9);
}

#[test]
fn maplog_disjoint_cells_commute() {
    let mut forward = Vec::new();
    maplog::append_record(&mut forward, 0, 0, 0, 1, 1, 1, &[1, 0, 0]).unwrap();
    maplog::append_record(&mut forward, 1, 0, 0, 1, 1, 1, &[2, 0, 0]).unwrap();

    let mut backward = Vec::new();
    maplog::append_record(&mut backward, 1, 0, 0, 1, 1, 1, &[2, 0, 0]).unwrap();
    maplog::append_record(&mut backward, 0, 0, 0, 1, 1, 1, &[1, 0, 0]).unwrap();

    let mut region_a = RegionFile::new(0, 0);
    region_a.load_log(&mut Cursor::new(forward)).unwrap();
    let mut region_b = RegionFile::new(0, 0);
    region_b.load_log(&mut Cursor::new(backward)).unwrap();

    let chunk_a = region_a.chunk(0, 0).unwrap();
    let chunk_b = region_b.chunk(0, 0).unwrap();
    assert_eq!(chunk_a.block_at(0, 0, 0), chunk_b.block_at(0, 0, 0));
    assert_eq!(chunk_a.block_at(1, 0, 0), chunk_b.block_at(1, 0, 0));
}

#[test]
fn patch_silently_drops_out_of_bounds_cells() {
    let mut chunk = Chunk::new(0, 0);
    // offset x0=15, sx=2 means one of the two columns (x=16) is out of range.
    let data = {
        let nblks = 2 * 1 * 1;
        let mut data = vec![7_u8; nblks];
        data.extend(vec![0_u8; nblks / 2 * 3]);
        data
    };
    chunk.put(15, 0, 0, 2, 1, 1, &data).unwrap();
    assert_eq!(chunk.block_at(15, 0, 0), 7);
}

#[test]
fn region_filters_maplog_records_outside_its_bounds() {
    let mut log = Vec::new();
    // region (0,0) covers world x,z in [0,512); this record targets region (1,0).
    maplog::append_record(&mut log, 600, 0, 0, 1, 1, 1, &[4, 0, 0]).unwrap();

    let mut region = RegionFile::new(0, 0);
    region.load_log(&mut Cursor::new(log)).unwrap();
    assert!(region.is_empty());
}
