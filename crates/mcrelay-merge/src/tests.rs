use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use mcrelay_region::{maplog, Chunk, RegionFile};

use crate::input::overlaps;
use crate::{parse_name, Kind, MergeOptions, RegionMerger};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn scratch_dir(tag: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("mcrelay-merge-test-{}-{tag}-{n}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn parse_name_accepts_signed_coordinates_case_insensitively() {
    assert_eq!(parse_name("r.-1.2.mcr"), Some((-1, 2, Kind::Mcr)));
    assert_eq!(parse_name("R.0.0.MAPLOG"), Some((0, 0, Kind::Maplog)));
    assert_eq!(parse_name("notaregionfile.txt"), None);
    assert_eq!(parse_name("r.1.1.txt"), None);
}

#[test]
fn bbox_overlap_matches_half_open_semantics() {
    assert!(overlaps((0, 0, 512, 512), (0, 0, 512, 512)));
    assert!(overlaps((0, 0, 512, 512), (256, 256, 768, 768)));
    assert!(!overlaps((0, 0, 512, 512), (512, 0, 1024, 512)));
    assert!(!overlaps((0, 0, 512, 512), (-512, 0, 0, 512)));
}

#[test]
fn single_mcr_with_no_maplog_is_copied_verbatim() {
    let input_dir = scratch_dir("copy-in");
    let output_dir = scratch_dir("copy-out");
    let source = input_dir.join("r.0.0.mcr");
    std::fs::write(&source, b"not a real region file, just bytes to copy").unwrap();

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: None,
        origin_shift: None,
        force: false,
    });
    merger.add_path(&source).unwrap();
    let written = merger.run().unwrap();

    assert_eq!(written, vec![output_dir.join("r.0.0.mcr")]);
    assert_eq!(std::fs::read(output_dir.join("r.0.0.mcr")).unwrap(), b"not a real region file, just bytes to copy");
}

#[test]
fn existing_output_is_left_alone_unless_forced() {
    let input_dir = scratch_dir("skip-in");
    let output_dir = scratch_dir("skip-out");
    std::fs::write(input_dir.join("r.0.0.mcr"), b"new content").unwrap();
    std::fs::write(output_dir.join("r.0.0.mcr"), b"old content").unwrap();

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: None,
        origin_shift: None,
        force: false,
    });
    merger.add_path(&input_dir.join("r.0.0.mcr")).unwrap();
    let written = merger.run().unwrap();
    assert!(written.is_empty());
    assert_eq!(std::fs::read(output_dir.join("r.0.0.mcr")).unwrap(), b"old content");

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: None,
        origin_shift: None,
        force: true,
    });
    merger.add_path(&input_dir.join("r.0.0.mcr")).unwrap();
    let written = merger.run().unwrap();
    assert_eq!(written, vec![output_dir.join("r.0.0.mcr")]);
    assert_eq!(std::fs::read(output_dir.join("r.0.0.mcr")).unwrap(), b"new content");
}

#[test]
fn bbox_filter_drops_regions_outside_target() {
    let input_dir = scratch_dir("bbox-in");
    let output_dir = scratch_dir("bbox-out");
    std::fs::write(input_dir.join("r.0.0.mcr"), b"inside").unwrap();
    std::fs::write(input_dir.join("r.5.5.mcr"), b"outside").unwrap();

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: Some((0, 0, 512, 512)),
        origin_shift: None,
        force: false,
    });
    merger.add_path(&input_dir.join("r.0.0.mcr")).unwrap();
    merger.add_path(&input_dir.join("r.5.5.mcr")).unwrap();
    let written = merger.run().unwrap();

    assert_eq!(written, vec![output_dir.join("r.0.0.mcr")]);
    assert!(!output_dir.join("r.5.5.mcr").exists());
}

#[test]
fn origin_shift_moves_each_axis_independently() {
    let input_dir = scratch_dir("shift-in");
    let output_dir = scratch_dir("shift-out");
    std::fs::write(input_dir.join("r.2.3.mcr"), b"data").unwrap();

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: None,
        origin_shift: Some((512, -1024)),
        force: false,
    });
    merger.add_path(&input_dir.join("r.2.3.mcr")).unwrap();
    let written = merger.run().unwrap();

    // dx=512 -> shift -1 on rx; dz=-1024 -> shift +2 on rz.
    assert_eq!(written, vec![output_dir.join("r.1.5.mcr")]);
}

#[test]
fn mcr_and_maplog_inputs_merge_with_later_inputs_winning() {
    let input_dir = scratch_dir("merge-in");
    let output_dir = scratch_dir("merge-out");

    let mut base = RegionFile::new(0, 0);
    let mut chunk = Chunk::new(0, 0);
    let full_volume_patch = {
        let nblks = 16 * 128 * 16;
        let mut data = vec![1_u8; nblks];
        data.extend(vec![0_u8; (3 * nblks).div_ceil(2)]);
        data
    };
    chunk.put(0, 0, 0, 16, 128, 16, &full_volume_patch).unwrap();
    base.insert_chunk(chunk);
    let mcr_path = input_dir.join("r.0.0.mcr");
    let mut mcr_file = std::fs::File::create(&mcr_path).unwrap();
    base.write(&mut mcr_file).unwrap();
    drop(mcr_file);

    // a maplog placing a single different block at world (5, 70, 7), which
    // should win over whatever the base mcr had there.
    let maplog_path = input_dir.join("r.0.0.maplog");
    let mut maplog_buf = Vec::new();
    maplog::append_record(&mut maplog_buf, 5, 70, 7, 1, 1, 1, &[9, 0, 0]).unwrap();
    std::fs::write(&maplog_path, &maplog_buf).unwrap();

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: None,
        origin_shift: None,
        force: false,
    });
    merger.add_path(&mcr_path).unwrap();
    merger.add_path(&maplog_path).unwrap();
    let written = merger.run().unwrap();
    assert_eq!(written.len(), 1);

    let mut reloaded = std::fs::File::open(&written[0]).unwrap();
    let region = RegionFile::load_mcr(0, 0, &mut reloaded).unwrap();
    let chunk = region.chunk(0, 0).unwrap();
    assert_eq!(chunk.block_at(5, 70, 7), 9);
    assert_eq!(chunk.block_at(5, 71, 7), 1);
}

#[test]
fn pre_existing_output_is_renamed_before_a_real_merge() {
    let input_dir = scratch_dir("rename-in");
    let output_dir = scratch_dir("rename-out");
    let mcr_path = input_dir.join("r.0.0.mcr");
    let mut mcr_file = std::fs::File::create(&mcr_path).unwrap();
    RegionFile::new(0, 0).write(&mut mcr_file).unwrap();
    drop(mcr_file);
    let maplog_path = input_dir.join("r.0.0.maplog");
    std::fs::write(&maplog_path, Vec::<u8>::new()).unwrap();

    let output_path = output_dir.join("r.0.0.mcr");
    std::fs::write(&output_path, b"stale output").unwrap();

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: None,
        origin_shift: None,
        force: false,
    });
    merger.add_path(&mcr_path).unwrap();
    merger.add_path(&maplog_path).unwrap();
    merger.run().unwrap();

    assert_eq!(std::fs::read(output_dir.join("r.0.0.mcr.old")).unwrap(), b"stale output");
    assert_ne!(std::fs::read(&output_path).unwrap(), b"stale output");
}

#[test]
fn zip_container_entries_are_matched_by_base_name() {
    let input_dir = scratch_dir("zip-in");
    let output_dir = scratch_dir("zip-out");
    let zip_path = input_dir.join("bundle.zip");
    {
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let opts = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("world/region/r.0.0.mcr", opts).unwrap();
        std::io::Write::write_all(&mut writer, b"zipped region bytes").unwrap();
        writer.finish().unwrap();
    }

    let mut merger = RegionMerger::new(MergeOptions {
        output_dir: output_dir.clone(),
        target_bbox: None,
        origin_shift: None,
        force: false,
    });
    merger.add_path(&zip_path).unwrap();
    let written = merger.run().unwrap();

    assert_eq!(written, vec![output_dir.join("r.0.0.mcr")]);
    assert_eq!(std::fs::read(output_dir.join("r.0.0.mcr")).unwrap(), b"zipped region bytes");
}

#[test]
fn cursor_reads_support_region_loading() {
    // sanity check that in-memory merge inputs round-trip through Cursor the
    // same way a real file would.
    let mut region = RegionFile::new(1, 1);
    region.insert_chunk(Chunk::new(3, 4));
    let mut buf = Vec::new();
    region.write(&mut Cursor::new(&mut buf)).unwrap();
    let reloaded = RegionFile::load_mcr(1, 1, &mut Cursor::new(buf)).unwrap();
    assert!(reloaded.chunk(3, 4).is_some());
}
