//! Integration tests driving the public API the way a consumer would:
//! create an image on a real temp file, then list/import/export/move/
//! delete against it. Mirrors the numbered scenarios in `spec.md` §8.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom};

use fat12volume::{ops, CreateOptions, PathChain, Volume};
use tempfile::NamedTempFile;

fn fresh_image(options: &CreateOptions) -> (Volume, NamedTempFile) {
    let volume = Volume::create(options, 0xC0FFEE);
    let temp = NamedTempFile::new().expect("create temp file");
    let mut file = temp.reopen().expect("reopen temp file");
    volume.create_image(&mut file).expect("create image");
    (volume, temp)
}

#[test]
fn scenario_1_default_1440k_image_has_expected_geometry() {
    let options = CreateOptions {
        volume_size_kib: Some(1440),
        ..Default::default()
    };
    let (volume, _temp) = fresh_image(&options);

    assert_eq!(volume.bpb.bytes_per_sector, 512);
    assert_eq!(volume.bpb.sectors_per_cluster, 1);
    assert_eq!(volume.bpb.root_dir_entries, 224);
    assert_eq!(volume.bpb.media_descriptor, 0xF0);
    assert_eq!(volume.bpb.total_sectors, 2880);
    assert_eq!(volume.describe().file_system, "FAT12");
    assert_eq!(volume.describe().volume_label, "NO NAME");
}

#[test]
fn scenario_2_empty_image_has_224_empty_root_slots() {
    let options = CreateOptions {
        volume_size_kib: Some(1440),
        ..Default::default()
    };
    let (volume, _temp) = fresh_image(&options);

    let root = PathChain::root();
    assert_eq!(ops::list_directory(&volume, &root).unwrap().len(), 0);
    assert_eq!(volume.root.file_count(), 0);
    assert_eq!(volume.root.directory_count(), 0);
}

#[test]
fn scenario_3_import_reports_size_and_round_trips_bytes() {
    let options = CreateOptions {
        volume_size_kib: Some(1440),
        ..Default::default()
    };
    let (mut volume, temp) = fresh_image(&options);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(temp.path())
        .unwrap();

    let payload: Vec<u8> = (0..1302u32).map(|n| (n % 251) as u8).collect();
    let dest = PathChain::parse("/BIN").unwrap();
    ops::create_directories_along(&mut volume, &mut file, &dest, 0).unwrap();
    ops::import_file(&mut volume, &mut file, &dest, "COPY", &payload, 0).unwrap();

    let entry_path = PathChain::parse("/BIN/COPY").unwrap();
    let entry = fat12volume::path::resolve(&volume.root, &entry_path).unwrap();
    assert_eq!(entry.file_size, 1302);
    assert_ne!(entry.first_cluster, 0);

    file.seek(SeekFrom::Start(0)).unwrap();
    let read_back = volume.read_cluster_chain(&mut file, entry.first_cluster).unwrap();
    assert!(read_back.len() >= payload.len());
    assert_eq!(&read_back[..payload.len()], &payload[..]);
    assert!(read_back[payload.len()..].iter().all(|&b| b == 0));
}

#[test]
fn scenario_4_move_relocates_subtree_and_fixes_up_children() {
    let options = CreateOptions {
        volume_size_kib: Some(1440),
        ..Default::default()
    };
    let (mut volume, temp) = fresh_image(&options);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(temp.path())
        .unwrap();

    let a_b = PathChain::parse("/A/B").unwrap();
    let c = PathChain::parse("/C").unwrap();
    ops::create_directories_along(&mut volume, &mut file, &a_b, 0).unwrap();
    ops::create_directories_along(&mut volume, &mut file, &c, 0).unwrap();
    ops::import_file(&mut volume, &mut file, &a_b, "LEAF.TXT", b"x", 0).unwrap();

    ops::move_entry(&mut volume, &mut file, &a_b, &c, None).unwrap();

    let a = PathChain::parse("/A").unwrap();
    assert!(ops::list_directory(&volume, &a).unwrap().is_empty());

    let new_b = PathChain::parse("/C/B").unwrap();
    let listed = ops::list_directory(&volume, &new_b).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_name.display_name(), "LEAF.TXT");
}

#[test]
fn scenario_5_non_recursive_delete_of_nonempty_dir_leaves_image_untouched() {
    let options = CreateOptions {
        volume_size_kib: Some(1440),
        ..Default::default()
    };
    let (mut volume, temp) = fresh_image(&options);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(temp.path())
        .unwrap();

    let d = PathChain::parse("/D").unwrap();
    ops::create_directories_along(&mut volume, &mut file, &d, 0).unwrap();
    ops::import_file(&mut volume, &mut file, &d, "X.TXT", b"x", 0).unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut before = Vec::new();
    file.read_to_end(&mut before).unwrap();

    let result = ops::delete_entry(&mut volume, &mut file, &d);
    assert!(matches!(result, Err(fat12volume::Error::DirNotEmpty)));

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut after = Vec::new();
    file.read_to_end(&mut after).unwrap();
    assert_eq!(before, after);
}

#[test]
fn scenario_6_timestamp_pack_unpack_matches_worked_example() {
    let packed = fat12volume::name::pack_timestamp(1_528_648_395_420_000);
    assert_eq!(packed.date, 19658);
    assert_eq!(packed.time, 33831);
    assert_eq!(packed.tenths, 142);

    let unpacked = fat12volume::name::unpack_timestamp(packed.date, packed.time, packed.tenths);
    assert_eq!(unpacked, 1_528_648_395_420_000);
}
