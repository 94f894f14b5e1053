//! Tree-level operations: list, move, bulk-move, delete, import,
//! export, and directory creation, built on top of the path, entry,
//! and codec layers. Every mutating operation here re-serializes the
//! whole volume through [`Volume::write_volume`] before returning.

use std::io::{Read, Seek, Write};

use log::debug;

use crate::codec;
use crate::entry::DirEntry;
use crate::error::{Error, Result};
use crate::name::{self, ShortName};
use crate::path::{self, PathChain, PathRelation};
use crate::volume::Volume;

fn dir_ref<'a>(volume: &'a Volume, path: &PathChain) -> Result<&'a DirEntry> {
    let found = if path.is_root() {
        &volume.root
    } else {
        path::resolve(&volume.root, path)?
    };
    if !found.is_directory() {
        return Err(Error::NotADir);
    }
    Ok(found)
}

fn dir_mut<'a>(volume: &'a mut Volume, path: &PathChain) -> Result<&'a mut DirEntry> {
    if path.is_root() {
        return Ok(&mut volume.root);
    }
    let found = path::resolve_mut(&mut volume.root, path)?;
    if !found.is_directory() {
        return Err(Error::NotADir);
    }
    Ok(found)
}

fn directory_capacity(volume: &Volume, path: &PathChain) -> Result<usize> {
    if path.is_root() {
        return Ok(volume.bpb.root_dir_entries as usize);
    }
    let dir = dir_ref(volume, path)?;
    if dir.first_cluster == 0 {
        return Err(Error::LogicError("directory has no allocated cluster chain"));
    }
    Ok(volume.chain_length_bytes(dir.first_cluster) / codec::DIR_ENTRY_SIZE)
}

fn slot_overhead(path: &PathChain) -> usize {
    if path.is_root() {
        0
    } else {
        2 // "." and ".." occupy two slots in every non-root table
    }
}

/// Every subdirectory gets a fixed 224-entry (7168-byte) table,
/// regardless of how many children it will ever hold.
const SUBDIR_TABLE_ENTRIES: usize = 224;

fn subdir_table_clusters(cluster_size: usize) -> usize {
    let table_bytes = SUBDIR_TABLE_ENTRIES * codec::DIR_ENTRY_SIZE;
    (table_bytes + cluster_size - 1) / cluster_size
}

/// Lists the immediate children of the directory at `path` (pass
/// [`PathChain::root`] to list the root directory).
pub fn list_directory<'a>(volume: &'a Volume, path: &PathChain) -> Result<&'a [DirEntry]> {
    Ok(&dir_ref(volume, path)?.children)
}

/// Creates every missing directory along `path`, erroring with
/// [`Error::NotADir`] if an existing entry along the way is a file.
pub fn create_directories_along<W: Write + Seek>(
    volume: &mut Volume,
    stream: &mut W,
    path: &PathChain,
    timestamp_micros: i64,
) -> Result<()> {
    for prefix in path.prefixes() {
        match dir_ref(volume, &prefix) {
            Ok(_) => continue,
            Err(Error::FileNotFound(_)) => {}
            Err(other) => return Err(other),
        }

        let name = prefix.last().cloned().expect("prefix has at least one segment");
        let parent_path = prefix.parent();
        let capacity = directory_capacity(volume, &parent_path)?;
        let clusters_needed = subdir_table_clusters(volume.cluster_size());
        let cluster = volume.allocate_cluster_chain(clusters_needed)?;
        let packed = name::pack_timestamp(timestamp_micros);

        let mut new_dir = DirEntry::new_directory(name, cluster);
        new_dir.create_date = packed.date;
        new_dir.create_time = packed.time;
        new_dir.create_time_fine = packed.tenths;
        new_dir.last_modified_date = packed.date;
        new_dir.last_modified_time = packed.time;

        let overhead = slot_overhead(&parent_path);
        let parent = dir_mut(volume, &parent_path)?;
        if parent.used_child_count() + overhead >= capacity {
            volume.free_cluster_chain(cluster);
            return Err(Error::DirFull);
        }
        parent.children.push(new_dir);
    }
    volume.write_volume(stream)
}

/// Imports `data` as a file named `file_name` under `dest_dir`. If an
/// entry with the same short name already exists there, it is
/// overwritten in place (its old cluster chain is left marked in use,
/// consistent with this engine's conservative delete semantics).
pub fn import_file<W: Write + Seek>(
    volume: &mut Volume,
    stream: &mut W,
    dest_dir: &PathChain,
    file_name: &str,
    data: &[u8],
    timestamp_micros: i64,
) -> Result<()> {
    let cluster_size = volume.cluster_size();
    let short_name = ShortName::from_host_str(file_name);
    let packed = name::pack_timestamp(timestamp_micros);

    let first_cluster = if data.is_empty() {
        0
    } else {
        let clusters_needed = (data.len() + cluster_size - 1) / cluster_size;
        let start = volume.allocate_cluster_chain(clusters_needed)?;
        volume.write_to_cluster_chain(stream, start, data)?;
        start
    };

    let mut entry = DirEntry::new_file(short_name, first_cluster, data.len() as u32);
    entry.create_date = packed.date;
    entry.create_time = packed.time;
    entry.create_time_fine = packed.tenths;
    entry.last_modified_date = packed.date;
    entry.last_modified_time = packed.time;

    let capacity = directory_capacity(volume, dest_dir)?;
    let overhead = slot_overhead(dest_dir);
    let dir = dir_mut(volume, dest_dir)?;
    if let Some(existing) = dir.find_child_mut(&entry.short_name) {
        *existing = entry;
    } else {
        if dir.used_child_count() + overhead >= capacity {
            if first_cluster != 0 {
                volume.free_cluster_chain(first_cluster);
            }
            return Err(Error::DirFull);
        }
        dir.children.push(entry);
    }

    volume.write_volume(stream)?;
    debug!("imported {} byte(s) into {}", data.len(), dest_dir.display());
    Ok(())
}

/// Reads a file's full contents back out of the volume.
pub fn export_file<R: Read + Seek>(volume: &Volume, stream: &mut R, path: &PathChain) -> Result<Vec<u8>> {
    let entry = path::resolve(&volume.root, path)?;
    if entry.is_directory() {
        return Err(Error::IsDir);
    }
    if entry.first_cluster == 0 {
        return Ok(Vec::new());
    }
    let mut bytes = volume.read_cluster_chain(stream, entry.first_cluster)?;
    bytes.truncate(entry.file_size as usize);
    Ok(bytes)
}

/// Deletes a single entry. Refuses to delete a non-empty directory
/// (`Error::DirNotEmpty`) and performs no disk changes in that case.
/// Freed clusters are zeroed but their FAT entries are left untouched —
/// see the design notes on why this matches the original.
pub fn delete_entry<W: Write + Seek>(volume: &mut Volume, stream: &mut W, path: &PathChain) -> Result<()> {
    if path.is_root() {
        return Err(Error::EmptyPath);
    }
    let parent_path = path.parent();
    let name = path.last().cloned().expect("non-root path has a last segment");

    {
        let parent = dir_ref(volume, &parent_path)?;
        let entry = parent
            .find_child(&name)
            .ok_or_else(|| Error::FileNotFound(path.display()))?;
        if entry.is_directory() && entry.used_child_count() > 0 {
            return Err(Error::DirNotEmpty);
        }
    }

    let removed = {
        let parent = dir_mut(volume, &parent_path)?;
        parent
            .take_child(&name)
            .ok_or_else(|| Error::FileNotFound(path.display()))?
    };

    if removed.first_cluster != 0 {
        volume.erase_cluster_chain(stream, removed.first_cluster)?;
    }

    volume.write_volume(stream)
}

/// Moves (and optionally renames) the entry at `src_path` into
/// `dest_dir_path`. Rejects moving a directory into itself or one of
/// its own descendants.
pub fn move_entry<W: Write + Seek>(
    volume: &mut Volume,
    stream: &mut W,
    src_path: &PathChain,
    dest_dir_path: &PathChain,
    rename_to: Option<&str>,
) -> Result<()> {
    if src_path.is_root() {
        return Err(Error::EmptyPath);
    }
    match path::relation(src_path, dest_dir_path) {
        PathRelation::Equal | PathRelation::FirstIsAncestor => {
            return Err(Error::LogicError("cannot move a directory inside itself"));
        }
        _ => {}
    }

    let parent_path = src_path.parent();
    let name = src_path.last().cloned().expect("non-root path has a last segment");

    let mut moved = {
        let parent = dir_mut(volume, &parent_path)?;
        parent
            .take_child(&name)
            .ok_or_else(|| Error::FileNotFound(src_path.display()))?
    };

    if let Some(new_name) = rename_to {
        moved.short_name = ShortName::from_host_str(new_name);
    }

    let capacity = directory_capacity(volume, dest_dir_path)?;
    let overhead = slot_overhead(dest_dir_path);

    let name_exists = {
        let dest = dir_mut(volume, dest_dir_path)?;
        dest.find_child(&moved.short_name).is_some()
    };
    if name_exists {
        let parent = dir_mut(volume, &parent_path)?;
        parent.children.push(moved);
        return Err(Error::LogicError(
            "destination already has an entry with that name",
        ));
    }

    let over_capacity = {
        let dest = dir_mut(volume, dest_dir_path)?;
        dest.used_child_count() + overhead >= capacity
    };
    if over_capacity {
        let parent = dir_mut(volume, &parent_path)?;
        parent.children.push(moved);
        return Err(Error::DirFull);
    }

    {
        let dest = dir_mut(volume, dest_dir_path)?;
        dest.children.push(moved);
    }

    volume.write_volume(stream)
}

/// Bulk-moves every child of `src_dir_path` into `dest_dir_path`,
/// leaving the source directory empty. Corresponds to the original's
/// "move by dot" case: moving a directory's own "." entry is shorthand
/// for relocating everything it contains in one step, since "." and
/// ".." are never owned tree nodes here. Refuses to move a directory's
/// contents into itself or one of its own descendants, and rejects the
/// whole batch (leaving both directories untouched) if any name would
/// collide or the destination lacks room for all of it.
pub fn move_directory_contents<W: Write + Seek>(
    volume: &mut Volume,
    stream: &mut W,
    src_dir_path: &PathChain,
    dest_dir_path: &PathChain,
) -> Result<()> {
    match path::relation(src_dir_path, dest_dir_path) {
        PathRelation::Equal | PathRelation::FirstIsAncestor => {
            return Err(Error::LogicError(
                "cannot move a directory's contents into itself",
            ));
        }
        _ => {}
    }

    let moved_count = dir_ref(volume, src_dir_path)?.used_child_count();
    let capacity = directory_capacity(volume, dest_dir_path)?;
    let overhead = slot_overhead(dest_dir_path);
    let existing = dir_ref(volume, dest_dir_path)?.used_child_count();
    if existing + overhead + moved_count > capacity {
        return Err(Error::DirFull);
    }

    {
        let src = dir_ref(volume, src_dir_path)?;
        let dest = dir_ref(volume, dest_dir_path)?;
        for child in &src.children {
            if dest.find_child(&child.short_name).is_some() {
                return Err(Error::LogicError(
                    "destination already has an entry with that name",
                ));
            }
        }
    }

    let children = std::mem::take(&mut dir_mut(volume, src_dir_path)?.children);
    dir_mut(volume, dest_dir_path)?.children.extend(children);

    debug!(
        "bulk-moved {} entries from {} into {}",
        moved_count,
        src_dir_path.display(),
        dest_dir_path.display()
    );
    volume.write_volume(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreateOptions;
    use std::io::Cursor;

    fn new_cursor_volume() -> (Volume, Cursor<Vec<u8>>) {
        let options = CreateOptions {
            volume_size_kib: Some(1440),
            ..Default::default()
        };
        let volume = Volume::create(&options, 0x1111_2222);
        let size = volume.partition_size() as usize;
        (volume, Cursor::new(vec![0u8; size]))
    }

    #[test]
    fn import_then_export_round_trips() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();

        let root = PathChain::root();
        import_file(&mut volume, &mut cursor, &root, "A.TXT", b"hello", 0).unwrap();

        let path = PathChain::parse("/A.TXT").unwrap();
        let data = export_file(&volume, &mut cursor, &path).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn create_directories_along_builds_missing_dirs() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();

        let path = PathChain::parse("/a/b/c").unwrap();
        create_directories_along(&mut volume, &mut cursor, &path, 0).unwrap();

        let listed = list_directory(&volume, &PathChain::root()).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_directory());
    }

    #[test]
    fn create_directories_along_allocates_fixed_224_entry_table() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();

        let a = PathChain::parse("/a").unwrap();
        create_directories_along(&mut volume, &mut cursor, &a, 0).unwrap();

        assert_eq!(directory_capacity(&volume, &a).unwrap(), 224);
    }

    #[test]
    fn delete_non_empty_directory_is_refused() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();

        let a = PathChain::parse("/a").unwrap();
        create_directories_along(&mut volume, &mut cursor, &a, 0).unwrap();
        import_file(&mut volume, &mut cursor, &a, "X.TXT", b"x", 0).unwrap();

        let result = delete_entry(&mut volume, &mut cursor, &a);
        assert!(matches!(result, Err(Error::DirNotEmpty)));
        // nothing should have been removed
        assert_eq!(list_directory(&volume, &a).unwrap().len(), 1);
    }

    #[test]
    fn delete_file_erases_but_keeps_fat_entry_marked() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let root = PathChain::root();
        import_file(&mut volume, &mut cursor, &root, "A.TXT", b"hello", 0).unwrap();

        let path = PathChain::parse("/A.TXT").unwrap();
        let cluster = dir_ref(&volume, &root).unwrap().children[0].first_cluster;
        delete_entry(&mut volume, &mut cursor, &path).unwrap();

        assert!(list_directory(&volume, &root).unwrap().is_empty());
        assert_ne!(volume.fat[cluster as usize], 0);
    }

    #[test]
    fn move_entry_relocates_and_can_rename() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let root = PathChain::root();
        let a = PathChain::parse("/a").unwrap();
        create_directories_along(&mut volume, &mut cursor, &a, 0).unwrap();
        import_file(&mut volume, &mut cursor, &root, "A.TXT", b"hi", 0).unwrap();

        let src = PathChain::parse("/A.TXT").unwrap();
        move_entry(&mut volume, &mut cursor, &src, &a, Some("B.TXT")).unwrap();

        assert!(list_directory(&volume, &root).unwrap().is_empty());
        let moved = list_directory(&volume, &a).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].short_name.display_name(), "B.TXT");
    }

    #[test]
    fn move_entry_rejects_moving_directory_into_itself() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let a = PathChain::parse("/a").unwrap();
        let a_b = PathChain::parse("/a/b").unwrap();
        create_directories_along(&mut volume, &mut cursor, &a_b, 0).unwrap();

        let result = move_entry(&mut volume, &mut cursor, &a, &a_b, None);
        assert!(matches!(result, Err(Error::LogicError(_))));
    }

    #[test]
    fn move_directory_contents_relocates_every_child_and_empties_source() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let src = PathChain::parse("/src").unwrap();
        let dest = PathChain::parse("/dest").unwrap();
        create_directories_along(&mut volume, &mut cursor, &src, 0).unwrap();
        create_directories_along(&mut volume, &mut cursor, &dest, 0).unwrap();
        import_file(&mut volume, &mut cursor, &src, "A.TXT", b"a", 0).unwrap();
        import_file(&mut volume, &mut cursor, &src, "B.TXT", b"b", 0).unwrap();

        move_directory_contents(&mut volume, &mut cursor, &src, &dest).unwrap();

        assert!(list_directory(&volume, &src).unwrap().is_empty());
        let moved = list_directory(&volume, &dest).unwrap();
        assert_eq!(moved.len(), 2);
    }

    #[test]
    fn move_directory_contents_rejects_moving_into_self() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let a = PathChain::parse("/a").unwrap();
        let a_b = PathChain::parse("/a/b").unwrap();
        create_directories_along(&mut volume, &mut cursor, &a_b, 0).unwrap();

        let result = move_directory_contents(&mut volume, &mut cursor, &a, &a_b);
        assert!(matches!(result, Err(Error::LogicError(_))));
    }

    #[test]
    fn move_directory_contents_rejects_name_collision_and_leaves_both_sides_untouched() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let src = PathChain::parse("/src").unwrap();
        let dest = PathChain::parse("/dest").unwrap();
        create_directories_along(&mut volume, &mut cursor, &src, 0).unwrap();
        create_directories_along(&mut volume, &mut cursor, &dest, 0).unwrap();
        import_file(&mut volume, &mut cursor, &src, "A.TXT", b"src", 0).unwrap();
        import_file(&mut volume, &mut cursor, &dest, "A.TXT", b"dest", 0).unwrap();

        let result = move_directory_contents(&mut volume, &mut cursor, &src, &dest);
        assert!(matches!(result, Err(Error::LogicError(_))));
        assert_eq!(list_directory(&volume, &src).unwrap().len(), 1);
        assert_eq!(list_directory(&volume, &dest).unwrap().len(), 1);
    }
}
