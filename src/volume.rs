//! The `Volume` aggregate: BPB, FAT, and directory tree bound to a
//! backing byte stream. Every mutating method re-serializes the whole
//! image (BPB, FAT copies, directory tables, root directory) before
//! returning, matching the original's "no partial writes survive a
//! crash between steps" posture — there is simply no intermediate
//! state to leave partially written.

use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use crate::codec;
use crate::config::CreateOptions;
use crate::entry::DirEntry;
use crate::error::{Error, Result};
use crate::geometry::{self, BiosParameterBlock};

const BOOT_SECTOR_SIZE: usize = 512;

/// Threshold above which a FAT12 entry is treated as end-of-chain,
/// tolerant of images written by other tools that don't use exactly
/// this engine's `end_of_chain_marker`.
const END_OF_CHAIN_THRESHOLD: u16 = 0xFF8;

fn is_end_of_chain(value: u16) -> bool {
    value == 0 || value >= END_OF_CHAIN_THRESHOLD
}

/// A plain-data view of a volume's geometry and usage. Carries no
/// formatting logic of its own — an external tool renders it however
/// it likes; the core only supplies typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpbSnapshot {
    pub oem_label: String,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub number_of_fats: u8,
    pub root_dir_entries: u16,
    pub total_sectors: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub volume_id: u32,
    pub volume_label: String,
    pub file_system: String,
    pub used_bytes: u64,
    pub partition_size: u64,
}

pub struct Volume {
    pub bpb: BiosParameterBlock,
    pub fat: Vec<u16>,
    pub root: DirEntry,
    pub fat_id: u16,
    pub end_of_chain_marker: u16,
    boot_sector_template: [u8; BOOT_SECTOR_SIZE],
}

impl Volume {
    /// Builds a fresh, empty volume in memory. Nothing is written to a
    /// stream until [`Volume::write_volume`] or [`Volume::create_image`]
    /// is called.
    pub fn create(options: &CreateOptions, volume_id: u32) -> Volume {
        let bpb = BiosParameterBlock::initialize(options, volume_id);
        let cluster_slots = bpb.cluster_count() as usize + 2;
        let mut fat = vec![0u16; cluster_slots];
        let end_of_chain_marker = 0x0FFF;
        let fat_id = 0x0F00 | bpb.media_descriptor as u16;
        fat[0] = fat_id;
        fat[1] = end_of_chain_marker;

        let root = DirEntry {
            short_name: crate::name::ShortName::from_parts(b"", b""),
            attributes: crate::entry::ATTR_DIRECTORY,
            user_attributes: 0,
            create_time_fine: 0,
            create_time: 0,
            create_date: 0,
            owner_id: 0,
            access_rights: 0,
            last_modified_time: 0,
            last_modified_date: 0,
            first_cluster: 0,
            file_size: 0,
            children: Vec::new(),
        };

        let mut boot_sector_template = [0u8; BOOT_SECTOR_SIZE];
        boot_sector_template[510] = 0x55;
        boot_sector_template[511] = 0xAA;

        Volume {
            bpb,
            fat,
            root,
            fat_id,
            end_of_chain_marker,
            boot_sector_template,
        }
    }

    /// Installs an externally produced boot sector blob. The engine
    /// treats its contents as opaque besides the BPB region, which a
    /// subsequent `write_volume` always overwrites with this volume's
    /// own geometry.
    pub fn install_boot_sector(&mut self, template: [u8; BOOT_SECTOR_SIZE]) {
        self.boot_sector_template = template;
    }

    pub fn cluster_size(&self) -> usize {
        self.bpb.sectors_per_cluster as usize * self.bpb.bytes_per_sector as usize
    }

    fn cluster_offset(&self, cluster: u16) -> u64 {
        let data_sector = self.bpb.data_offset_sectors() as u64
            + (cluster as u64 - 2) * self.bpb.sectors_per_cluster as u64;
        data_sector * self.bpb.bytes_per_sector as u64
    }

    /// The ordered list of clusters making up the chain starting at
    /// `start`. An empty vec means "no data" (a zero-length file or a
    /// not-yet-allocated directory).
    pub fn chain_clusters(&self, start: u16) -> Vec<u16> {
        if start == 0 {
            return Vec::new();
        }
        let mut clusters = Vec::new();
        let mut current = start;
        loop {
            clusters.push(current);
            let next = *self.fat.get(current as usize).unwrap_or(&0);
            if is_end_of_chain(next) {
                break;
            }
            current = next;
        }
        clusters
    }

    pub fn chain_length_bytes(&self, start: u16) -> usize {
        self.chain_clusters(start).len() * self.cluster_size()
    }

    /// Scans upward from cluster 2 for `count` free (zero) FAT slots
    /// and links them into a chain terminated with
    /// `end_of_chain_marker`. Mirrors the original's first-fit
    /// allocator: free clusters need not be contiguous.
    pub fn allocate_cluster_chain(&mut self, count: usize) -> Result<u16> {
        if count == 0 {
            return Err(Error::LogicError("cannot allocate a zero-cluster chain"));
        }
        let mut free = Vec::with_capacity(count);
        for index in 2..self.fat.len() {
            if self.fat[index] == 0 {
                free.push(index as u16);
                if free.len() == count {
                    break;
                }
            }
        }
        if free.len() < count {
            return Err(Error::AllocationError { requested: count });
        }
        for window in free.windows(2) {
            self.fat[window[0] as usize] = window[1];
        }
        let last = *free.last().expect("count > 0 checked above");
        self.fat[last as usize] = self.end_of_chain_marker;
        trace!("allocated cluster chain of {} cluster(s) starting at {}", count, free[0]);
        Ok(free[0])
    }

    /// Marks the given chain's clusters free in the FAT. Per the
    /// original's delete semantics, this is only called by operations
    /// that explicitly intend to reclaim space; a plain entry delete
    /// does not call this (see `ops::delete_entry`).
    pub fn free_cluster_chain(&mut self, start: u16) {
        for cluster in self.chain_clusters(start) {
            self.fat[cluster as usize] = 0;
        }
    }

    pub fn read_cluster_chain<R: Read + Seek>(&self, stream: &mut R, start: u16) -> Result<Vec<u8>> {
        let cluster_size = self.cluster_size();
        let mut data = Vec::with_capacity(self.chain_clusters(start).len() * cluster_size);
        for cluster in self.chain_clusters(start) {
            let mut buf = vec![0u8; cluster_size];
            stream.seek(SeekFrom::Start(self.cluster_offset(cluster)))?;
            stream.read_exact(&mut buf)?;
            data.extend_from_slice(&buf);
        }
        Ok(data)
    }

    /// Writes `data` across the chain starting at `start`, zero-padding
    /// the final cluster. Errors if `data` does not fit the chain's
    /// capacity, or if the chain is oversized by more than one whole
    /// cluster (both indicate the caller sized the allocation wrong).
    pub fn write_to_cluster_chain<W: Write + Seek>(
        &self,
        stream: &mut W,
        start: u16,
        data: &[u8],
    ) -> Result<()> {
        let cluster_size = self.cluster_size();
        let clusters = self.chain_clusters(start);
        let capacity = clusters.len() * cluster_size;
        if data.len() > capacity {
            return Err(Error::LogicError("data does not fit the allocated chain"));
        }
        if capacity.saturating_sub(data.len()) >= cluster_size {
            return Err(Error::LogicError("chain is oversized for the given data"));
        }

        for (i, cluster) in clusters.iter().enumerate() {
            let lo = i * cluster_size;
            let hi = ((i + 1) * cluster_size).min(data.len());
            let mut buf = vec![0u8; cluster_size];
            if lo < data.len() {
                buf[..hi - lo].copy_from_slice(&data[lo..hi]);
            }
            stream.seek(SeekFrom::Start(self.cluster_offset(*cluster)))?;
            stream.write_all(&buf)?;
        }
        Ok(())
    }

    /// Zeroes the on-disk contents of a chain without touching its FAT
    /// entries. See `spec` design notes: non-recursive delete leaves
    /// freed clusters marked in-use until a future compaction pass.
    pub fn erase_cluster_chain<W: Write + Seek>(&self, stream: &mut W, start: u16) -> Result<()> {
        let cluster_size = self.cluster_size();
        let zeros = vec![0u8; cluster_size];
        for cluster in self.chain_clusters(start) {
            stream.seek(SeekFrom::Start(self.cluster_offset(cluster)))?;
            stream.write_all(&zeros)?;
        }
        Ok(())
    }

    pub fn used_bytes(&self) -> u64 {
        let reserved = self.bpb.reserved_sectors as u64 * self.bpb.bytes_per_sector as u64;
        let fat_region = self.bpb.fat_region_sectors() as u64 * self.bpb.bytes_per_sector as u64;
        let root_region = self.bpb.root_dir_sectors() as u64 * self.bpb.bytes_per_sector as u64;
        let used_clusters = self.fat[2..].iter().filter(|&&e| e != 0).count() as u64;
        reserved + fat_region + root_region + used_clusters * self.cluster_size() as u64
    }

    pub fn partition_size(&self) -> u64 {
        self.bpb.total_sectors as u64 * self.bpb.bytes_per_sector as u64
    }

    /// A typed snapshot of the volume's geometry and usage, for an
    /// external formatter to render (the human-readable report itself
    /// is outside this engine's scope; this just exposes the data it
    /// would need without re-deriving field access on `BiosParameterBlock`).
    pub fn describe(&self) -> BpbSnapshot {
        BpbSnapshot {
            oem_label: String::from_utf8_lossy(&self.bpb.oem_label).trim_end().to_string(),
            bytes_per_sector: self.bpb.bytes_per_sector,
            sectors_per_cluster: self.bpb.sectors_per_cluster,
            number_of_fats: self.bpb.number_of_fats,
            root_dir_entries: self.bpb.root_dir_entries,
            total_sectors: self.bpb.total_sectors,
            media_descriptor: self.bpb.media_descriptor,
            sectors_per_fat: self.bpb.sectors_per_fat,
            volume_id: self.bpb.volume_id,
            volume_label: String::from_utf8_lossy(&self.bpb.volume_label).trim_end().to_string(),
            file_system: String::from_utf8_lossy(&self.bpb.file_system).trim_end().to_string(),
            used_bytes: self.used_bytes(),
            partition_size: self.partition_size(),
        }
    }

    /// Reads a complete volume from a backing stream: boot sector, one
    /// FAT copy, the root directory table, and every subdirectory
    /// reachable from it.
    pub fn read_volume<R: Read + Seek>(stream: &mut R) -> Result<Volume> {
        let mut boot_sector_template = [0u8; BOOT_SECTOR_SIZE];
        stream.seek(SeekFrom::Start(0))?;
        stream.read_exact(&mut boot_sector_template)?;
        let bpb = codec::read_bpb(&boot_sector_template)?;

        let fat_bytes_len = bpb.sectors_per_fat as usize * bpb.bytes_per_sector as usize;
        let mut fat_bytes = vec![0u8; fat_bytes_len];
        stream.seek(SeekFrom::Start(
            bpb.reserved_sectors as u64 * bpb.bytes_per_sector as u64,
        ))?;
        stream.read_exact(&mut fat_bytes)?;
        let cluster_slots = bpb.cluster_count() as usize + 2;
        let fat = codec::decode_fat(&fat_bytes, cluster_slots);
        let fat_id = fat[0];
        let end_of_chain_marker = fat[1];

        let root_bytes_len = bpb.root_dir_sectors() as usize * bpb.bytes_per_sector as usize;
        let mut root_bytes = vec![0u8; root_bytes_len];
        stream.seek(SeekFrom::Start(
            bpb.root_dir_offset_sectors() as u64 * bpb.bytes_per_sector as u64,
        ))?;
        stream.read_exact(&mut root_bytes)?;
        let children = codec::decode_directory_table(&root_bytes)?;

        let mut volume = Volume {
            bpb,
            fat,
            root: DirEntry {
                short_name: crate::name::ShortName::from_parts(b"", b""),
                attributes: crate::entry::ATTR_DIRECTORY,
                user_attributes: 0,
                create_time_fine: 0,
                create_time: 0,
                create_date: 0,
                owner_id: 0,
                access_rights: 0,
                last_modified_time: 0,
                last_modified_date: 0,
                first_cluster: 0,
                file_size: 0,
                children,
            },
            fat_id,
            end_of_chain_marker,
            boot_sector_template,
        };

        let mut root = std::mem::replace(
            &mut volume.root,
            DirEntry::new_directory(crate::name::ShortName::from_parts(b"", b""), 0),
        );
        volume.load_children(stream, &mut root)?;
        volume.root = root;

        debug!(
            "read volume: {} cluster(s), {} root entries",
            volume.fat.len().saturating_sub(2),
            volume.root.children.len()
        );
        Ok(volume)
    }

    fn load_children<R: Read + Seek>(&self, stream: &mut R, dir: &mut DirEntry) -> Result<()> {
        for child in &mut dir.children {
            if child.is_directory() && child.first_cluster != 0 {
                let bytes = self.read_cluster_chain(stream, child.first_cluster)?;
                child.children = codec::decode_directory_table(&bytes)?;
                self.load_children(stream, child)?;
            }
        }
        Ok(())
    }

    /// Re-serializes the entire volume: patched boot sector, every FAT
    /// copy, the root directory table, and every subdirectory table.
    pub fn write_volume<W: Write + Seek>(&self, stream: &mut W) -> Result<()> {
        let mut boot_sector = self.boot_sector_template;
        codec::write_bpb(&self.bpb, &mut boot_sector)?;
        boot_sector[510] = 0x55;
        boot_sector[511] = 0xAA;
        stream.seek(SeekFrom::Start(0))?;
        stream.write_all(&boot_sector)?;

        let fat_region_len = self.bpb.sectors_per_fat as usize * self.bpb.bytes_per_sector as usize;
        let mut fat_bytes = codec::encode_fat(&self.fat);
        fat_bytes.resize(fat_region_len, 0);
        for copy in 0..self.bpb.number_of_fats as u64 {
            let offset = (self.bpb.reserved_sectors as u64
                + copy * self.bpb.sectors_per_fat as u64)
                * self.bpb.bytes_per_sector as u64;
            stream.seek(SeekFrom::Start(offset))?;
            stream.write_all(&fat_bytes)?;
        }

        let root_table = codec::encode_root_table(&self.root, self.bpb.root_dir_entries as usize)?;
        stream.seek(SeekFrom::Start(
            self.bpb.root_dir_offset_sectors() as u64 * self.bpb.bytes_per_sector as u64,
        ))?;
        stream.write_all(&root_table)?;

        self.write_children(stream, &self.root, 0)?;
        debug!("wrote volume: {} byte(s) used", self.used_bytes());
        Ok(())
    }

    fn write_children<W: Write + Seek>(
        &self,
        stream: &mut W,
        dir: &DirEntry,
        parent_cluster: u16,
    ) -> Result<()> {
        for child in &dir.children {
            if child.is_directory() && child.first_cluster != 0 {
                let capacity_entries =
                    self.chain_length_bytes(child.first_cluster) / codec::DIR_ENTRY_SIZE;
                let table = codec::encode_directory_table(
                    child,
                    child.first_cluster,
                    parent_cluster,
                    capacity_entries,
                )?;
                self.write_to_cluster_chain(stream, child.first_cluster, &table)?;
                self.write_children(stream, child, child.first_cluster)?;
            }
        }
        Ok(())
    }

    /// Zero-fills the whole partition extent and writes a fresh volume
    /// into it, mirroring the original's "format" pass.
    pub fn create_image<W: Write + Seek>(&self, stream: &mut W) -> Result<()> {
        let total_bytes = self.partition_size();
        stream.seek(SeekFrom::Start(0))?;
        let chunk = vec![0u8; 64 * 1024];
        let mut remaining = total_bytes;
        while remaining > 0 {
            let n = remaining.min(chunk.len() as u64) as usize;
            stream.write_all(&chunk[..n])?;
            remaining -= n as u64;
        }
        self.write_volume(stream)
    }
}

pub fn generate_volume_id_now(secs: u32, micros: u32) -> u32 {
    geometry::generate_volume_id(secs, micros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn new_cursor_volume() -> (Volume, Cursor<Vec<u8>>) {
        let options = CreateOptions {
            volume_size_kib: Some(1440),
            ..Default::default()
        };
        let volume = Volume::create(&options, 0xCAFEBABE);
        let size = volume.partition_size() as usize;
        (volume, Cursor::new(vec![0u8; size]))
    }

    #[test]
    fn create_image_then_read_volume_round_trips() {
        let (volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();

        cursor.seek(SeekFrom::Start(0)).unwrap();
        let read_back = Volume::read_volume(&mut cursor).unwrap();
        assert_eq!(read_back.bpb.total_sectors, 2880);
        assert_eq!(read_back.root.children.len(), 0);
        assert_eq!(read_back.fat[0], volume.fat_id);
    }

    #[test]
    fn allocate_cluster_chain_links_free_slots() {
        let (mut volume, _) = new_cursor_volume();
        let start = volume.allocate_cluster_chain(3).unwrap();
        let chain = volume.chain_clusters(start);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn allocate_cluster_chain_fails_when_image_is_full() {
        let (mut volume, _) = new_cursor_volume();
        let total = volume.fat.len() - 2;
        assert!(matches!(
            volume.allocate_cluster_chain(total + 1),
            Err(Error::AllocationError { .. })
        ));
    }

    #[test]
    fn write_and_read_cluster_chain_round_trips_data() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let start = volume.allocate_cluster_chain(1).unwrap();
        let payload = b"hello fat12".to_vec();
        volume.write_to_cluster_chain(&mut cursor, start, &payload).unwrap();
        let read_back = volume.read_cluster_chain(&mut cursor, start).unwrap();
        assert_eq!(&read_back[..payload.len()], &payload[..]);
    }

    #[test]
    fn describe_reports_geometry_and_usage() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let start = volume.allocate_cluster_chain(2).unwrap();
        volume.write_to_cluster_chain(&mut cursor, start, b"hi").unwrap();

        let snapshot = volume.describe();
        assert_eq!(snapshot.total_sectors, 2880);
        assert_eq!(snapshot.file_system, "FAT12");
        assert_eq!(snapshot.volume_label, "NO NAME");
        assert!(snapshot.used_bytes > 0);
        assert_eq!(snapshot.partition_size, volume.partition_size());
    }

    #[test]
    fn delete_leaves_fat_entries_marked_in_use() {
        let (mut volume, mut cursor) = new_cursor_volume();
        volume.create_image(&mut cursor).unwrap();
        let start = volume.allocate_cluster_chain(2).unwrap();
        volume.erase_cluster_chain(&mut cursor, start).unwrap();
        // erase zeroes bytes but does not free the chain
        assert_ne!(volume.fat[start as usize], 0);
    }
}
