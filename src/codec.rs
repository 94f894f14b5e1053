//! Byte-level encode/decode: the BIOS Parameter Block, packed 12-bit FAT
//! entries, and 32-byte directory entry records.

use crate::entry::{DirEntry, ATTR_DIRECTORY};
use crate::error::{Error, Result};
use crate::geometry::BiosParameterBlock;
use crate::name::ShortName;

pub const DIR_ENTRY_SIZE: usize = 32;
pub const BPB_OFFSET: usize = 3;
pub const BPB_LEN: usize = 59;

/// Reads a BPB from a boot-sector-sized buffer. `data` must contain at
/// least [`BPB_OFFSET`] + [`BPB_LEN`] bytes.
pub fn read_bpb(data: &[u8]) -> Result<BiosParameterBlock> {
    if data.len() < BPB_OFFSET + BPB_LEN {
        return Err(Error::LogicError("boot sector shorter than BPB region"));
    }
    let b = &data[BPB_OFFSET..];

    let mut oem_label = [0u8; 8];
    oem_label.copy_from_slice(&b[0..8]);

    let mut volume_label = [0u8; 11];
    volume_label.copy_from_slice(&b[40..51]);

    let mut file_system = [0u8; 8];
    file_system.copy_from_slice(&b[51..59]);

    Ok(BiosParameterBlock {
        oem_label,
        bytes_per_sector: u16::from_le_bytes([b[8], b[9]]),
        sectors_per_cluster: b[10],
        reserved_sectors: u16::from_le_bytes([b[11], b[12]]),
        number_of_fats: b[13],
        root_dir_entries: u16::from_le_bytes([b[14], b[15]]),
        total_sectors: u16::from_le_bytes([b[16], b[17]]),
        media_descriptor: b[18],
        sectors_per_fat: u16::from_le_bytes([b[19], b[20]]),
        sectors_per_track: u16::from_le_bytes([b[21], b[22]]),
        number_of_heads: u16::from_le_bytes([b[23], b[24]]),
        hidden_sectors: u32::from_le_bytes([b[25], b[26], b[27], b[28]]),
        large_sectors: u32::from_le_bytes([b[29], b[30], b[31], b[32]]),
        drive_number: b[33],
        flags: b[34],
        signature: b[35],
        volume_id: u32::from_le_bytes([b[36], b[37], b[38], b[39]]),
        volume_label,
        file_system,
    })
}

/// Writes a BPB into a boot-sector-sized buffer, leaving the jump
/// instruction and the bytes beyond the BPB region untouched.
pub fn write_bpb(bpb: &BiosParameterBlock, data: &mut [u8]) -> Result<()> {
    if data.len() < BPB_OFFSET + BPB_LEN {
        return Err(Error::LogicError("boot sector shorter than BPB region"));
    }
    let b = &mut data[BPB_OFFSET..];

    b[0..8].copy_from_slice(&bpb.oem_label);
    b[8..10].copy_from_slice(&bpb.bytes_per_sector.to_le_bytes());
    b[10] = bpb.sectors_per_cluster;
    b[11..13].copy_from_slice(&bpb.reserved_sectors.to_le_bytes());
    b[13] = bpb.number_of_fats;
    b[14..16].copy_from_slice(&bpb.root_dir_entries.to_le_bytes());
    b[16..18].copy_from_slice(&bpb.total_sectors.to_le_bytes());
    b[18] = bpb.media_descriptor;
    b[19..21].copy_from_slice(&bpb.sectors_per_fat.to_le_bytes());
    b[21..23].copy_from_slice(&bpb.sectors_per_track.to_le_bytes());
    b[23..25].copy_from_slice(&bpb.number_of_heads.to_le_bytes());
    b[25..29].copy_from_slice(&bpb.hidden_sectors.to_le_bytes());
    b[29..33].copy_from_slice(&bpb.large_sectors.to_le_bytes());
    b[33] = bpb.drive_number;
    b[34] = bpb.flags;
    b[35] = bpb.signature;
    b[36..40].copy_from_slice(&bpb.volume_id.to_le_bytes());
    b[40..51].copy_from_slice(&bpb.volume_label);
    b[51..59].copy_from_slice(&bpb.file_system);
    Ok(())
}

/// Reads one 12-bit packed FAT entry. Two consecutive entries share
/// three bytes: `[e0 low8][e1 low4 | e0 high4][e1 high8]`.
pub fn read_fat_entry(fat_bytes: &[u8], index: usize) -> u16 {
    let offset = index + index / 2;
    let a = fat_bytes[offset] as u16;
    let b = fat_bytes.get(offset + 1).copied().unwrap_or(0) as u16;
    if index % 2 == 0 {
        a | ((b & 0x0f) << 8)
    } else {
        (a >> 4) | (b << 4)
    }
}

pub fn write_fat_entry(fat_bytes: &mut [u8], index: usize, value: u16) {
    let offset = index + index / 2;
    if offset + 1 >= fat_bytes.len() {
        return;
    }
    if index % 2 == 0 {
        fat_bytes[offset] = (value & 0xff) as u8;
        fat_bytes[offset + 1] = (fat_bytes[offset + 1] & 0xf0) | ((value >> 8) & 0x0f) as u8;
    } else {
        fat_bytes[offset] = (fat_bytes[offset] & 0x0f) | ((value << 4) & 0xf0) as u8;
        fat_bytes[offset + 1] = (value >> 4) as u8;
    }
}

/// Byte length of a packed FAT table for `cluster_count` entries.
pub fn fat_byte_len(cluster_count: usize) -> usize {
    (cluster_count * 3 + 1) / 2
}

pub fn decode_fat(fat_bytes: &[u8], cluster_count: usize) -> Vec<u16> {
    (0..cluster_count)
        .map(|i| read_fat_entry(fat_bytes, i))
        .collect()
}

pub fn encode_fat(entries: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0u8; fat_byte_len(entries.len())];
    for (i, &entry) in entries.iter().enumerate() {
        write_fat_entry(&mut bytes, i, entry);
    }
    bytes
}

fn is_dot_name(short: &ShortName) -> bool {
    let name = short.name_bytes();
    let ext = short.ext_bytes();
    ext == b"   " && (name == b".       " || name == b"..      ")
}

/// Decodes one 32-byte directory record. Returns `Ok(None)` for a free
/// slot (first byte `0x00` or `0xE5`) or for a "." / ".." entry, which
/// this engine never materializes in the tree.
pub fn decode_dir_entry(bytes: &[u8]) -> Result<Option<DirEntry>> {
    if bytes.len() != DIR_ENTRY_SIZE {
        return Err(Error::LogicError("directory record must be 32 bytes"));
    }
    if bytes[0] == 0x00 || bytes[0] == 0xE5 {
        return Ok(None);
    }
    let short_name = ShortName::from_parts(&bytes[0..8], &bytes[8..11]);
    if is_dot_name(&short_name) {
        return Ok(None);
    }

    Ok(Some(DirEntry {
        short_name,
        attributes: bytes[11],
        user_attributes: bytes[12],
        create_time_fine: bytes[13],
        create_time: u16::from_le_bytes([bytes[14], bytes[15]]),
        create_date: u16::from_le_bytes([bytes[16], bytes[17]]),
        owner_id: u16::from_le_bytes([bytes[18], bytes[19]]),
        access_rights: u16::from_le_bytes([bytes[20], bytes[21]]),
        last_modified_time: u16::from_le_bytes([bytes[22], bytes[23]]),
        last_modified_date: u16::from_le_bytes([bytes[24], bytes[25]]),
        first_cluster: u16::from_le_bytes([bytes[26], bytes[27]]),
        file_size: u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
        children: Vec::new(),
    }))
}

pub fn encode_dir_entry(entry: &DirEntry) -> [u8; DIR_ENTRY_SIZE] {
    let mut bytes = [0u8; DIR_ENTRY_SIZE];
    bytes[0..8].copy_from_slice(entry.short_name.name_bytes());
    bytes[8..11].copy_from_slice(entry.short_name.ext_bytes());
    bytes[11] = entry.attributes;
    bytes[12] = entry.user_attributes;
    bytes[13] = entry.create_time_fine;
    bytes[14..16].copy_from_slice(&entry.create_time.to_le_bytes());
    bytes[16..18].copy_from_slice(&entry.create_date.to_le_bytes());
    bytes[18..20].copy_from_slice(&entry.owner_id.to_le_bytes());
    bytes[20..22].copy_from_slice(&entry.access_rights.to_le_bytes());
    bytes[22..24].copy_from_slice(&entry.last_modified_time.to_le_bytes());
    bytes[24..26].copy_from_slice(&entry.last_modified_date.to_le_bytes());
    bytes[26..28].copy_from_slice(&entry.first_cluster.to_le_bytes());
    bytes[28..32].copy_from_slice(&entry.file_size.to_le_bytes());
    bytes
}

fn dot_entry(short_name: ShortName, source: &DirEntry) -> DirEntry {
    DirEntry {
        short_name,
        attributes: ATTR_DIRECTORY,
        user_attributes: source.user_attributes,
        create_time_fine: source.create_time_fine,
        create_time: source.create_time,
        create_date: source.create_date,
        owner_id: source.owner_id,
        access_rights: source.access_rights,
        last_modified_time: source.last_modified_time,
        last_modified_date: source.last_modified_date,
        first_cluster: source.first_cluster,
        file_size: 0,
        children: Vec::new(),
    }
}

/// Serializes a directory's table: synthesized "." and ".." entries
/// (the latter pointing at cluster 0 when `parent_cluster` is the
/// root), followed by real children, zero-padded out to
/// `capacity_entries` slots.
pub fn encode_directory_table(
    dir: &DirEntry,
    self_cluster: u16,
    parent_cluster: u16,
    capacity_entries: usize,
) -> Result<Vec<u8>> {
    if dir.children.len() + 2 > capacity_entries {
        return Err(Error::DirFull);
    }
    let mut out = Vec::with_capacity(capacity_entries * DIR_ENTRY_SIZE);

    let dot = dot_entry(ShortName::from_parts(b".", b""), dir);
    let mut dot = dot;
    dot.first_cluster = self_cluster;
    out.extend_from_slice(&encode_dir_entry(&dot));

    let mut dotdot = dot_entry(ShortName::from_parts(b"..", b""), dir);
    dotdot.first_cluster = parent_cluster;
    out.extend_from_slice(&encode_dir_entry(&dotdot));

    for child in &dir.children {
        out.extend_from_slice(&encode_dir_entry(child));
    }
    out.resize(capacity_entries * DIR_ENTRY_SIZE, 0);
    Ok(out)
}

/// Serializes the root directory's fixed-size table. The root has no
/// "." / ".." entries of its own.
pub fn encode_root_table(root: &DirEntry, capacity_entries: usize) -> Result<Vec<u8>> {
    if root.children.len() > capacity_entries {
        return Err(Error::DirFull);
    }
    let mut out = Vec::with_capacity(capacity_entries * DIR_ENTRY_SIZE);
    for child in &root.children {
        out.extend_from_slice(&encode_dir_entry(child));
    }
    out.resize(capacity_entries * DIR_ENTRY_SIZE, 0);
    Ok(out)
}

/// Decodes a flat directory table (root or subdirectory) into a list
/// of child entries, skipping free slots and dot entries.
pub fn decode_directory_table(bytes: &[u8]) -> Result<Vec<DirEntry>> {
    let mut children = Vec::new();
    for chunk in bytes.chunks(DIR_ENTRY_SIZE) {
        if chunk.len() < DIR_ENTRY_SIZE {
            break;
        }
        if let Some(entry) = decode_dir_entry(chunk)? {
            children.push(entry);
        }
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreateOptions;
    use crate::name::ShortName;

    #[test]
    fn fat_entry_round_trips_even_and_odd_indices() {
        let mut bytes = vec![0u8; fat_byte_len(4)];
        write_fat_entry(&mut bytes, 0, 0xABC);
        write_fat_entry(&mut bytes, 1, 0xDEF);
        write_fat_entry(&mut bytes, 2, 0xFFF);
        assert_eq!(read_fat_entry(&bytes, 0), 0xABC);
        assert_eq!(read_fat_entry(&bytes, 1), 0xDEF);
        assert_eq!(read_fat_entry(&bytes, 2), 0xFFF);
    }

    #[test]
    fn bpb_round_trips_through_bytes() {
        let options = CreateOptions {
            drive_number: Some(0x81),
            ..Default::default()
        };
        let bpb = BiosParameterBlock::initialize(&options, 0x1234_5678);
        let mut sector = vec![0u8; 512];
        write_bpb(&bpb, &mut sector).unwrap();
        let decoded = read_bpb(&sector).unwrap();
        assert_eq!(decoded, bpb);
        assert_eq!(decoded.drive_number, 0x81);
    }

    #[test]
    fn free_slot_decodes_to_none() {
        let mut bytes = [0u8; DIR_ENTRY_SIZE];
        bytes[0] = 0xE5;
        assert!(decode_dir_entry(&bytes).unwrap().is_none());
    }

    #[test]
    fn dir_entry_round_trips_through_bytes() {
        let entry = DirEntry::new_file(ShortName::from_host_str("A.TXT"), 7, 123);
        let bytes = encode_dir_entry(&entry);
        let decoded = decode_dir_entry(&bytes).unwrap().unwrap();
        assert_eq!(decoded.short_name, entry.short_name);
        assert_eq!(decoded.first_cluster, 7);
        assert_eq!(decoded.file_size, 123);
    }

    #[test]
    fn encode_directory_table_synthesizes_dot_entries() {
        let mut dir = DirEntry::new_directory(ShortName::from_host_str("SUB"), 5);
        dir.children.push(DirEntry::new_file(ShortName::from_host_str("A.TXT"), 6, 1));
        let table = encode_directory_table(&dir, 5, 0, 4).unwrap();
        assert_eq!(table.len(), 4 * DIR_ENTRY_SIZE);

        let dot = decode_dir_entry(&table[0..32]);
        // dot entries decode to None because decode_dir_entry filters them
        assert!(dot.unwrap().is_none());

        let child = decode_dir_entry(&table[64..96]).unwrap().unwrap();
        assert_eq!(child.first_cluster, 6);
    }

    #[test]
    fn encode_directory_table_rejects_overflow() {
        let mut dir = DirEntry::new_directory(ShortName::from_host_str("SUB"), 5);
        for i in 0..4 {
            dir.children
                .push(DirEntry::new_file(ShortName::from_host_str(&format!("F{}.TXT", i)), 6, 1));
        }
        assert!(matches!(
            encode_directory_table(&dir, 5, 0, 4),
            Err(Error::DirFull)
        ));
    }
}
