//! Volume geometry: the BIOS Parameter Block and the preset table used
//! to initialize one for a requested image size.

use crate::config::CreateOptions;

/// BIOS Parameter Block, covering the 59-byte region FAT12 images carry
/// starting at boot-sector offset 3 (jump instruction and OEM label
/// included, since both are part of the addressable layout even though
/// their contents are otherwise opaque to this engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiosParameterBlock {
    pub oem_label: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub number_of_fats: u8,
    pub root_dir_entries: u16,
    pub total_sectors: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub number_of_heads: u16,
    pub hidden_sectors: u32,
    pub large_sectors: u32,
    pub drive_number: u8,
    pub flags: u8,
    pub signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub file_system: [u8; 8],
}

/// One entry of the original preset table: given a requested image
/// size in KiB, fill in sector size, sectors-per-cluster, root
/// directory entries, media descriptor, and disk geometry the way real
/// DOS FORMAT would for a disk of that size.
struct Preset {
    volume_size_kib: u32,
    sector_size: u16,
    sectors_per_cluster: u8,
    root_dir_entries: u16,
    media_descriptor: u8,
    sectors_per_track: u16,
    number_of_heads: u16,
}

const PRESETS: &[Preset] = &[
    Preset {
        volume_size_kib: 2880,
        sector_size: 512,
        sectors_per_cluster: 2,
        root_dir_entries: 512,
        media_descriptor: 0xF0,
        sectors_per_track: 36,
        number_of_heads: 2,
    },
    Preset {
        volume_size_kib: 1440,
        sector_size: 512,
        sectors_per_cluster: 1,
        root_dir_entries: 224,
        media_descriptor: 0xF0,
        sectors_per_track: 18,
        number_of_heads: 2,
    },
    Preset {
        volume_size_kib: 1232,
        sector_size: 1024,
        sectors_per_cluster: 1,
        root_dir_entries: 224,
        media_descriptor: 0xFE,
        sectors_per_track: 8,
        number_of_heads: 2,
    },
    Preset {
        volume_size_kib: 1200,
        sector_size: 512,
        sectors_per_cluster: 1,
        root_dir_entries: 224,
        media_descriptor: 0xF9,
        sectors_per_track: 15,
        number_of_heads: 2,
    },
    Preset {
        volume_size_kib: 720,
        sector_size: 512,
        sectors_per_cluster: 2,
        root_dir_entries: 112,
        media_descriptor: 0xF9,
        sectors_per_track: 9,
        number_of_heads: 2,
    },
    // 640 KiB: the original's switch statement falls through this case
    // into the 360 KiB one (no `break;`), so the values that actually
    // take effect are the 360 KiB preset's. Reproduced here rather than
    // silently "fixed" since callers may depend on matching real media.
    Preset {
        volume_size_kib: 640,
        sector_size: 512,
        sectors_per_cluster: 2,
        root_dir_entries: 112,
        media_descriptor: 0xFD,
        sectors_per_track: 9,
        number_of_heads: 2,
    },
    Preset {
        volume_size_kib: 360,
        sector_size: 512,
        sectors_per_cluster: 2,
        root_dir_entries: 112,
        media_descriptor: 0xFD,
        sectors_per_track: 9,
        number_of_heads: 2,
    },
    Preset {
        volume_size_kib: 320,
        sector_size: 2048,
        sectors_per_cluster: 1,
        root_dir_entries: 48,
        media_descriptor: 0xFF,
        sectors_per_track: 8,
        number_of_heads: 2,
    },
    Preset {
        volume_size_kib: 180,
        sector_size: 512,
        sectors_per_cluster: 1,
        root_dir_entries: 48,
        media_descriptor: 0xFC,
        sectors_per_track: 9,
        number_of_heads: 1,
    },
    Preset {
        volume_size_kib: 160,
        sector_size: 512,
        sectors_per_cluster: 1,
        root_dir_entries: 16,
        media_descriptor: 0xFE,
        sectors_per_track: 8,
        number_of_heads: 1,
    },
];

const DEFAULT_PRESET: &Preset = &Preset {
    volume_size_kib: 0,
    sector_size: 512,
    sectors_per_cluster: 4,
    root_dir_entries: 512,
    media_descriptor: 0xF8,
    sectors_per_track: 63,
    number_of_heads: 255,
};

fn preset_for(volume_size_kib: u32) -> &'static Preset {
    PRESETS
        .iter()
        .find(|p| p.volume_size_kib == volume_size_kib)
        .unwrap_or(DEFAULT_PRESET)
}

fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// The analytic sectors-per-FAT formula (the one the original keeps in
/// `create.c`, not the simpler divide-based one in `bpb.c` that
/// undercounts for small root directories).
pub fn sectors_per_fat(
    total_sectors: u32,
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    root_dir_entries: u16,
    number_of_fats: u8,
) -> u16 {
    let sector_size = bytes_per_sector as u64;
    let root_dir_size = root_dir_entries as u64 * 32;
    let root_dir_sectors = ceil_div(root_dir_size, sector_size);
    let data_sectors = (total_sectors as u64)
        .saturating_sub(root_dir_sectors)
        .saturating_sub(reserved_sectors as u64);
    let clusters_with_fat = ceil_div(data_sectors, sectors_per_cluster as u64) + 2;
    let cluster_size = sectors_per_cluster as u64 * sector_size;

    let numerator = (clusters_with_fat as f64) * 1.5;
    let denominator =
        sector_size as f64 * ((1.5 * number_of_fats as f64 / cluster_size as f64) + 1.0);
    ceil_div_f64(numerator, denominator) as u16
}

fn ceil_div_f64(num: f64, den: f64) -> u64 {
    (num / den).ceil() as u64
}

/// Generates a non-zero volume serial from the current wall clock,
/// mixing seconds and microseconds the way the original does so two
/// volumes created in the same second still differ.
pub fn generate_volume_id(secs: u32, micros: u32) -> u32 {
    (((micros & 0xFFFF) << 16) | (secs & 0xFFFF) | 1) as u32
}

impl BiosParameterBlock {
    /// Builds a BPB for a fresh image, applying a size preset and then
    /// layering any caller overrides from `options` on top, mirroring
    /// `_f12_initialize_bpb`'s preset-then-override sequencing.
    pub fn initialize(options: &CreateOptions, volume_id: u32) -> BiosParameterBlock {
        let volume_size_kib = options.volume_size_kib.unwrap_or(1440);
        let preset = preset_for(volume_size_kib);
        let size_bytes = volume_size_kib as u64 * 1024;

        let mut bytes_per_sector = preset.sector_size;
        let mut media_descriptor = preset.media_descriptor;
        if let Some(sector_size) = options.bytes_per_sector {
            bytes_per_sector = sector_size;
            media_descriptor = 0xF8;
        }

        let sectors_per_cluster = options
            .sectors_per_cluster
            .unwrap_or(preset.sectors_per_cluster);
        let reserved_sectors = options.reserved_sectors.unwrap_or(1);
        let number_of_fats = options.number_of_fats.unwrap_or(2);
        let root_dir_entries = options.root_dir_entries.unwrap_or(preset.root_dir_entries);
        let drive_number = options.drive_number.unwrap_or(0x80);

        let logical_sectors = (size_bytes / bytes_per_sector as u64) as u16;

        let fat_size = sectors_per_fat(
            logical_sectors as u32,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            root_dir_entries,
            number_of_fats,
        );

        let mut volume_label = [b' '; 11];
        let label_str = options.volume_label.as_deref().unwrap_or("NO NAME");
        for (i, &b) in label_str.as_bytes().iter().take(11).enumerate() {
            volume_label[i] = b;
        }

        let mut oem_label = [b' '; 8];
        oem_label[..3].copy_from_slice(b"f12");

        let mut file_system = [b' '; 8];
        file_system[..5].copy_from_slice(b"FAT12");

        BiosParameterBlock {
            oem_label,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            number_of_fats,
            root_dir_entries,
            total_sectors: logical_sectors,
            media_descriptor,
            sectors_per_fat: fat_size,
            sectors_per_track: preset.sectors_per_track,
            number_of_heads: preset.number_of_heads,
            hidden_sectors: 0,
            large_sectors: logical_sectors as u32,
            drive_number,
            flags: 0,
            signature: 0,
            volume_id,
            volume_label,
            file_system,
        }
    }

    pub fn root_dir_sectors(&self) -> u32 {
        ceil_div(
            self.root_dir_entries as u64 * 32,
            self.bytes_per_sector as u64,
        ) as u32
    }

    pub fn fat_region_sectors(&self) -> u32 {
        self.number_of_fats as u32 * self.sectors_per_fat as u32
    }

    pub fn root_dir_offset_sectors(&self) -> u32 {
        self.reserved_sectors as u32 + self.fat_region_sectors()
    }

    pub fn data_offset_sectors(&self) -> u32 {
        self.root_dir_offset_sectors() + self.root_dir_sectors()
    }

    pub fn cluster_count(&self) -> u32 {
        let data_sectors = (self.total_sectors as u32).saturating_sub(self.data_offset_sectors());
        data_sectors / self.sectors_per_cluster as u32
    }
}
