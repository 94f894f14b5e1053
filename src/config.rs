//! Caller-supplied overrides for image creation.
//!
//! Every field is optional: an unset field falls back to whatever the
//! size preset [`crate::geometry::BiosParameterBlock::initialize`]
//! picks for the requested `volume_size_kib`. This mirrors
//! `_f12_initialize_bpb`'s override list exactly — no extra knobs the
//! original doesn't expose. Deriving `serde::Deserialize` lets a host
//! tool load a named preset from a TOML file instead of constructing
//! one in code.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateOptions {
    /// Requested image size in KiB (1440, 1232, 720, ... — see the
    /// preset table in `geometry.rs`). Defaults to 1440 (a standard
    /// 3.5" floppy) when unset.
    pub volume_size_kib: Option<u32>,
    pub bytes_per_sector: Option<u16>,
    pub sectors_per_cluster: Option<u8>,
    pub reserved_sectors: Option<u16>,
    pub number_of_fats: Option<u8>,
    pub root_dir_entries: Option<u16>,
    pub drive_number: Option<u8>,
    pub volume_label: Option<String>,
}
