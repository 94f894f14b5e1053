//! FAT12 Volume Engine
//! ===================
//!
//! A self-contained engine for reading, creating, and mutating FAT12
//! disk images: volume geometry, the on-disk codec, the in-memory
//! directory tree, path resolution, and the tree operations built on
//! top of them (list, import, export, move, delete).
//!
//! Components:
//! ----------
//! - Error Model (`error`)
//! - Volume Geometry (`geometry`, `config`)
//! - Image Codec + Name Codec (`codec`, `name`)
//! - Directory Tree (`entry`)
//! - Path Service (`path`)
//! - Tree Operations (`ops`)
//! - Volume aggregate (`volume`)

pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod geometry;
pub mod name;
pub mod ops;
pub mod path;
pub mod volume;

pub use config::CreateOptions;
pub use entry::DirEntry;
pub use error::{Error, Result};
pub use geometry::BiosParameterBlock;
pub use path::{PathChain, PathRelation};
pub use volume::{BpbSnapshot, Volume};
