//! In-memory directory tree.
//!
//! A [`DirEntry`] owns its children directly instead of the aliased
//! parent/child raw pointers the C original uses. "." and ".." are
//! never materialized as tree nodes; [`crate::codec`] synthesizes them
//! only when serializing a directory's on-disk table.

use crate::name::ShortName;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub short_name: ShortName,
    pub attributes: u8,
    pub user_attributes: u8,
    pub create_time_fine: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub owner_id: u16,
    pub access_rights: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub first_cluster: u16,
    pub file_size: u32,
    pub children: Vec<DirEntry>,
}

impl DirEntry {
    pub fn new_file(short_name: ShortName, first_cluster: u16, file_size: u32) -> DirEntry {
        DirEntry {
            short_name,
            attributes: ATTR_ARCHIVE,
            user_attributes: 0,
            create_time_fine: 0,
            create_time: 0,
            create_date: 0,
            owner_id: 0,
            access_rights: 0,
            last_modified_time: 0,
            last_modified_date: 0,
            first_cluster,
            file_size,
            children: Vec::new(),
        }
    }

    pub fn new_directory(short_name: ShortName, first_cluster: u16) -> DirEntry {
        DirEntry {
            attributes: ATTR_DIRECTORY,
            ..DirEntry::new_file(short_name, first_cluster, 0)
        }
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    /// Recursively counts non-directory descendants.
    pub fn file_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| if c.is_directory() { c.file_count() } else { 1 })
            .sum()
    }

    /// Recursively counts directory descendants (not counting self).
    pub fn directory_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| {
                if c.is_directory() {
                    1 + c.directory_count()
                } else {
                    0
                }
            })
            .sum()
    }

    /// Number of occupied child slots, i.e. this entry's own children
    /// vector length. Distinct from the on-disk slot *capacity* a
    /// directory's allocated cluster chain provides, which
    /// `spec.md`'s `child_count` elides with used-entry count; see
    /// DESIGN.md for why this crate keeps the two separate.
    pub fn used_child_count(&self) -> usize {
        self.children.len()
    }

    pub fn find_child(&self, short_name: &ShortName) -> Option<&DirEntry> {
        self.children.iter().find(|c| &c.short_name == short_name)
    }

    pub fn find_child_mut(&mut self, short_name: &ShortName) -> Option<&mut DirEntry> {
        self.children
            .iter_mut()
            .find(|c| &c.short_name == short_name)
    }

    /// Removes and returns the child with the given short name.
    pub fn take_child(&mut self, short_name: &ShortName) -> Option<DirEntry> {
        let idx = self.children.iter().position(|c| &c.short_name == short_name)?;
        Some(self.children.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::ShortName;

    fn name(s: &str) -> ShortName {
        ShortName::from_host_str(s)
    }

    #[test]
    fn new_directory_has_directory_attribute() {
        let dir = DirEntry::new_directory(name("SUB"), 5);
        assert!(dir.is_directory());
        assert_eq!(dir.first_cluster, 5);
    }

    #[test]
    fn file_and_directory_counts_are_recursive() {
        let mut root = DirEntry::new_directory(name(""), 0);
        let mut sub = DirEntry::new_directory(name("SUB"), 3);
        sub.children.push(DirEntry::new_file(name("A.TXT"), 4, 10));
        sub.children.push(DirEntry::new_file(name("B.TXT"), 5, 20));
        root.children.push(sub);
        root.children.push(DirEntry::new_file(name("C.TXT"), 6, 30));

        assert_eq!(root.file_count(), 3);
        assert_eq!(root.directory_count(), 1);
    }

    #[test]
    fn take_child_removes_from_tree() {
        let mut root = DirEntry::new_directory(name(""), 0);
        root.children.push(DirEntry::new_file(name("A.TXT"), 4, 10));
        let taken = root.take_child(&name("A.TXT"));
        assert!(taken.is_some());
        assert_eq!(root.used_child_count(), 0);
    }

    #[test]
    fn find_child_is_case_and_padding_insensitive_via_short_name() {
        let mut root = DirEntry::new_directory(name(""), 0);
        root.children.push(DirEntry::new_file(name("readme.txt"), 1, 5));
        assert!(root.find_child(&name("README.TXT")).is_some());
    }
}
