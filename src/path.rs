//! Path parsing, resolution, and ancestor/descendant relations.

use crate::entry::DirEntry;
use crate::error::{Error, Result};
use crate::name::{format_path, split_path, ShortName};

/// A parsed path: a sequence of short names to walk from the root. The
/// root itself is the empty chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChain {
    pub segments: Vec<ShortName>,
    display: Vec<String>,
}

impl PathChain {
    /// Parses a path string. Returns [`Error::EmptyPath`] if, once
    /// leading/trailing slashes are stripped, no segment remains (bare
    /// root paths are rejected here because every caller of `parse` is
    /// targeting a concrete entry; callers that mean the root use
    /// [`PathChain::root`] directly).
    pub fn parse(input: &str) -> Result<PathChain> {
        let display = split_path(input);
        if display.is_empty() {
            return Err(Error::EmptyPath);
        }
        let segments = display.iter().map(|s| ShortName::from_host_str(s)).collect();
        Ok(PathChain { segments, display })
    }

    pub fn root() -> PathChain {
        PathChain {
            segments: Vec::new(),
            display: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn display(&self) -> String {
        format_path(&self.display)
    }

    /// Path to this entry's parent directory; the root's parent is
    /// itself the root.
    pub fn parent(&self) -> PathChain {
        if self.segments.is_empty() {
            return self.clone();
        }
        PathChain {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            display: self.display[..self.display.len() - 1].to_vec(),
        }
    }

    pub fn last(&self) -> Option<&ShortName> {
        self.segments.last()
    }

    /// Every non-empty prefix of this path, shortest first, e.g.
    /// `/a/b/c` yields `[/a, /a/b, /a/b/c]`.
    pub fn prefixes(&self) -> Vec<PathChain> {
        (1..=self.segments.len())
            .map(|n| PathChain {
                segments: self.segments[..n].to_vec(),
                display: self.display[..n].to_vec(),
            })
            .collect()
    }

    pub fn join(&self, name: &str) -> PathChain {
        let mut segments = self.segments.clone();
        segments.push(ShortName::from_host_str(name));
        let mut display = self.display.clone();
        display.push(name.to_string());
        PathChain { segments, display }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRelation {
    /// The two paths name the same entry.
    Equal,
    /// Neither path is an ancestor of the other.
    Unrelated,
    /// The first path is an ancestor of the second.
    FirstIsAncestor,
    /// The second path is an ancestor of the first.
    SecondIsAncestor,
}

/// Compares two paths by walking their segments in lockstep.
pub fn relation(a: &PathChain, b: &PathChain) -> PathRelation {
    let common = a.segments.iter().zip(b.segments.iter()).take_while(|(x, y)| x == y).count();

    if common < a.segments.len() && common < b.segments.len() {
        return PathRelation::Unrelated;
    }
    match a.segments.len().cmp(&b.segments.len()) {
        std::cmp::Ordering::Equal => PathRelation::Equal,
        std::cmp::Ordering::Less => PathRelation::FirstIsAncestor,
        std::cmp::Ordering::Greater => PathRelation::SecondIsAncestor,
    }
}

/// Resolves a path to the entry it names, starting from `root`.
pub fn resolve<'a>(root: &'a DirEntry, path: &PathChain) -> Result<&'a DirEntry> {
    let mut current = root;
    for (i, segment) in path.segments.iter().enumerate() {
        if !current.is_directory() {
            return Err(Error::NotADir);
        }
        current = current
            .find_child(segment)
            .ok_or_else(|| Error::FileNotFound(path_prefix_display(path, i + 1)))?;
    }
    Ok(current)
}

pub fn resolve_mut<'a>(root: &'a mut DirEntry, path: &PathChain) -> Result<&'a mut DirEntry> {
    let mut current = root;
    for (i, segment) in path.segments.iter().enumerate() {
        if !current.is_directory() {
            return Err(Error::NotADir);
        }
        current = current
            .find_child_mut(segment)
            .ok_or_else(|| Error::FileNotFound(path_prefix_display(path, i + 1)))?;
    }
    Ok(current)
}

fn path_prefix_display(path: &PathChain, len: usize) -> String {
    PathChain {
        segments: path.segments[..len].to_vec(),
        display: path.display[..len].to_vec(),
    }
    .display()
}
