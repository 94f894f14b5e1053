//! Error model for the FAT12 volume engine.
//!
//! A single sum type covers every failure the engine can report. Unlike
//! the C original's process-wide `errno` latch, the "first OS error
//! wins" behavior is captured per-operation by [`Error::from_io`], which
//! is only ever called once per failing syscall site.

use std::fmt;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not a directory")]
    NotADir,

    #[error("directory is full")]
    DirFull,

    #[error("could not allocate a cluster chain of {requested} cluster(s)")]
    AllocationError { requested: usize },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        os_code: Option<i32>,
    },

    #[error("logic error: {0}")]
    LogicError(&'static str),

    #[error("image is full")]
    ImageFull,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("path is empty")]
    EmptyPath,

    #[error("directory is not empty")]
    DirNotEmpty,

    #[error("entry is a directory")]
    IsDir,

    #[error("unknown error")]
    Unknown,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Captures an [`io::Error`] exactly once. Mirrors `f12_save_errno`'s
    /// one-shot latch, but as a value rather than a process-wide static:
    /// the first `io::Error` seen at a call site is the one callers get,
    /// later ones along the same unwind are dropped by the caller simply
    /// not calling this a second time for the same attempt.
    pub fn from_io(err: io::Error) -> Self {
        let os_code = err.raw_os_error();
        Error::Io {
            message: err.to_string(),
            os_code,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::from_io(err)
    }
}

/// A one-shot capture cell, for callers that need the "only the first
/// error survives" contract across a sequence of fallible steps rather
/// than at a single call site.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    captured: Option<Error>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        ErrorLatch { captured: None }
    }

    /// Records `err` unless something was already captured.
    pub fn capture(&mut self, err: Error) {
        if self.captured.is_none() {
            self.captured = Some(err);
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self.captured {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ErrorLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.captured {
            Some(err) => write!(f, "{}", err),
            None => write!(f, "success"),
        }
    }
}
