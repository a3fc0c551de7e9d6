//! Crate-wide error type.
//!
//! Failures come in two flavors and callers need to tell them apart: a
//! lookup miss is an expected outcome (the HTTP layer turns it into a 404),
//! while everything else means the archive or the build input is broken and
//! the operation must abort. [`ArchiveError::is_miss`] draws that line.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The key is not in the archive (it would sort between two existing
    /// rows, or after the last row).
    #[error("{0:?} is not in the archive")]
    NotFound(String),

    /// The key sorts before the first first-level index entry, so no
    /// second-level range can contain it.
    #[error("{0:?} sorts before the first indexed key")]
    BeforeFirstKey(String),

    #[error("redirect stub {}: {reason}", path.display())]
    MalformedRedirect { path: PathBuf, reason: &'static str },

    #[error("stage file {}: {reason}", path.display())]
    MalformedStageFile { path: PathBuf, reason: String },

    /// A compressed entry no longer fits the u24 length prefix.
    #[error("compressed entry is too big: {size} bytes")]
    EntryTooLarge { size: u64 },

    /// A payload offset no longer fits the 40-bit on-disk encoding.
    #[error("payload offset {0} exceeds the 40-bit limit")]
    OffsetTooLarge(u64),

    #[error("key is too long: {units} UTF-16 code units in {name:?}")]
    KeyTooLong { name: String, units: usize },

    #[error("first-level index does not fit a u16 size: {rows} rows")]
    FirstLevelTooLarge { rows: usize },

    #[error("archive would contain no entries")]
    EmptyArchive,
}

impl ArchiveError {
    /// True for lookup misses, which are expected outcomes rather than
    /// archive corruption or I/O failure.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            ArchiveError::NotFound(_) | ArchiveError::BeforeFirstKey(_)
        )
    }
}
