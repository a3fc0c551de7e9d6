//! Turn a dumped offline wiki into a single random-access archive file.
//!
//! The input is a directory tree of HTML pages plus tiny HTML-refresh stubs
//! that redirect one page name to another. The output is one file that a
//! reader can open, look a page up in by exact name, or prefix-search, all
//! with a handful of seeks and no external index.
//!
//! # Pipeline
//!
//! Building runs as three stages, each leaving its result on disk so a long
//! build can be resumed at a stage boundary:
//!
//! ```text
//! ┌──────────┐      ┌────────────┐      ┌────────────────┐
//! │   scan   │─────▶│  compress  │─────▶│ archive::writer│
//! │ (stage 0)│      │ (stage 1)  │      │   (stage 2)    │
//! └──────────┘      └────────────┘      └────────────────┘
//!  entry list        packed zlib         one archive file
//!  redirect list     blobs + offsets
//! ```
//!
//! # File format
//!
//! All multi-byte values are little endian. Strings in the indexes are
//! UTF-16LE code units; keys are at most 127 code units.
//!
//! ```text
//! [ packed entries: (u24 length ++ zlib bytes) per entry  ]
//! [ second-level index rows (front-compressed keys)       ]
//! [ u32 second-level size in bytes, including this u32    ]
//! [ first-level keys, 8 bytes each (4 × u16, zero-padded) ]
//! [ first-level offsets, u32 each                         ]
//! [ u16 first-level size in bytes, including this u16     ]
//! ```
//!
//! The reader anchors everything off the end of the file: the last two bytes
//! give the first-level index size, which in turn locates the second-level
//! size word. See [`archive`] for the row encodings.

pub mod archive;
pub mod compress;
pub mod error;
pub mod key;
pub mod scan;
pub mod serve;
pub mod stage;

pub use archive::{Archive, SearchHit};
pub use error::{ArchiveError, Result};
