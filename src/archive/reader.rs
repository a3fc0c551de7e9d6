// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Random-access reads over a finished archive.
//!
//! Opening decodes only the trailers and the small first-level index; the
//! second level and the payloads stay on disk and are streamed per lookup.
//! Both lookup modes are the same walk: seek to the range the first level
//! picked, then decode front-compressed rows forward until the comparison
//! against the query settles it. The current key is kept across rows, so
//! reconstructing the next key is a truncate-and-extend plus one
//! `read_exact` for the row body.
//!
//! A handle is deliberately single-flight: every operation seeks the
//! underlying file, so share an archive across threads by opening one
//! handle each.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::ZlibDecoder;

use crate::error::{ArchiveError, Result};
use crate::key;

use super::first_level::{FirstLevelIndex, ROW_SIZE, TRAILER_SIZE};
use super::{read_u24, read_u40, DEFAULT_SEARCH_LIMIT, OFFSET_SIZE};

/// Largest row body: a full 127-unit key plus the payload offset.
const MAX_ROW_BODY: usize = key::MAX_KEY_UNITS * 2 + OFFSET_SIZE;

const READ_BUF: usize = 16 * 1024;

/// An open archive handle.
pub struct Archive {
    file: File,
    first: FirstLevelIndex,
    /// Byte count of the second-level row data, its size field excluded.
    second_level_data: u64,
    /// Distance from EOF back to the start of the second-level index.
    index_end_from_eof: u64,
}

/// One prefix-search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub key: String,
    pub offset: u64,
}

impl Archive {
    /// Open an archive and decode its trailers and first-level index.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to open {}: {}", path.display(), e),
            )
        })?;

        file.seek(SeekFrom::End(-2))?;
        let mut b2 = [0u8; 2];
        file.read_exact(&mut b2)?;
        let first_level_size = u16::from_le_bytes(b2) as usize;

        if first_level_size < TRAILER_SIZE + ROW_SIZE
            || (first_level_size - TRAILER_SIZE) % ROW_SIZE != 0
        {
            return Err(invalid(format!(
                "bad first-level index size {}",
                first_level_size
            )));
        }
        let first_level_rows = (first_level_size - TRAILER_SIZE) / ROW_SIZE;

        file.seek(SeekFrom::End(-(first_level_size as i64) - 4))?;
        let mut rdr = BufReader::with_capacity(READ_BUF, &mut file);

        let mut b4 = [0u8; 4];
        rdr.read_exact(&mut b4)?;
        let second_level_size = u32::from_le_bytes(b4) as u64;
        if second_level_size < 4 {
            return Err(invalid(format!(
                "bad second-level index size {}",
                second_level_size
            )));
        }

        let first = FirstLevelIndex::read_from(&mut rdr, first_level_rows)?;
        drop(rdr);

        Ok(Self {
            file,
            first,
            second_level_data: second_level_size - 4,
            index_end_from_eof: first_level_size as u64 + second_level_size,
        })
    }

    /// Number of first-level index rows.
    pub fn first_level_len(&self) -> usize {
        self.first.len()
    }

    /// Size of the second-level index in bytes, its size field included.
    pub fn second_level_size(&self) -> u64 {
        self.second_level_data + 4
    }

    /// Distance from EOF back to the start of the second-level index.
    pub fn index_size(&self) -> u64 {
        self.index_end_from_eof
    }

    /// Payload offset for an exact page name.
    ///
    /// Misses come back as [`ArchiveError::NotFound`] (or
    /// [`ArchiveError::BeforeFirstKey`] when the first level already rules
    /// the name out), never as I/O errors.
    pub fn entry_offset(&mut self, name: &str) -> Result<u64> {
        let query = key::encode(name);
        let mut walk = self.walk_from(&query, name)?;

        loop {
            if !walk.next_row()? {
                return Err(ArchiveError::NotFound(name.to_string()));
            }
            match walk.key().cmp(&query[..]) {
                Ordering::Equal => return Ok(walk.offset()),
                Ordering::Greater => return Err(ArchiveError::NotFound(name.to_string())),
                Ordering::Less => {}
            }
        }
    }

    /// Keys starting with `prefix`, in sorted order, at most `limit` of
    /// them. An empty prefix matches nothing; a prefix nothing matches
    /// (including one before the first indexed key) gives an empty list.
    pub fn search(&mut self, prefix: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let query = key::encode(prefix);
        let mut walk = match self.walk_from(&query, prefix) {
            Ok(walk) => walk,
            Err(e) if e.is_miss() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        // Walk to the first row that compares >= the prefix. A key that
        // merely runs out at the end of the prefix is still "less".
        loop {
            if !walk.next_row()? {
                return Ok(Vec::new());
            }
            if walk.key().cmp(&query[..]) != Ordering::Less {
                break;
            }
        }

        let mut results = Vec::with_capacity(limit.min(DEFAULT_SEARCH_LIMIT));
        while walk.key().starts_with(&query[..]) && results.len() < limit {
            results.push(SearchHit {
                key: key::decode(walk.key()),
                offset: walk.offset(),
            });
            if !walk.next_row()? {
                break;
            }
        }

        Ok(results)
    }

    /// Prefix search with the default result cap.
    pub fn search_default(&mut self, prefix: &str) -> Result<Vec<SearchHit>> {
        self.search(prefix, DEFAULT_SEARCH_LIMIT)
    }

    /// Read and inflate the payload at `offset` in one go.
    pub fn read_entry(&mut self, offset: u64) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        self.entry_reader(offset)?.read_to_end(&mut body)?;
        Ok(body)
    }

    /// Stream the payload at `offset`. The stream borrows the handle; it
    /// must be consumed before the next operation.
    pub fn entry_reader(&mut self, offset: u64) -> Result<impl Read + '_> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut prefix = [0u8; 3];
        self.file.read_exact(&mut prefix)?;
        let compressed_size = read_u24(&prefix);

        Ok(ZlibDecoder::new(
            (&mut self.file).take(u64::from(compressed_size)),
        ))
    }

    /// Seek to the second-level range for `query` and hand back a row walk
    /// bounded to the remainder of the region.
    fn walk_from(&mut self, query: &[u16], name: &str) -> Result<RowWalk<'_>> {
        let start = self
            .first
            .route(query)
            .ok_or_else(|| ArchiveError::BeforeFirstKey(name.to_string()))?;

        let remaining = self
            .second_level_data
            .checked_sub(u64::from(start))
            .ok_or_else(|| {
                invalid(format!("first-level offset {} outside second level", start))
            })?;

        self.file.seek(SeekFrom::End(
            -(self.index_end_from_eof as i64) + i64::from(start),
        ))?;

        Ok(RowWalk {
            rdr: BufReader::with_capacity(READ_BUF, &mut self.file),
            current: Vec::with_capacity(key::MAX_KEY_UNITS),
            body: [0u8; MAX_ROW_BODY],
            offset: 0,
            remaining,
        })
    }
}

/// Forward decoder over second-level rows.
///
/// `current` holds the last decoded key; a row's shared prefix length
/// truncates it and the suffix extends it, which is all front compression
/// asks of a reader. Seeks only land on rows with a zero shared prefix, so
/// starting with an empty `current` is sound.
struct RowWalk<'a> {
    rdr: BufReader<&'a mut File>,
    current: Vec<u16>,
    body: [u8; MAX_ROW_BODY],
    offset: u64,
    remaining: u64,
}

impl RowWalk<'_> {
    /// Decode the next row. `false` at the end of the region.
    fn next_row(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }

        let mut header = [0u8; 2];
        self.rdr.read_exact(&mut header)?;
        let shared = usize::from(header[0]);
        let rest = usize::from(header[1]);

        if shared + rest > key::MAX_KEY_UNITS {
            return Err(invalid(format!("bad row header {}+{}", shared, rest)));
        }
        if shared > self.current.len() {
            return Err(invalid(format!(
                "row shares {} units but only {} are known",
                shared,
                self.current.len()
            )));
        }

        let body_size = rest * 2 + OFFSET_SIZE;
        if (2 + body_size) as u64 > self.remaining {
            return Err(invalid(
                "row extends past the second-level region".to_string(),
            ));
        }
        self.remaining -= (2 + body_size) as u64;

        self.rdr.read_exact(&mut self.body[..body_size])?;

        self.current.truncate(shared);
        for i in 0..rest {
            self.current
                .push(u16::from_le_bytes([self.body[2 * i], self.body[2 * i + 1]]));
        }
        self.offset = read_u40(&self.body[rest * 2..]);

        Ok(true)
    }

    fn key(&self) -> &[u16] {
        &self.current
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

fn invalid(reason: String) -> ArchiveError {
    io::Error::new(io::ErrorKind::InvalidData, reason).into()
}
