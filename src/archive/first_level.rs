// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The first-level index: fixed-stride routing into the second level.
//!
//! Each row is a 4-code-unit key (zero-padded) plus a u32 byte offset into
//! the second-level index. The on-disk form packs all keys first, then all
//! offsets, then the u16 size trailer; a row therefore costs 12 bytes and
//! the row count falls out of the trailer as `(size − 2) / 12`.
//!
//! Routing a query is a linear scan for the first key strictly greater
//! than the query, then taking the offset one row back. The table is a few
//! thousand rows at most, so a scan is fine; it lives in memory for the
//! lifetime of an open archive.

use std::io::{self, Read, Write};

use crate::error::{ArchiveError, Result};

/// Bytes per first-level row on disk: 4 × u16 key + u32 offset.
pub const ROW_SIZE: usize = 12;

/// Bytes of the size trailer itself.
pub const TRAILER_SIZE: usize = 2;

/// A second-level row's first four UTF-16 code units, zero-padded.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FirstLevelKey([u16; 4]);

impl FirstLevelKey {
    pub fn of(key: &[u16]) -> Self {
        let mut units = [0u16; 4];
        for (slot, &unit) in units.iter_mut().zip(key.iter()) {
            *slot = unit;
        }
        Self(units)
    }

    pub fn units(&self) -> &[u16; 4] {
        &self.0
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for unit in self.0 {
            w.write_all(&unit.to_le_bytes())?;
        }
        Ok(())
    }
}

/// The in-memory first-level index.
#[derive(Default)]
pub struct FirstLevelIndex {
    keys: Vec<FirstLevelKey>,
    offsets: Vec<u32>,
}

impl FirstLevelIndex {
    pub fn push(&mut self, key: FirstLevelKey, offset: u32) {
        self.keys.push(key);
        self.offsets.push(offset);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn offset_at(&self, i: usize) -> u32 {
        self.offsets[i]
    }

    /// Total encoded size including the u16 trailer.
    pub fn encoded_size(&self) -> Result<u16> {
        let size = self.keys.len() * ROW_SIZE + TRAILER_SIZE;
        u16::try_from(size).map_err(|_| ArchiveError::FirstLevelTooLarge {
            rows: self.keys.len(),
        })
    }

    /// Write keys, offsets, and the size trailer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let size = self.encoded_size()?;

        for key in &self.keys {
            key.write_to(w)?;
        }
        for offset in &self.offsets {
            w.write_all(&offset.to_le_bytes())?;
        }
        w.write_all(&size.to_le_bytes())?;

        Ok(())
    }

    /// Decode `rows` rows (the trailer has already been consumed by the
    /// caller, which needed it to find us).
    pub fn read_from<R: Read>(r: &mut R, rows: usize) -> io::Result<Self> {
        let mut keys = Vec::with_capacity(rows);
        let mut buf = [0u8; 8];

        for _ in 0..rows {
            r.read_exact(&mut buf)?;
            let mut units = [0u16; 4];
            for (j, unit) in units.iter_mut().enumerate() {
                *unit = u16::from_le_bytes([buf[2 * j], buf[2 * j + 1]]);
            }
            keys.push(FirstLevelKey(units));
        }

        let mut offsets = Vec::with_capacity(rows);
        for _ in 0..rows {
            r.read_exact(&mut buf[..4])?;
            offsets.push(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]));
        }

        Ok(Self { keys, offsets })
    }

    /// Second-level byte offset of the range that could contain `query`.
    ///
    /// The scan finds the first key strictly greater than the query and
    /// takes the offset one row back. Queries shorter than four units are
    /// compared through their own zero-padded key, so a short query equal
    /// to the first key's stem still lands in that key's range.
    ///
    /// `None` when the query sorts before the first key, which means no
    /// range can contain it.
    pub fn route(&self, query: &[u16]) -> Option<u32> {
        let padded = FirstLevelKey::of(query);
        let probe: &[u16] = if query.len() < 4 {
            &padded.0
        } else {
            query
        };

        for (i, key) in self.keys.iter().enumerate() {
            if key.0.as_slice() > probe {
                if i == 0 {
                    return None;
                }
                return Some(self.offsets[i - 1]);
            }
        }

        // After the last key: the final range.
        self.offsets.last().copied()
    }
}
