// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Stage 2: assemble the final archive.
//!
//! The packed entry region is copied through verbatim; the work here is the
//! index. Entries and redirects merge into one key set — a redirect is just
//! another key carrying its target entry's payload offset — which is sorted
//! by UTF-16 code units and written as front-compressed rows. The
//! first-level index falls out of the same pass: whenever 1024 rows have
//! gone by and the 4-unit prefix changes, the current row is written
//! self-contained (shared prefix length 0) and becomes a seek target.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{ArchiveError, Result};
use crate::key;
use crate::stage::{self, EntryMeta, Redirect};

use super::first_level::{FirstLevelIndex, FirstLevelKey};
use super::{push_u40, JUMP_INTERVAL};

const WRITE_BUF: usize = 1024 * 1024;

/// One key in the merged index: a page name and where its payload starts.
pub struct IndexRow {
    pub key: Vec<u16>,
    pub offset: u64,
}

/// Build the archive for `data_dir` at `output`, from the stage-0 and
/// stage-1 files.
pub fn build_archive(data_dir: &Path, output: &Path) -> Result<()> {
    let out = File::create(output)?;
    let mut w = BufWriter::with_capacity(WRITE_BUF, out);

    let mut packed = File::open(data_dir.join(stage::PACKED_FILE))?;
    io::copy(&mut packed, &mut w)?;

    let redirects = stage::read_redirects(data_dir)?;
    let meta = stage::read_entry_meta(data_dir)?;

    let rows = merge_rows(&meta, &redirects)?;
    let first_level = write_second_level(&mut w, &rows)?;
    first_level.write_to(&mut w)?;

    w.flush()?;
    Ok(())
}

/// Merge entries and redirects into one offset-carrying key sequence,
/// sorted by UTF-16 code-unit comparison.
pub fn merge_rows(meta: &EntryMeta, redirects: &[Redirect]) -> Result<Vec<IndexRow>> {
    let mut rows = Vec::with_capacity(meta.len() + redirects.len());

    for i in 0..meta.len() {
        rows.push(IndexRow {
            key: meta.name(i).to_vec(),
            offset: meta.start_offset(i),
        });
    }

    for r in redirects {
        if r.entry_idx >= meta.len() {
            return Err(ArchiveError::MalformedStageFile {
                path: stage::REDIRECTS_FILE.into(),
                reason: format!("entry index {} out of range", r.entry_idx),
            });
        }
        rows.push(IndexRow {
            key: r.name.clone(),
            offset: meta.start_offset(r.entry_idx),
        });
    }

    rows.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    Ok(rows)
}

/// Write the second-level rows plus their u32 size trailer, and return the
/// first-level index collected along the way.
pub fn write_second_level<W: Write>(w: &mut W, rows: &[IndexRow]) -> Result<FirstLevelIndex> {
    let first = rows.first().ok_or(ArchiveError::EmptyArchive)?;

    let mut index = FirstLevelIndex::default();
    let mut prev_first_key = FirstLevelKey::of(&first.key);
    index.push(prev_first_key, 0);
    let mut rows_since_jump = 0usize;

    let mut total_size: u32 = 0;
    let mut bb: Vec<u8> = Vec::with_capacity(512);
    let mut prev_key: &[u16] = &[];

    for row in rows {
        if row.key.len() > key::MAX_KEY_UNITS {
            return Err(ArchiveError::KeyTooLong {
                name: key::decode(&row.key),
                units: row.key.len(),
            });
        }
        if row.offset >= 1 << 40 {
            return Err(ArchiveError::OffsetTooLarge(row.offset));
        }

        let current_first_key = FirstLevelKey::of(&row.key);
        let mut front_compress = true;
        if rows_since_jump >= JUMP_INTERVAL && current_first_key != prev_first_key {
            // Seeks must be able to land here, so the key is written whole.
            front_compress = false;
            index.push(current_first_key, total_size);
            rows_since_jump = 0;
        }
        prev_first_key = current_first_key;
        rows_since_jump += 1;

        let shared = if front_compress {
            key::common_prefix_len(prev_key, &row.key)
        } else {
            0
        };
        let remaining = row.key.len() as u8 - shared;

        bb.clear();
        bb.push(shared);
        bb.push(remaining);
        for &unit in &row.key[shared as usize..] {
            bb.extend_from_slice(&unit.to_le_bytes());
        }
        push_u40(&mut bb, row.offset);

        total_size += bb.len() as u32;
        w.write_all(&bb)?;
        prev_key = &row.key;
    }

    total_size += 4; // the size field counts itself
    w.write_all(&total_size.to_le_bytes())?;

    Ok(index)
}
