// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! On-disk hand-off between pipeline stages.
//!
//! Each stage leaves its output in the data directory so the next stage (or
//! a re-run after a crash) can pick it up without redoing earlier work. The
//! text streams are deliberately dull: UTF-8, decimal integers, LF
//! terminators, and a leading count so readers can pre-size their vectors.
//!
//! - `stage-0-entries.txt`: count, then one local path per line.
//! - `stage-0-redirects.txt`: count, then `source_name<TAB>entry_index`.
//! - `stage-1-entries.dat`: packed `[u24 LE length][zlib bytes]` (binary).
//! - `stage-1-entry-meta.txt`: count, the entry names, then the cumulative
//!   end offset of each compressed entry.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};
use crate::key;

pub const ENTRIES_FILE: &str = "stage-0-entries.txt";
pub const REDIRECTS_FILE: &str = "stage-0-redirects.txt";
pub const PACKED_FILE: &str = "stage-1-entries.dat";
pub const ENTRY_META_FILE: &str = "stage-1-entry-meta.txt";

const WRITE_BUF: usize = 1024 * 1024;
const READ_BUF: usize = 1024 * 1024;

/// Derive the logical page name from an entry's local path.
///
/// Strips the data-directory prefix, undoes the `_exceptions/` filename
/// escaping (`%2f` stands for `/`), and drops the `A/` subtree prefix that
/// every logical name carries in the dump.
pub fn logical_name(data_dir: &Path, local_path: &str) -> String {
    let mut prefix = data_dir.to_string_lossy().into_owned();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }

    let rel = local_path.strip_prefix(&prefix).unwrap_or(local_path);

    let decoded = match rel.strip_prefix("_exceptions/") {
        Some(escaped) => escaped.replace("%2f", "/"),
        None => rel.to_string(),
    };

    decoded
        .strip_prefix("A/")
        .unwrap_or(&decoded)
        .to_string()
}

/// The stage-0 entry list: local paths in walk order.
pub struct EntryList {
    data_dir: PathBuf,
    local_paths: Vec<String>,
}

impl EntryList {
    pub fn len(&self) -> usize {
        self.local_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local_paths.is_empty()
    }

    pub fn local_path(&self, i: usize) -> &str {
        &self.local_paths[i]
    }

    pub fn name(&self, i: usize) -> String {
        logical_name(&self.data_dir, &self.local_paths[i])
    }
}

/// A stage-0 redirect, already resolved to an entry index.
pub struct Redirect {
    pub name: Vec<u16>,
    pub entry_idx: usize,
}

/// The stage-1 metadata: entry names and cumulative end offsets.
pub struct EntryMeta {
    names: Vec<Vec<u16>>,
    end_offsets: Vec<u64>,
}

impl EntryMeta {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, i: usize) -> &[u16] {
        &self.names[i]
    }

    /// Start offset of entry `i` in the packed region: the previous entry's
    /// end offset, or 0 for the first entry.
    pub fn start_offset(&self, i: usize) -> u64 {
        if i == 0 {
            0
        } else {
            self.end_offsets[i - 1]
        }
    }
}

// ============================================================================
// WRITERS
// ============================================================================

pub fn write_entries(data_dir: &Path, local_paths: &[String]) -> Result<()> {
    let path = data_dir.join(ENTRIES_FILE);
    let mut w = BufWriter::with_capacity(WRITE_BUF, File::create(&path)?);

    writeln!(w, "{}", local_paths.len())?;
    for p in local_paths {
        writeln!(w, "{}", p)?;
    }

    w.flush()?;
    Ok(())
}

pub fn write_redirects(data_dir: &Path, redirects: &[(String, usize)]) -> Result<()> {
    let path = data_dir.join(REDIRECTS_FILE);
    let mut w = BufWriter::with_capacity(WRITE_BUF, File::create(&path)?);

    writeln!(w, "{}", redirects.len())?;
    for (name, entry_idx) in redirects {
        writeln!(w, "{}\t{}", name, entry_idx)?;
    }

    w.flush()?;
    Ok(())
}

pub fn write_entry_meta(data_dir: &Path, names: &[String], end_offsets: &[u64]) -> Result<()> {
    let path = data_dir.join(ENTRY_META_FILE);
    let mut w = BufWriter::with_capacity(WRITE_BUF, File::create(&path)?);

    writeln!(w, "{}", names.len())?;
    for name in names {
        writeln!(w, "{}", name)?;
    }
    for off in end_offsets {
        writeln!(w, "{}", off)?;
    }

    w.flush()?;
    Ok(())
}

// ============================================================================
// READERS
// ============================================================================

pub fn read_entries(data_dir: &Path) -> Result<EntryList> {
    let path = data_dir.join(ENTRIES_FILE);
    let mut r = open_reader(&path)?;

    let count = read_count(&mut r, &path)?;
    let mut local_paths = Vec::with_capacity(count);
    for _ in 0..count {
        local_paths.push(read_line(&mut r, &path)?);
    }

    Ok(EntryList {
        data_dir: data_dir.to_path_buf(),
        local_paths,
    })
}

pub fn read_redirects(data_dir: &Path) -> Result<Vec<Redirect>> {
    let path = data_dir.join(REDIRECTS_FILE);
    let mut r = open_reader(&path)?;

    let count = read_count(&mut r, &path)?;
    let mut redirects = Vec::with_capacity(count);
    for _ in 0..count {
        let line = read_line(&mut r, &path)?;
        let (name, idx) = line
            .split_once('\t')
            .ok_or_else(|| malformed(&path, "missing tab separator"))?;
        let entry_idx: usize = idx
            .parse()
            .map_err(|_| malformed(&path, format!("bad entry index {:?}", idx)))?;

        redirects.push(Redirect {
            name: key::encode(name),
            entry_idx,
        });
    }

    Ok(redirects)
}

pub fn read_entry_meta(data_dir: &Path) -> Result<EntryMeta> {
    let path = data_dir.join(ENTRY_META_FILE);
    let mut r = open_reader(&path)?;

    let count = read_count(&mut r, &path)?;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(key::encode(&read_line(&mut r, &path)?));
    }

    let mut end_offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let line = read_line(&mut r, &path)?;
        let off: u64 = line
            .parse()
            .map_err(|_| malformed(&path, format!("bad end offset {:?}", line)))?;
        end_offsets.push(off);
    }

    Ok(EntryMeta { names, end_offsets })
}

fn open_reader(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::with_capacity(READ_BUF, File::open(path)?))
}

fn read_line(r: &mut BufReader<File>, path: &Path) -> Result<String> {
    let mut line = String::new();
    let n = r.read_line(&mut line)?;
    if n == 0 || !line.ends_with('\n') {
        return Err(malformed(path, "truncated"));
    }
    line.pop();
    Ok(line)
}

fn read_count(r: &mut BufReader<File>, path: &Path) -> Result<usize> {
    let line = read_line(r, path)?;
    line.parse()
        .map_err(|_| malformed(path, format!("bad count {:?}", line)))
}

fn malformed(path: &Path, reason: impl Into<String>) -> ArchiveError {
    ArchiveError::MalformedStageFile {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
