// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Stage 0: walk the dump, split it into entries and redirects.
//!
//! The dump has two shapes of input. The `A/` subtree holds one file per
//! page at its natural path. The flat `_exceptions/` directory holds pages
//! whose paths could not be materialized on the dumping filesystem; their
//! full logical path is URL-escaped into the filename (`%2f` per `/`).
//!
//! Classification is by size: anything under 1 KiB must be a refresh stub
//! and anything at or over it is a real page. That sounds crude but is how
//! the dump is produced; a small file without a refresh marker means the
//! dump is corrupt, and the scan fails loudly on it.
//!
//! Names longer than 127 UTF-16 code units cannot be indexed and are
//! silently dropped, as are redirects whose resolved target is not an
//! entry. Both filters lose only what the archive could never serve.

pub mod redirect;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::Result;
use crate::key;
use crate::stage;
use redirect::Stream;

/// Files smaller than this are treated as redirect stub candidates.
const REDIRECT_MAX_SIZE: u64 = 1024;

/// What stage 0 leaves behind, summarized for the caller.
pub struct ScanSummary {
    pub entries: usize,
    pub redirects: usize,
}

struct RawRedirect {
    name: String,
    target: String,
}

/// Walk the dump under `data_dir` and write the stage-0 entry and redirect
/// lists next to it.
pub fn run_scan(data_dir: &Path) -> Result<ScanSummary> {
    let (entries, redirects) = scan_dump(data_dir)?;

    stage::write_entries(data_dir, &entries)?;
    stage::write_redirects(data_dir, &redirects)?;

    Ok(ScanSummary {
        entries: entries.len(),
        redirects: redirects.len(),
    })
}

/// Scan without writing stage files: returns entry local paths in walk
/// order and `(source_name, entry_index)` pairs for resolved redirects.
pub fn scan_dump(data_dir: &Path) -> Result<(Vec<String>, Vec<(String, usize)>)> {
    let mut entries: Vec<String> = Vec::new();
    let mut entry_ids: HashMap<String, usize> = HashMap::new();
    let mut raw: Vec<RawRedirect> = Vec::new();

    let articles_root = data_dir.join("A");
    walk_articles(&articles_root, &articles_root, &mut entries, &mut entry_ids, &mut raw)?;
    scan_exceptions(data_dir, &mut entries, &mut entry_ids, &mut raw)?;

    let redirects = raw
        .into_iter()
        .filter_map(|r| entry_ids.get(&r.target).map(|&idx| (r.name, idx)))
        .collect();

    Ok((entries, redirects))
}

/// Recursive walk of the `A/` subtree in lexical order.
fn walk_articles(
    root: &Path,
    dir: &Path,
    entries: &mut Vec<String>,
    entry_ids: &mut HashMap<String, usize>,
    raw: &mut Vec<RawRedirect>,
) -> Result<()> {
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    children.sort_by_key(|c| c.file_name());

    for child in children {
        let path = child.path();
        if child.file_type()?.is_dir() {
            walk_articles(root, &path, entries, entry_ids, raw)?;
            continue;
        }

        let name = path
            .strip_prefix(root)
            .expect("walk stays under root")
            .to_string_lossy()
            .into_owned();

        if name.encode_utf16().count() > key::MAX_KEY_UNITS {
            continue;
        }

        if child.metadata()?.len() < REDIRECT_MAX_SIZE {
            let raw_target = redirect::extract_target(&path)?;
            let target = redirect::normalize_target(Stream::Articles, &name, &raw_target);
            raw.push(RawRedirect { name, target });
            continue;
        }

        entry_ids.insert(name, entries.len());
        entries.push(local_path_string(&path)?);
    }

    Ok(())
}

/// Flat scan of `_exceptions/`. Filenames starting with `X` are skipped.
fn scan_exceptions(
    data_dir: &Path,
    entries: &mut Vec<String>,
    entry_ids: &mut HashMap<String, usize>,
    raw: &mut Vec<RawRedirect>,
) -> Result<()> {
    let dir = data_dir.join("_exceptions");

    let mut children: Vec<_> = fs::read_dir(&dir)?.collect::<io::Result<_>>()?;
    children.sort_by_key(|c| c.file_name());

    for child in children {
        let file_name = child.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('X') {
            continue;
        }

        let decoded = file_name.replace("%2f", "/");
        let name = decoded.strip_prefix("A/").unwrap_or(&decoded).to_string();

        if name.encode_utf16().count() > key::MAX_KEY_UNITS {
            continue;
        }

        let path = child.path();
        if child.metadata()?.len() < REDIRECT_MAX_SIZE {
            let raw_target = redirect::extract_target(&path)?;
            let target = redirect::normalize_target(Stream::Exceptions, &name, &raw_target);
            raw.push(RawRedirect { name, target });
            continue;
        }

        entry_ids.insert(name, entries.len());
        entries.push(local_path_string(&path)?);
    }

    Ok(())
}

fn local_path_string(path: &Path) -> Result<String> {
    match path.to_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("non-UTF-8 path in dump: {}", path.display()),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::File::create(path).unwrap().write_all(content).unwrap();
    }

    fn page() -> Vec<u8> {
        let mut body = b"<html><body>page</body></html>".to_vec();
        body.resize(REDIRECT_MAX_SIZE as usize, b' ');
        body
    }

    fn stub(target: &str) -> Vec<u8> {
        format!(
            "<html><head><meta http-equiv=\"refresh\" content=\"0;url={}\"></head></html>",
            target
        )
        .into_bytes()
    }

    #[test]
    fn classifies_by_size_and_resolves_redirects() {
        let dump = tempfile::tempdir().unwrap();
        write_file(&dump.path().join("A/banana"), &page());
        write_file(&dump.path().join("A/ban"), &stub("banana"));
        fs::create_dir_all(dump.path().join("_exceptions")).unwrap();

        let (entries, redirects) = scan_dump(dump.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("A/banana"));
        assert_eq!(redirects, vec![("ban".to_string(), 0)]);
    }

    #[test]
    fn unresolved_redirects_are_dropped() {
        let dump = tempfile::tempdir().unwrap();
        write_file(&dump.path().join("A/real"), &page());
        write_file(&dump.path().join("A/dangling"), &stub("no-such-page"));
        fs::create_dir_all(dump.path().join("_exceptions")).unwrap();

        let (entries, redirects) = scan_dump(dump.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(redirects.is_empty());
    }

    #[test]
    fn oversized_names_are_skipped() {
        let dump = tempfile::tempdir().unwrap();
        let long = "x".repeat(key::MAX_KEY_UNITS + 1);
        write_file(&dump.path().join("A").join(&long), &page());
        write_file(&dump.path().join("A/kept"), &page());
        fs::create_dir_all(dump.path().join("_exceptions")).unwrap();

        let (entries, _) = scan_dump(dump.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("A/kept"));
    }

    #[test]
    fn exceptions_are_unescaped_and_x_files_skipped() {
        let dump = tempfile::tempdir().unwrap();
        fs::create_dir_all(dump.path().join("A")).unwrap();
        write_file(&dump.path().join("_exceptions/A%2fQ%2fr"), &page());
        write_file(&dump.path().join("_exceptions/Xignored"), &page());

        let (entries, _) = scan_dump(dump.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("_exceptions/A%2fQ%2fr"));

        // The logical name comes out of the stage layer.
        let written = stage::logical_name(dump.path(), &entries[0]);
        assert_eq!(written, "Q/r");
    }

    #[test]
    fn walk_order_is_lexical() {
        let dump = tempfile::tempdir().unwrap();
        write_file(&dump.path().join("A/b"), &page());
        write_file(&dump.path().join("A/a/nested"), &page());
        write_file(&dump.path().join("A/c"), &page());
        fs::create_dir_all(dump.path().join("_exceptions")).unwrap();

        let (entries, _) = scan_dump(dump.path()).unwrap();
        let names: Vec<String> = entries
            .iter()
            .map(|p| stage::logical_name(dump.path(), p))
            .collect();
        assert_eq!(names, vec!["a/nested", "b", "c"]);
    }
}
