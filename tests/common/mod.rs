//! Shared test utilities and fixtures.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use wikivault::{archive, compress, scan, stage};

/// Smallest file size the scanner treats as a real page.
pub const PAGE_MIN_SIZE: usize = 1024;

/// Create an empty dump directory with the expected skeleton.
pub fn dump_dir() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dump");
    fs::create_dir_all(dir.path().join("A")).unwrap();
    fs::create_dir_all(dir.path().join("_exceptions")).unwrap();
    dir
}

/// Write a page under the dump. `rel` is relative to the dump root, e.g.
/// `A/apple` or `_exceptions/A%2fQ%2fr`. Content is padded past the
/// redirect-size threshold so the scanner classifies it as an entry.
pub fn write_page(dump: &Path, rel: &str, content: &str) {
    let mut body = content.as_bytes().to_vec();
    if body.len() < PAGE_MIN_SIZE {
        body.resize(PAGE_MIN_SIZE, b' ');
    }
    write_raw(dump, rel, &body);
}

/// Write a redirect stub pointing at `target`.
pub fn write_redirect(dump: &Path, rel: &str, target: &str) {
    let stub = format!(
        "<html><head><meta http-equiv=\"refresh\" content=\"0;url={}\"></head></html>",
        target
    );
    assert!(
        stub.len() < PAGE_MIN_SIZE,
        "stub must stay under the threshold"
    );
    write_raw(dump, rel, stub.as_bytes());
}

pub fn write_raw(dump: &Path, rel: &str, content: &[u8]) {
    let path = dump.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::File::create(&path).unwrap().write_all(content).unwrap();
}

/// Run all three build stages and return the archive path (inside the dump
/// directory, so its lifetime stays tied to the fixture).
pub fn build_archive(dump: &Path) -> PathBuf {
    scan::run_scan(dump).expect("scan failed");
    compress::run_compress(dump).expect("compress failed");

    let out = dump.join("wiki.wv");
    archive::build_archive(dump, &out).expect("pack failed");
    out
}

/// Build with exact (unpadded) page contents: bypasses the scanner's size
/// classification by writing the stage-0 lists directly. Redirects are
/// `(source_name, entry_index)` pairs.
pub fn build_archive_exact(
    dump: &Path,
    pages: &[(&str, &str)],
    redirects: &[(&str, usize)],
) -> PathBuf {
    let mut paths = Vec::new();
    for (rel, content) in pages {
        write_raw(dump, rel, content.as_bytes());
        paths.push(dump.join(rel).to_str().unwrap().to_string());
    }
    stage::write_entries(dump, &paths).unwrap();

    let owned: Vec<(String, usize)> = redirects
        .iter()
        .map(|(n, i)| (n.to_string(), *i))
        .collect();
    stage::write_redirects(dump, &owned).unwrap();

    compress::run_compress(dump).expect("compress failed");

    let out = dump.join("wiki.wv");
    archive::build_archive(dump, &out).expect("pack failed");
    out
}

/// Decode every second-level row of a finished archive:
/// `(shared_prefix_len, key_units, payload_offset)` per row.
pub fn decode_second_level(archive_path: &Path) -> Vec<(u8, Vec<u16>, u64)> {
    let bytes = fs::read(archive_path).unwrap();

    let first_size =
        u16::from_le_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]) as usize;
    let second_end = bytes.len() - first_size;
    let second_size =
        u32::from_le_bytes(bytes[second_end - 4..second_end].try_into().unwrap()) as usize;
    let second_start = second_end - second_size;

    let mut rows = Vec::new();
    let mut pos = second_start;
    let mut prev: Vec<u16> = Vec::new();
    while pos < second_end - 4 {
        let shared = bytes[pos] as usize;
        let rest = bytes[pos + 1] as usize;
        pos += 2;

        let mut key = prev[..shared].to_vec();
        for i in 0..rest {
            key.push(u16::from_le_bytes([
                bytes[pos + 2 * i],
                bytes[pos + 2 * i + 1],
            ]));
        }
        pos += rest * 2;

        let offset = bytes[pos..pos + 5]
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        pos += 5;

        rows.push((shared as u8, key.clone(), offset));
        prev = key;
    }

    rows
}
