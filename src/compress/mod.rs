// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Stage 1: compress every entry and pack the results in order.
//!
//! Reading and deflating pages is embarrassingly parallel; the catch is
//! that the packed output is order-defining — entry `i`'s byte position is
//! the sum of entries `0..i` — so exactly one writer appends blobs in the
//! original entry order.
//!
//! The shape used here: a semaphore of `W` admission tokens bounds how many
//! entries are in flight, each entry gets a one-slot rendezvous channel,
//! workers compress and deliver on their channel, and the writer drains
//! channels `0, 1, 2, …` in order, returning a token per blob written.
//! Workers run on the rayon pool; the semaphore (not rayon's queue) is what
//! bounds memory, since a delivered-but-unwritten blob still holds a token.

pub mod pool;

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{ArchiveError, Result};
use crate::stage::{self, EntryList};
use pool::BufferPool;

/// Largest compressed entry the u24 length prefix can describe.
pub const MAX_COMPRESSED_SIZE: usize = (1 << 24) - 1;

/// Bytes of length prefix before each packed blob.
pub const LENGTH_PREFIX_SIZE: u64 = 3;

const WRITE_BUF: usize = 1024 * 1024;
const POOL_BUF_CAPACITY: usize = 64 * 1024;

/// A packed entry: its logical name and where its bytes end.
pub struct WrittenEntry {
    pub name: String,
    pub end_offset: u64,
}

/// Run stage 1 against a data directory: read the stage-0 entry list, write
/// the packed blob file and the entry-meta file.
pub fn run_compress(data_dir: &Path) -> Result<()> {
    let entries = stage::read_entries(data_dir)?;

    let progress = ProgressBar::new(entries.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:<12} [{bar:40.cyan/dim}] {pos}/{len} {msg}",
        )
        .unwrap()
        .progress_chars("━━╸"),
    );
    progress.set_prefix("Compressing");

    let packed = File::create(data_dir.join(stage::PACKED_FILE))?;
    let mut out = BufWriter::with_capacity(WRITE_BUF, packed);

    let written = compress_entries(&mut out, &entries, &progress)?;
    out.flush()?;

    progress.finish_with_message(format!("{} entries", written.len()));

    let names: Vec<String> = written.iter().map(|w| w.name.clone()).collect();
    let end_offsets: Vec<u64> = written.iter().map(|w| w.end_offset).collect();
    stage::write_entry_meta(data_dir, &names, &end_offsets)?;

    Ok(())
}

/// Compress all entries into `out`, in entry order, and return the packed
/// metadata. `progress` ticks once per written entry.
pub fn compress_entries<W: Write>(
    out: &mut W,
    entries: &EntryList,
    progress: &ProgressBar,
) -> Result<Vec<WrittenEntry>> {
    let width = rayon::current_num_threads();
    let pool = Arc::new(BufferPool::new(POOL_BUF_CAPACITY));

    // Admission tokens. Pre-filled to `width`; the writer returns one per
    // blob it retires, so at most `width` entries are in flight.
    let (token_tx, token_rx) = mpsc::sync_channel::<()>(width);
    for _ in 0..width {
        token_tx.send(()).expect("token channel sized to width");
    }

    // One rendezvous slot per entry keeps delivery addressed by index, so
    // the writer never has to reorder.
    let mut slots: Vec<Receiver<io::Result<Vec<u8>>>> = Vec::with_capacity(entries.len());
    let mut senders: Vec<SyncSender<io::Result<Vec<u8>>>> = Vec::with_capacity(entries.len());
    for _ in 0..entries.len() {
        let (tx, rx) = mpsc::sync_channel(1);
        senders.push(tx);
        slots.push(rx);
    }

    let paths: Vec<String> = (0..entries.len())
        .map(|i| entries.local_path(i).to_string())
        .collect();

    let producer_pool = Arc::clone(&pool);
    let producer = thread::spawn(move || {
        for (path, tx) in paths.into_iter().zip(senders) {
            // A recv error means the writer bailed out; stop dispatching.
            if token_rx.recv().is_err() {
                return;
            }

            let worker_pool = Arc::clone(&producer_pool);
            rayon::spawn(move || {
                // The writer may already be gone on error; the blob is then
                // simply dropped.
                let _ = tx.send(compress_one(&path, &worker_pool));
            });
        }
    });

    let result = write_in_order(out, entries, &slots, &token_tx, &pool, progress);

    // Unblock the producer if we are exiting early, then wait for it.
    drop(slots);
    drop(token_tx);
    let _ = producer.join();

    result
}

fn write_in_order<W: Write>(
    out: &mut W,
    entries: &EntryList,
    slots: &[Receiver<io::Result<Vec<u8>>>],
    token_tx: &SyncSender<()>,
    pool: &BufferPool,
    progress: &ProgressBar,
) -> Result<Vec<WrittenEntry>> {
    let mut written = Vec::with_capacity(entries.len());
    let mut end_offset: u64 = 0;

    for (i, slot) in slots.iter().enumerate() {
        let buf = slot
            .recv()
            .map_err(|_| {
                io::Error::other(format!(
                    "compression worker for {} disappeared",
                    entries.local_path(i)
                ))
            })??;
        let _ = token_tx.send(());

        if buf.len() > MAX_COMPRESSED_SIZE {
            return Err(ArchiveError::EntryTooLarge {
                size: buf.len() as u64,
            });
        }

        end_offset += buf.len() as u64 + LENGTH_PREFIX_SIZE;

        let size = (buf.len() as u32).to_le_bytes();
        out.write_all(&size[..3])?;
        out.write_all(&buf)?;
        pool.put(buf);

        written.push(WrittenEntry {
            name: entries.name(i),
            end_offset,
        });
        progress.inc(1);
    }

    Ok(written)
}

/// Read one page and deflate it, using pooled buffers for both sides.
fn compress_one(path: &str, pool: &BufferPool) -> io::Result<Vec<u8>> {
    let mut raw = pool.get();
    File::open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("failed to open {}: {}", path, e)))?
        .read_to_end(&mut raw)?;

    let mut encoder = ZlibEncoder::new(pool.get(), Compression::default());
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;

    pool.put(raw);
    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::fs;

    fn entry_list(dir: &Path, files: &[(&str, &[u8])]) -> EntryList {
        let mut paths = Vec::new();
        for (rel, content) in files {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            paths.push(path.to_str().unwrap().to_string());
        }
        stage::write_entries(dir, &paths).unwrap();
        stage::read_entries(dir).unwrap()
    }

    fn unpack(packed: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < packed.len() {
            let len =
                u32::from_le_bytes([packed[pos], packed[pos + 1], packed[pos + 2], 0]) as usize;
            pos += 3;
            let mut inflated = Vec::new();
            ZlibDecoder::new(&packed[pos..pos + len])
                .read_to_end(&mut inflated)
                .unwrap();
            out.push(inflated);
            pos += len;
        }
        out
    }

    #[test]
    fn packs_in_entry_order() {
        let dir = tempfile::tempdir().unwrap();
        let entries = entry_list(
            dir.path(),
            &[
                ("A/cherry", b"CHERRY".as_slice()),
                ("A/apple", b"APPLE".as_slice()),
                ("A/banana", b"BANANA".as_slice()),
            ],
        );

        let mut packed = Vec::new();
        let written =
            compress_entries(&mut packed, &entries, &ProgressBar::hidden()).unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(written[0].name, "cherry");
        assert_eq!(written[2].name, "banana");

        let inflated = unpack(&packed);
        assert_eq!(inflated, vec![b"CHERRY".to_vec(), b"APPLE".to_vec(), b"BANANA".to_vec()]);
    }

    #[test]
    fn end_offsets_are_cumulative() {
        let dir = tempfile::tempdir().unwrap();
        let entries = entry_list(
            dir.path(),
            &[("A/one", b"1111".as_slice()), ("A/two", b"2222".as_slice())],
        );

        let mut packed = Vec::new();
        let written =
            compress_entries(&mut packed, &entries, &ProgressBar::hidden()).unwrap();

        assert_eq!(written[1].end_offset, packed.len() as u64);
        assert!(written[0].end_offset < written[1].end_offset);
    }

    #[test]
    fn missing_entry_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("A/ghost");
        stage::write_entries(dir.path(), &[missing.to_str().unwrap().to_string()]).unwrap();
        let entries = stage::read_entries(dir.path()).unwrap();

        let mut packed = Vec::new();
        let err = compress_entries(&mut packed, &entries, &ProgressBar::hidden());
        assert!(err.is_err());
    }

    #[test]
    fn many_entries_stay_ordered_under_parallelism() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<(String, Vec<u8>)> = (0..200)
            .map(|i| {
                (
                    format!("A/p{:03}", i),
                    format!("content of page {}", i).into_bytes(),
                )
            })
            .collect();
        let borrowed: Vec<(&str, &[u8])> = files
            .iter()
            .map(|(n, c)| (n.as_str(), c.as_slice()))
            .collect();
        let entries = entry_list(dir.path(), &borrowed);

        let mut packed = Vec::new();
        let written =
            compress_entries(&mut packed, &entries, &ProgressBar::hidden()).unwrap();

        let inflated = unpack(&packed);
        assert_eq!(inflated.len(), 200);
        for (i, page) in inflated.iter().enumerate() {
            assert_eq!(page, format!("content of page {}", i).as_bytes());
        }
        assert_eq!(written.last().unwrap().end_offset, packed.len() as u64);
    }
}
