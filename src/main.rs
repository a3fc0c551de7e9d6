// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! wikivault CLI: build, inspect, search, and serve wiki archives.
//!
//! ```bash
//! # Three build stages, resumable at each boundary
//! wikivault scan ./dump
//! wikivault compress ./dump
//! wikivault pack ./dump wiki.wv
//!
//! # Read side
//! wikivault search wiki.wv "Tokyo"
//! wikivault serve wiki.wv --port 9454
//! ```

use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::Parser;

use wikivault::archive::{self, Archive};
use wikivault::{compress, scan, serve, Result};

mod cli;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan { data_dir } => run_scan(&data_dir),
        Commands::Compress { data_dir } => run_compress(&data_dir),
        Commands::Pack { data_dir, output } => run_pack(&data_dir, &output),
        Commands::Serve { archive, port } => serve::run(&archive, port),
        Commands::Search {
            archive,
            query,
            limit,
        } => run_search(&archive, &query, limit),
        Commands::Inspect { archive } => run_inspect(&archive),
    };

    if let Err(e) = result {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

fn run_scan(data_dir: &Path) -> Result<()> {
    let started = Instant::now();
    let summary = scan::run_scan(data_dir)?;

    eprintln!(
        "✅ Scanned {} entries │ {} redirects │ {:.1}s",
        summary.entries,
        summary.redirects,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_compress(data_dir: &Path) -> Result<()> {
    let started = Instant::now();
    compress::run_compress(data_dir)?;

    eprintln!("✅ Compressed in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn run_pack(data_dir: &Path, output: &Path) -> Result<()> {
    let started = Instant::now();
    archive::build_archive(data_dir, output)?;

    let size = fs::metadata(output)?.len();
    eprintln!(
        "✅ Packed {} │ {} │ {:.1}s",
        output.display(),
        format_size(size),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_search(path: &Path, query: &str, limit: usize) -> Result<()> {
    let mut archive = Archive::open(path)?;

    let started = Instant::now();
    let hits = archive.search(query, limit)?;
    let elapsed = started.elapsed();

    if hits.is_empty() {
        println!("no matches for {:?}", query);
        return Ok(());
    }

    for hit in &hits {
        println!("{:>12}  {}", hit.offset, hit.key);
    }
    eprintln!("{} matches in {} µs", hits.len(), elapsed.as_micros());
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let archive = Archive::open(path)?;
    let total = fs::metadata(path)?.len();

    let index = archive.index_size();
    let payload = total - index;
    let first_rows = archive.first_level_len();
    let second = archive.second_level_size();

    println!("{}", path.display());
    println!("  total size          {}", format_size(total));
    println!(
        "  packed entries      {} ({:.1}%)",
        format_size(payload),
        payload as f64 / total as f64 * 100.0
    );
    println!("  second-level index  {}", format_size(second));
    println!(
        "  first-level index   {} rows ({})",
        first_rows,
        format_size(index - second)
    );
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
