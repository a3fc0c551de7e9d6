// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for the wikivault command-line interface.
//!
//! The three build stages are separate subcommands (`scan`, `compress`,
//! `pack`) so a multi-hour build over a large dump can be resumed at a
//! stage boundary. `serve`, `search`, and `inspect` cover the read side.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wikivault",
    about = "Pack an offline wiki dump into a single searchable archive",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stage 0: index the dump into entry and redirect lists
    Scan {
        /// Directory containing the dumped wiki (A/ and _exceptions/)
        data_dir: PathBuf,
    },

    /// Stage 1: compress all entries into the packed blob file
    Compress {
        /// Directory containing the dump and the stage-0 files
        data_dir: PathBuf,
    },

    /// Stage 2: write the final archive from the stage files
    Pack {
        /// Directory containing the stage-0 and stage-1 files
        data_dir: PathBuf,

        /// Path of the archive to create
        output: PathBuf,
    },

    /// Serve an archive for browsing over HTTP
    Serve {
        /// Path to the archive file
        archive: PathBuf,

        /// Port to listen on (localhost only)
        #[arg(short, long, default_value = "9454")]
        port: u16,
    },

    /// Prefix-search an archive and print the matching keys
    Search {
        /// Path to the archive file
        archive: PathBuf,

        /// Key prefix to search for
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "32")]
        limit: usize,
    },

    /// Print an archive's index layout and statistics
    Inspect {
        /// Path to the archive file
        archive: PathBuf,
    },
}
