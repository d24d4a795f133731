//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AMRUT: field-data reconciliation for survey archives
#[derive(Parser)]
#[command(name = "amrut")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show an archive's metadata, layers, and QC progress
    Inspect {
        /// Path to the .amrut archive
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify differences between an archive layer and its
    /// authoritative GeoJSON
    Diff {
        /// Path to the .amrut archive
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Layer to compare
        #[arg(short, long)]
        layer: String,

        /// Path to the authoritative GeoJSON file
        #[arg(short, long, value_name = "GEOJSON")]
        authoritative: PathBuf,

        /// Treat coordinates as planar map units instead of degrees
        #[arg(long)]
        projected: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a review session over one layer and commit the verdicts
    Review {
        /// Path to the .amrut archive
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Layer to review
        #[arg(short, long)]
        layer: String,

        /// Path to the authoritative GeoJSON file
        #[arg(short, long, value_name = "GEOJSON")]
        authoritative: PathBuf,

        /// JSON decision script (accept/reject/resurvey per feature id)
        #[arg(short, long, conflicts_with_all = ["accept_all", "reject_all"])]
        script: Option<PathBuf>,

        /// Accept every surveyed change
        #[arg(long, conflicts_with = "reject_all")]
        accept_all: bool,

        /// Reject every surveyed change
        #[arg(long)]
        reject_all: bool,

        /// Treat coordinates as planar map units instead of degrees
        #[arg(long)]
        projected: bool,

        /// Review without committing to the archive
        #[arg(long)]
        dry_run: bool,
    },
}
