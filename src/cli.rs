//! Command-line interface for rollcall
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Speaker identification for legislative committee recordings
#[derive(Parser, Debug)]
#[command(
    name = "rollcall",
    version,
    about = "Speaker identification for legislative committee recordings"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create profile shells for every roster entry
    Init,

    /// Show enrollment coverage across the roster
    Status,

    /// List enrolled legislators
    List,

    /// Show one legislator's profile in detail
    Show {
        /// Profile slug (e.g., gail_chasey)
        slug: String,
    },

    /// Search the roster by name fragment
    Search {
        /// Name fragment to match (case-insensitive)
        query: String,
    },

    /// List members of a committee
    Committee {
        /// Committee code (e.g., HJC, SFC)
        code: String,
    },

    /// Ingest diarization output for a meeting
    Ingest {
        /// Meeting identifier (e.g., hjc_2025_01_23)
        meeting_id: String,

        /// JSON file with diarized segments
        diarization: PathBuf,

        /// Reference to the meeting audio (path or URL)
        #[arg(long, value_name = "REF")]
        audio_ref: String,

        /// Committee code for the meeting
        #[arg(long, value_name = "CODE")]
        committee: Option<String>,

        /// Meeting date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: NaiveDate,
    },

    /// Assign a legislator to a diarized speaker, or skip one
    Label {
        /// Meeting identifier
        meeting_id: String,

        /// Diarized speaker label (e.g., SPEAKER_00)
        speaker: String,

        /// Profile slug to assign
        #[arg(long, value_name = "SLUG", conflicts_with = "skip")]
        entity: Option<String>,

        /// Mark this speaker as not enrollable (guest, staff, crosstalk)
        #[arg(long)]
        skip: bool,
    },

    /// Commit labeled meetings into the profile store
    Commit {
        /// Meeting identifiers to commit
        #[arg(required = true)]
        meeting_ids: Vec<String>,

        /// Number of worker threads
        #[arg(long, short = 'w', value_name = "N", default_value = "4")]
        workers: usize,
    },

    /// Identify a speaker from an embedding
    Identify {
        /// JSON file containing the embedding vector
        embedding: PathBuf,

        /// Committee context for candidate boosting
        #[arg(long, value_name = "CODE")]
        committee: Option<String>,

        /// Maximum candidates to print
        #[arg(long, short = 'n', value_name = "N", default_value = "5")]
        top: usize,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
