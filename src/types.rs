//! Shared types for the timecaps application.
//!
//! This module holds the crate-wide `Result` alias and the CLI subcommand
//! definitions consumed by the binary.
use std::path::PathBuf;

use clap::Subcommand;

use crate::{CapsuleError, CapsuleId};

/// A specialized Result type for timecaps operations.
pub type Result<T> = std::result::Result<T, CapsuleError>;

/// Available subcommands for the timecaps application
#[derive(Subcommand)]
pub enum Commands {
    /// Seal a new capsule
    Create {
        /// Title of the capsule
        #[clap(short = 'T', long)]
        title: String,

        /// Message to seal inside the capsule
        #[clap(short, long)]
        message: Option<String>,

        /// Path to a file containing the capsule's message
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Calendar date (YYYY-MM-DD) after which the capsule may be opened
        #[clap(short, long)]
        opens: String,

        /// Mood tag for the capsule
        #[clap(long, value_parser = ["hopeful", "grateful", "excited", "nostalgic", "dreamy", "happy", "sad"], default_value = "hopeful")]
        mood: String,

        /// Color tag for the capsule
        #[clap(long, value_parser = ["blue", "pink", "green", "orange", "purple"], default_value = "blue")]
        color: String,
    },

    /// List capsules with their lifecycle state
    List {
        /// Fuzzy-filter capsules by title or message
        #[clap(short, long)]
        query: Option<String>,

        /// Limit the number of capsules returned
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,

        /// Only show capsule IDs, titles and states
        #[clap(short, long)]
        brief: bool,
    },

    /// View a capsule by ID
    View {
        /// ID of the capsule to view
        id: CapsuleId,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Open a capsule whose date has arrived
    Open {
        /// ID of the capsule to open
        id: CapsuleId,
    },

    /// Delete a capsule by ID
    Delete {
        /// ID of the capsule to delete
        id: CapsuleId,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Show the resolved configuration and selected backend
    Config,
}
