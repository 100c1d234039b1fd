//! CLI definitions for AutoPromptr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// AutoPromptr CLI.
#[derive(Parser)]
#[command(name = "autopromptr")]
#[command(about = "Durable sequential prompt-batch execution engine")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    /// Control surface URL for client commands (overrides client.base_url)
    #[arg(long, env = "AUTOPROMPTR_URL", global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the batch processor and control surface in foreground (default)
    Run {
        /// Server host (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands sent to a running control surface.
#[derive(Subcommand)]
pub(crate) enum ClientCommand {
    /// Queue a batch of prompts
    Queue {
        /// Batch id (generated by the server when omitted)
        #[arg(long)]
        batch_id: Option<String>,

        /// Project URL the prompts are typed into
        #[arg(long)]
        target_url: String,

        /// Target platform (e.g. lovable, bolt)
        #[arg(long)]
        platform: String,

        /// Prompt text, repeatable
        #[arg(short, long = "prompt")]
        prompts: Vec<String>,

        /// File with one prompt per non-empty line
        #[arg(long)]
        prompts_file: Option<PathBuf>,

        /// Follow progress until the batch finishes
        #[arg(long)]
        watch: bool,
    },

    /// Show the state of a batch
    Status {
        /// Batch id
        batch_id: String,
    },

    /// Stop a pending or processing batch
    Stop {
        /// Batch id
        batch_id: String,
    },

    /// List pending and processing batches
    Active,

    /// Reset a finished batch to pending
    Rewind {
        /// Batch id
        batch_id: String,
    },

    /// Start a pending or interrupted batch
    Resume {
        /// Batch id
        batch_id: String,
    },

    /// Poll a batch until it finishes
    Watch {
        /// Batch id
        batch_id: String,
    },

    /// Check that the control surface is up
    Health,
}
