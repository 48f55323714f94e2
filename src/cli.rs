use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slidecast")]
#[command(author, version, about = "Turn documents into narrated slide videos")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the job queue worker
    Worker,

    /// Upload a document and create a pending job
    Submit {
        /// Document to convert
        #[arg(required = true)]
        file: PathBuf,

        /// Style preset: concise or detailed
        #[arg(long, default_value = "concise")]
        style: String,

        /// Avatar option: none, simple-graphic, or realistic
        #[arg(long, default_value = "none")]
        avatar: String,

        /// Override the detected input kind
        #[arg(long)]
        kind: Option<String>,

        /// Process the job immediately instead of leaving it queued
        #[arg(long)]
        now: bool,
    },

    /// Run the pipeline once for a pending job
    Run {
        /// Job ID
        #[arg(required = true)]
        job_id: String,
    },

    /// Reset a failed or stuck job to pending
    Retry {
        /// Job ID
        #[arg(required = true)]
        job_id: String,
    },

    /// Show a job's status and details
    Status {
        /// Job ID
        #[arg(required = true)]
        job_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}
