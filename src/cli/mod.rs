//! Command-line surface over the core library: thin argument parsing and
//! dispatch, no business logic beyond wiring flags to library calls.

pub mod tracing_init;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "depweave", version, about = "Dependency-aware API test orchestration")]
pub struct Cli {
    /// Print errors as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse, validate, and persist an `OpenAPI` document (C2).
    Ingest {
        /// Name of the project to ingest into (created if it doesn't exist).
        project: String,
        /// Local path or URL to the `OpenAPI` document.
        source: String,
    },
    /// Run deterministic + LLM-assisted dependency analysis (C4/C5).
    Analyze {
        project: String,
        /// Ollama-compatible model name for the LLM analyzer.
        #[arg(long, default_value = "llama3")]
        model: String,
        /// Ollama-compatible chat endpoint.
        #[arg(long, default_value = "http://localhost:11434/api/chat")]
        llm_url: String,
    },
    /// Review pending dependency candidates and confirm or reject each one (C6).
    Promote {
        project: String,
        /// Confirm every candidate without prompting.
        #[arg(long)]
        yes: bool,
    },
    /// Execute the confirmed dependency graph against a live environment (C7/C8).
    Run {
        project: String,
        /// Overrides the ingested spec's default server URL.
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Print a run's pass/fail summary (C9).
    Report {
        run_id: String,
    },
}
