//! CLI command definitions for the `confab` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod models;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with configured LLM providers and serve the chat API.
#[derive(Parser)]
#[command(name = "confab", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter). Also enabled by `CONFAB_OTEL=1`.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the chosen verbosity. `RUST_LOG` still wins.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,confab=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `server.port` in config.toml).
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` in config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage model configurations.
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },

    /// Send one message and stream the reply to stdout.
    Ask {
        /// The message to send.
        message: String,

        /// Model config id (defaults to the app's model, then `chat.default_model_id`).
        #[arg(long, short)]
        model: Option<String>,

        /// App profile supplying model and system prompt.
        #[arg(long, short)]
        app: Option<String>,

        /// Continue an existing conversation.
        #[arg(long, short)]
        conversation: Option<String>,
    },

    /// Print a conversation's recent turns.
    History {
        conversation: String,
    },

    /// Delete every turn of a conversation.
    Clear {
        conversation: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ModelsCommand {
    /// List model configurations.
    #[command(alias = "ls")]
    List {
        /// Filter by type (CHAT, EMBEDDING, TEXT_IMAGE, WEB_SEARCH).
        #[arg(long = "type")]
        model_type: Option<String>,
    },

    /// Validate a config and report what it can do.
    Check {
        id: String,

        /// Also send a minimal live request.
        #[arg(long)]
        probe: bool,
    },

    /// Add a model configuration.
    Add {
        /// Provider tag, e.g. OPENAI, OLLAMA, Q_FAN.
        #[arg(long)]
        provider: String,

        /// Provider-side model name.
        #[arg(long)]
        model: String,

        /// Config id (generated when omitted).
        #[arg(long)]
        id: Option<String>,

        #[arg(long = "type", default_value = "CHAT")]
        model_type: String,

        #[arg(long)]
        base_url: Option<String>,

        /// API key (prompted for when the provider needs one).
        #[arg(long, env = "CONFAB_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long, hide_env_values = true)]
        secret_key: Option<String>,

        #[arg(long)]
        deployment: Option<String>,
    },

    /// Delete a model configuration.
    #[command(alias = "rm")]
    Remove { id: String },
}
