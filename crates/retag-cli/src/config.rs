//! Retag CLI - argument parsing for the `retag` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use retag_core::{GenerationConfig, HttpConfig};

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "retag")]
#[command(
    author,
    version,
    about = "Regenerate AI tags for bookmarked resources in bulk"
)]
#[command(after_help = "Examples:
  retag import bookmarks.jsonl
  retag regenerate --batch-size 10
  retag regenerate --preview
  retag retry --max-retries 5
  retag failures

Any OpenAI-compatible endpoint works, e.g. a local server:
  RETAG_ENDPOINT=http://localhost:11434/v1/chat/completions RETAG_MODEL=llama3.1 retag regenerate")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value = "5")]
    pub db_max_connections: u32,

    /// API key for the chat completions endpoint (optional for local servers)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat model used for tag generation
    #[arg(long, env = "RETAG_MODEL", default_value = retag_client::openai::DEFAULT_MODEL)]
    pub model: String,

    /// Chat completions URL (defaults to the OpenAI API)
    #[arg(long, env = "RETAG_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "RETAG_TIMEOUT_SECS", default_value = "60")]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            ..HttpConfig::default()
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Regenerate tags for every resource
    Regenerate {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Regenerate tags only for resources that failed before
    #[command(after_help = "Resources whose failure count reached --max-retries are skipped.")]
    Retry {
        #[command(flatten)]
        run: RunArgs,
    },
    /// List recorded failures
    Failures {
        /// Delete all failure records instead of listing them
        #[arg(long)]
        clear: bool,
    },
    /// Import resources from a JSON Lines file of {"id", "title", "url"} objects
    #[command(after_help = "Example line: {\"id\":\"42\",\"title\":\"Tokio\",\"url\":\"https://tokio.rs\"}")]
    Import {
        /// Path to the .jsonl file
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

/// Options shared by regenerate and retry. Unset flags fall back to
/// `RETAG_*` environment variables, then to built-in defaults.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Items generated concurrently per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Pause between batches in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Failure count at which a resource is no longer retried
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Generate and log tags without saving anything
    #[arg(long)]
    pub preview: bool,
}

impl RunArgs {
    /// Applies explicit flags on top of `base`.
    pub fn apply(&self, base: GenerationConfig) -> GenerationConfig {
        let mut config = base;
        if let Some(size) = self.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(ms) = self.delay_ms {
            config = config.with_delay_between_batches(Duration::from_millis(ms));
        }
        if let Some(max) = self.max_retries {
            config = config.with_max_retries(max);
        }
        if self.preview {
            config = config.with_preview_mode(true);
        }
        config
    }
}
