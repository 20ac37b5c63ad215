//! Command-line interface for llm-failover

use clap::{Parser, Subcommand};

/// Primary/fallback failover for OpenAI-compatible LLM endpoints
#[derive(Parser)]
#[command(name = "llm-failover")]
#[command(version)]
#[command(about = "Primary/fallback failover for OpenAI-compatible LLM endpoints")]
#[command(
    long_about = "llm-failover sends each request to a primary LLM endpoint and, when the \
    primary fails with a retryable error, transparently retries it once against a fallback \
    endpoint. Configuration is read from a TOML file or, without --config, from environment \
    variables (PRIMARY_BASE_URL, PRIMARY_API_KEY, FALLBACK_BASE_URL, ...)."
)]
pub struct Cli {
    /// Path to configuration file (environment variables are used if omitted)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP dispatch server (default)
    Serve,

    /// Send a single prompt through the failover controller
    Ask {
        /// Prompt to send
        prompt: String,

        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# llm-failover Configuration
# ==========================
#
# Every request goes to [primary] first. When the primary fails with a
# retryable error, the request is retried exactly once against [fallback].
#
# Equivalent environment variables (used when --config is not given):
#   PRIMARY_BASE_URL, PRIMARY_API_KEY, PRIMARY_MODEL,
#   FALLBACK_BASE_URL, FALLBACK_API_KEY, FALLBACK_MODEL,
#   MAX_FAILOVER_ATTEMPTS, REQUEST_TIMEOUT_SECONDS,
#   SERVER_HOST, SERVER_PORT, LOG_LEVEL

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "127.0.0.1"
port = 3000

[primary]
# OpenAI-compatible base URL; /chat/completions is appended
base_url = "https://api.openai.com/v1"
api_key = "sk-replace-me"
model = "gpt-4o-mini"

# Remove this section to disable failover
[fallback]
base_url = "https://fallback.example.com/v1"
api_key = "sk-replace-me-too"
model = "gpt-4o-mini"

[failover]
# 0 disables failover, 1 allows a single switch to the fallback
max_failover_attempts = 1

# Per-attempt timeout in seconds (1-300)
request_timeout_seconds = 30

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG overrides this. Transition events use the target llm_failover::events
log_level = "info"
"#
}
