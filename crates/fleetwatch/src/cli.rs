//! Clap derive structures for the `fleetwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetwatch -- live seat capacity and booking status for fleet trips
#[derive(Debug, Parser)]
#[command(
    name = "fleetwatch",
    version,
    about = "Watch live trip snapshots from the fleet backend",
    long_about = "Fetches trip capacity and per-location booking status over GraphQL,\n\
        and follows live updates over a graphql-ws subscription with\n\
        bounded exponential-backoff reconnection.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "FLEETWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "FLEETWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// GraphQL endpoint URL (overrides profile)
    #[arg(long, short = 'u', env = "FLEETWATCH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token (overrides profile credentials)
    #[arg(long, env = "FLEETWATCH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FLEETWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "FLEETWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain tab-separated counters (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the current snapshot of a trip once
    #[command(alias = "get")]
    Snapshot(SnapshotArgs),

    /// Follow live snapshot updates for a trip
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Inspect the CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Trip identifier
    pub trip_id: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Trip identifier
    pub trip_id: String,

    /// Reconnection attempts before giving up (overrides profile)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// First reconnect delay in milliseconds (overrides profile)
    #[arg(long)]
    pub base_delay_ms: Option<u64>,

    /// Reconnect delay ceiling in milliseconds (overrides profile)
    #[arg(long)]
    pub max_delay_ms: Option<u64>,

    /// Exit after printing this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the configuration with secrets masked
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
