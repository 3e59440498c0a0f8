//! CLI command definitions for the `tovalley` binary.
//!
//! Uses clap derive macros for argument parsing. Every global option can
//! also be supplied through its `TOVALLEY_*` environment variable.

pub mod member;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tovalley_core::event::bus::DEFAULT_CAPACITY;

/// Two-party chat server with presence-aware read tracking.
#[derive(Parser)]
#[command(name = "tovalley", version, about, long_about = None)]
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

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory (defaults to ~/.tovalley).
    #[arg(long, global = true, env = "TOVALLEY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// SQLite database URL (defaults to tovalley.db inside the data directory).
    #[arg(long, global = true, env = "TOVALLEY_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum notification dispatches in flight.
    #[arg(
        long,
        global = true,
        env = "TOVALLEY_NOTIFICATION_CONCURRENCY",
        default_value_t = 64
    )]
    pub notification_concurrency: usize,

    /// Buffered events per event-bus channel.
    #[arg(long, global = true, env = "TOVALLEY_BUS_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub bus_capacity: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST and WebSocket API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Manage the member directory.
    Member {
        #[command(subcommand)]
        action: member::MemberCommand,
    },
}
