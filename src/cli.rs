//! Command-line interface.
//!
//! No HTTP server lives in this crate — it is a middleware core a transport
//! adapter embeds. This CLI exists to validate configuration and exercise
//! the RBAC/policy engines offline, the way an operator would sanity-check
//! a YAML file before wiring it into a running service.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// authguard — authentication, authorization, and request-defense
/// middleware core.
#[derive(Parser, Debug)]
#[command(name = "authguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML).
    #[arg(short, long, env = "AUTHGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "AUTHGUARD_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json).
    #[arg(long, env = "AUTHGUARD_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Offline operations available against a loaded configuration.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the configuration file, reporting any error.
    Validate,
    /// Resolve and print the permission closure for a role ID.
    ResolveRole {
        /// Role ID to resolve.
        role: String,
    },
    /// Evaluate a resource/action check against a comma-separated role list,
    /// printing the RBAC and policy decision.
    CheckAccess {
        /// Comma-separated role IDs.
        #[arg(long)]
        roles: String,
        /// Resource pattern to check.
        #[arg(long)]
        resource: String,
        /// Action pattern to check.
        #[arg(long)]
        action: String,
    },
}
