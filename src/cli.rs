//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fetch resources behind CERN single sign-on
#[derive(Parser, Debug)]
#[command(name = "cern-sso")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "CERN_SSO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "CERN_SSO_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "CERN_SSO_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a resource, logging in through SSO if needed
    Fetch(FetchArgs),

    /// Report whether a URI points at the SSO login endpoint
    CheckUri {
        /// URI to check (absolute or relative)
        #[arg(required = true)]
        uri: String,
    },
}

/// Arguments of `fetch`
#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// URL of the resource
    #[arg(required = true)]
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Client certificate (PEM); the key may be bundled or given with --key
    #[arg(long, conflicts_with = "username")]
    pub cert: Option<PathBuf>,

    /// Private key for --cert (PEM)
    #[arg(long, requires = "cert")]
    pub key: Option<PathBuf>,

    /// Username for the login form
    #[arg(short, long, requires = "password")]
    pub username: Option<String>,

    /// Password for the login form
    #[arg(long, env = "CERN_SSO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Write the body here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// User agent override
    #[arg(long)]
    pub user_agent: Option<String>,
}
