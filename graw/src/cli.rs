//! # CLI
//!
//! This module defines the command-line interface of `graw` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`);
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "graw", version, about = "Raw gRPC calls and reflection discovery")]
pub struct Cli {
    /// The server address to connect to (e.g. localhost:50051 or http://localhost:50051)
    pub address: String,

    /// Abandon the whole command after this many seconds
    #[arg(long, global = true, value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Give up connecting after this many seconds
    #[arg(long, global = true, value_parser = parse_seconds)]
    pub connect_timeout: Option<Duration>,

    /// Log debug information to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Speak `grpc.reflection.v1` instead of `grpc.reflection.v1alpha` for `services` and `reflect`
    #[arg(long, global = true)]
    pub v1: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call a method with an already encoded request message
    ///
    /// The request bytes are read from `--data` (or stdin) and the response bytes are
    /// written to stdout untouched.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// graw localhost:50051 call /my.pkg.Service/Method --data request.bin > response.bin
    /// ```
    Call {
        /// Method path (/package.Service/Method)
        #[arg(value_parser = parse_method_path)]
        method_path: String,

        /// File holding the encoded request message. Reads stdin when absent.
        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// List the services exposed through server reflection
    Services,

    /// Discover every service and fetch its schema through server reflection
    Reflect {
        /// Directory to write each schema fragment to, as `schema-<index>.bin`
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

// A path without its leading slash (`pkg.Service/Method`) is accepted as well.
fn parse_method_path(value: &str) -> Result<String, String> {
    let value = value.trim();

    if value.trim_start_matches('/').is_empty() {
        return Err("Method path cannot be empty".to_string());
    }

    if value.starts_with('/') {
        Ok(value.to_string())
    } else {
        Ok(format!("/{value}"))
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|e| format!("Invalid number of seconds '{value}': {e}"))?;

    Duration::try_from_secs_f64(seconds).map_err(|e| format!("Invalid duration '{value}': {e}"))
}
