//! # Graw CLI Entry Point
//!
//! The main executable for the Graw tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and sets up logging.
//! 2. **Execution**: Delegates the request to the `Invoker` or the `ReflectionClient` of `graw_core`.
//! 3. **Presentation**: Writes raw response bytes to standard output, or formats the discovery
//!    results and errors for the terminal.

mod cli;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands};
use formatter::{FormattedString, GenericError, ReflectionSummary, ServiceList};
use graw_core::{
    CallContext, ConnectOptions, InvokeRequest, Invoker, ReflectionClient, ReflectionVersion,
};
use std::path::{Path, PathBuf};
use std::process;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    init_tracing(args.verbose);

    let options = ConnectOptions {
        connect_timeout: args.connect_timeout,
        timeout: args.timeout,
    };

    let ctx = match args.timeout {
        Some(timeout) => CallContext::new().with_timeout(timeout),
        None => CallContext::new(),
    };

    let version = if args.v1 {
        ReflectionVersion::V1
    } else {
        ReflectionVersion::V1Alpha
    };

    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupted, cancelling");
            token.cancel();
        }
    });

    match args.command {
        Commands::Call {
            method_path,
            data,
            headers,
        } => run_call(&ctx, options, &args.address, method_path, data, headers).await,
        Commands::Services => list_services(&ctx, options, &args.address, version).await,
        Commands::Reflect { out } => reflect(&ctx, options, &args.address, version, out).await,
    }
}

/// Logs go to stderr so they never mix with the raw bytes written to stdout.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// Used when `RUST_LOG` is not set.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("graw={level},graw_core={level}")
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}

async fn read_payload(data: Option<PathBuf>) -> std::io::Result<Vec<u8>> {
    match data {
        Some(path) => tokio::fs::read(path).await,
        None => {
            let mut payload = Vec::new();
            tokio::io::stdin().read_to_end(&mut payload).await?;
            Ok(payload)
        }
    }
}

async fn run_call(
    ctx: &CallContext,
    options: ConnectOptions,
    address: &str,
    method_path: String,
    data: Option<PathBuf>,
    headers: Vec<(String, String)>,
) {
    let payload = match read_payload(data).await {
        Ok(payload) => payload,
        Err(err) => exit_with(GenericError("Failed to read the request payload", err)),
    };

    let request = headers
        .into_iter()
        .fold(InvokeRequest::new(method_path, payload), |request, (k, v)| {
            request.header(k, v)
        });

    let response = match Invoker::with_options(options)
        .invoke_request(ctx, address, request)
        .await
    {
        Ok(response) => response,
        Err(err) => exit_with(err),
    };

    let mut stdout = tokio::io::stdout();
    if let Err(err) = stdout.write_all(&response).await {
        exit_with(GenericError("Failed to write the response", err));
    }
    if let Err(err) = stdout.flush().await {
        exit_with(GenericError("Failed to write the response", err));
    }
}

async fn list_services(
    ctx: &CallContext,
    options: ConnectOptions,
    address: &str,
    version: ReflectionVersion,
) {
    match ReflectionClient::with_options(options)
        .version(version)
        .list_services(ctx, address)
        .await
    {
        Ok(services) => println!("{}", FormattedString::from(ServiceList(services))),
        Err(err) => exit_with(err),
    }
}

async fn reflect(
    ctx: &CallContext,
    options: ConnectOptions,
    address: &str,
    version: ReflectionVersion,
    out: Option<PathBuf>,
) {
    let result = match ReflectionClient::with_options(options)
        .version(version)
        .get_reflection(ctx, address)
        .await
    {
        Ok(result) => result,
        Err(err) => exit_with(err),
    };

    if let Some(dir) = &out
        && let Err(err) = write_schemas(dir, &result.schemas).await
    {
        exit_with(GenericError("Failed to write the schemas", err));
    }

    println!(
        "{}",
        FormattedString::from(ReflectionSummary(&result, out.as_deref()))
    );
}

async fn write_schemas(dir: &Path, schemas: &[graw_core::bytes::Bytes]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    for (index, schema) in schemas.iter().enumerate() {
        let path = dir.join(format!("schema-{index}.bin"));
        tokio::fs::write(&path, schema).await?;
        tracing::debug!(path = %path.display(), bytes = schema.len(), "schema written");
    }

    Ok(())
}
