//! hookline CLI - sign, verify, send and receive webhooks from the shell.
//!
//! # Commands
//!
//! - `hookline sign` - Print the signature of a body
//! - `hookline verify` - Check a signature (exit 1 when invalid)
//! - `hookline listen` - Record and print incoming webhooks
//! - `hookline send` - Deliver one event to one endpoint (exit 2 when delivery failed)

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod error;
mod logging;

use commands::{listen, send, sign, verify};
use error::CliResult;

/// hookline - webhook signing and delivery tools
#[derive(Parser)]
#[command(name = "hookline")]
#[command(version)]
#[command(about = "Sign, verify, send and receive webhooks")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the hex HMAC-SHA256 signature of a body (stdin by default)
    Sign(SignArgs),

    /// Check a body against a signature
    Verify(VerifyArgs),

    /// Run a local receiver that prints each webhook as a JSON line
    #[command(visible_alias = "l")]
    Listen(ListenArgs),

    /// Register one subscription and trigger one event against it
    Send(SendArgs),
}

#[derive(Args)]
struct SignArgs {
    /// Subscription secret
    #[arg(short, long, env = "HOOKLINE_SECRET")]
    secret: String,

    /// Read the body from a file instead of stdin
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Subscription secret
    #[arg(short, long, env = "HOOKLINE_SECRET")]
    secret: String,

    /// Signature to check (the X-Webhook-Signature value)
    #[arg(long)]
    signature: String,

    /// Read the body from a file instead of stdin
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct ListenArgs {
    /// Port to listen on (0 picks a free port)
    #[arg(short, long, default_value = "8787")]
    port: u16,

    /// Status code returned to every request
    #[arg(long, default_value = "200")]
    status: u16,

    /// Verify signatures with this secret
    #[arg(short, long, env = "HOOKLINE_SECRET")]
    secret: Option<String>,
}

#[derive(Args)]
struct SendArgs {
    /// Endpoint URL
    #[arg(short, long)]
    url: String,

    /// Event type
    #[arg(short, long)]
    event: String,

    /// JSON payload
    #[arg(short, long)]
    payload: Option<String>,

    /// Signing secret
    #[arg(short, long, env = "HOOKLINE_SECRET")]
    secret: Option<String>,

    /// TOML delivery configuration (HOOKLINE_WEBHOOK_* variables otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the attempt budget
    #[arg(long)]
    max_attempts: Option<u32>,
}

/// Outcome of a command that completed without error
enum Status {
    Ok,
    /// `verify` found a bad signature
    Invalid,
    /// `send` had at least one failed delivery
    DeliveryFailed,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => ExitCode::SUCCESS,
            Status::Invalid => ExitCode::from(1),
            Status::DeliveryFailed => ExitCode::from(2),
        }
    }
}

async fn run(command: Commands) -> CliResult<Status> {
    match command {
        Commands::Sign(args) => {
            sign::run(sign::SignArgs {
                secret: args.secret,
                file: args.file,
            })?;
            Ok(Status::Ok)
        }
        Commands::Verify(args) => {
            let valid = verify::run(verify::VerifyArgs {
                secret: args.secret,
                signature: args.signature,
                file: args.file,
            })?;
            Ok(if valid { Status::Ok } else { Status::Invalid })
        }
        Commands::Listen(args) => {
            listen::run(listen::ListenArgs {
                port: args.port,
                status: args.status,
                secret: args.secret,
            })
            .await?;
            Ok(Status::Ok)
        }
        Commands::Send(args) => {
            let delivered = send::run(send::SendArgs {
                url: args.url,
                event: args.event,
                payload: args.payload,
                secret: args.secret,
                config: args.config,
                max_attempts: args.max_attempts,
            })
            .await?;
            Ok(if delivered {
                Status::Ok
            } else {
                Status::DeliveryFailed
            })
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    logging::init(cli.verbose, cli.json);

    match run(cli.command).await {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
