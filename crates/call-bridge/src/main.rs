//! Call Bridge - OmniDimension voice calls from the command line
//!
//! Dispatches outbound calls and fetches call transcripts. Every invocation
//! prints exactly one JSON line to stdout; logs go to stderr.

mod api;
mod bridge;
mod config;
mod extract;
mod output;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use api::OmnidimClient;
use bridge::{CallBridge, CallRequest};
use config::Config;
use output::Envelope;

#[derive(Parser)]
#[command(name = "call-bridge")]
#[command(about = "Call Bridge - place voice calls and fetch transcripts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch an outbound call
    Call {
        /// Number to call (E.164, e.g. +15550100)
        phone_number: String,
        /// Script the agent follows on the call
        script: String,
        /// Language of the call (e.g. en, hi)
        language: String,
        /// Trailing arguments are accepted and ignored
        #[arg(hide = true)]
        extra: Vec<String>,
    },

    /// Show transcript and status of the most recent call
    Status {
        /// Fetch this call log instead of the most recent one
        #[arg(long)]
        call_id: Option<String>,
        /// Positional ids (often dispatch request ids) are accepted and ignored
        #[arg(hide = true)]
        extra: Vec<String>,
    },

    /// List imported phone numbers and their ids
    Numbers,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    debug!("call-bridge starting");

    let cli = match parse_cli() {
        Ok(cli) => cli,
        Err(envelope) => {
            envelope.emit();
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Configuration error");
            Envelope::error(err.to_string()).emit();
            return ExitCode::FAILURE;
        }
    };

    let client = OmnidimClient::new(&config.base_url, &config.api_key);
    let bridge = CallBridge::new(client, config);

    let envelope = match cli.command {
        Commands::Call {
            phone_number,
            script,
            language,
            extra,
        } => {
            log_ignored("call", &extra);
            bridge
                .dispatch(CallRequest {
                    phone_number,
                    script,
                    language,
                })
                .await
        }
        Commands::Status { call_id, extra } => {
            log_ignored("status", &extra);
            match call_id {
                Some(id) => bridge.call_log(&id).await,
                None => bridge.latest_call_log().await,
            }
        }
        Commands::Numbers => bridge.phone_numbers().await,
    };

    debug!(status = ?envelope.status(), "Operation finished");

    // Operation failures are reported in the envelope; the exit code stays 0
    envelope.emit();
    ExitCode::SUCCESS
}

/// Parse arguments, turning usage errors into an error envelope.
/// Help and version requests print and exit as usual.
fn parse_cli() -> Result<Cli, Envelope> {
    Cli::try_parse().map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            Envelope::error("Missing command")
        }
        _ => Envelope::error(format!("Invalid arguments: {}", usage_summary(&err))),
    })
}

fn log_ignored(command: &str, extra: &[String]) {
    if !extra.is_empty() {
        debug!(command, ?extra, "Ignoring trailing arguments");
    }
}

/// First line of a clap error, without the `error: ` prefix
fn usage_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
