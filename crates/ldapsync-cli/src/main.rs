//! ldapsync: export mailbox identities from Active Directory and submit them
//! to the synchronisation API.

mod cli;
mod logging;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use ldapsync_api::SyncClient;
use ldapsync_core::NormalizedRecord;
use ldapsync_directory::{DirectoryClient, Exporter};
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Records shown in verbose output.
const PREVIEW_RECORDS: usize = 10;

/// Exit status when the run completed, including an empty export.
const EXIT_OK: u8 = 0;
/// Exit status when the synchronisation API rejected or missed the submission.
const EXIT_SUBMISSION_FAILED: u8 = 1;
/// Exit status for invalid arguments or configuration.
const EXIT_CONFIG_ERROR: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(err) = logging::init(cli.log.as_deref()) {
        eprintln!("Error: {err:#}");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

/// Runs one export and submission.
///
/// Configuration problems surface as `Err`; the outcome of the submission is
/// returned as the exit status.
async fn run(cli: &Cli) -> anyhow::Result<u8> {
    let directory = cli
        .directory_config()
        .context("invalid directory settings")?;
    let sync = cli.sync_config().context("invalid sync API settings")?;
    let client = SyncClient::new(sync).context("failed to create sync API client")?;
    let mut exporter = Exporter::new(DirectoryClient::new(directory))?;

    if cli.verbose {
        info!("Connecting to LDAP server");
    }

    let records = exporter.export(None).await;

    if cli.verbose {
        let preview = &records[..records.len().min(PREVIEW_RECORDS)];
        info!(
            "Got data from LDAP server (only the first {PREVIEW_RECORDS} accounts shown, total accounts {}): \n{}",
            records.len(),
            serde_json::to_string_pretty(preview)?
        );
    }

    if records.is_empty() {
        if let Some(err) = exporter.last_error() {
            warn!("directory export failed: {err}");
        }
    }

    Ok(deliver(&client, &records, cli.verbose).await)
}

/// Submits the export and maps the outcome to an exit status.
///
/// An empty export is not submitted.
async fn deliver(client: &SyncClient, records: &[NormalizedRecord], verbose: bool) -> u8 {
    if records.is_empty() {
        if verbose {
            info!("Got nothing from LDAP server");
        }
        return EXIT_OK;
    }

    if verbose {
        info!("Sending data");
    }

    match client.submit(records).await {
        Ok(body) => {
            if verbose {
                info!("Data sent successfully");
            }
            println!("{body}");
            EXIT_OK
        }
        Err(err) => {
            error!("{err}");
            EXIT_SUBMISSION_FAILED
        }
    }
}
