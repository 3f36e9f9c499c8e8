mod config_wizard;

use std::fs::File;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use simplelog::*;
use tokio_util::sync::CancellationToken;

use spelunk_dispatch::config::Config as AppConfig;
use spelunk_dispatch::{FailureKind, SearchOrchestrator, SplunkClient};

#[derive(Parser)]
#[command(name = "spelunk-dispatch")]
#[command(about = "Run a Splunk search job and print its results", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a search and wait for its results
    Search {
        /// SPL query; `search` is prepended unless it starts with a command
        query: String,
        /// Field to return (repeatable); all fields when omitted
        #[arg(short, long = "field")]
        fields: Vec<String>,
        /// Maximum number of results
        #[arg(short, long)]
        count: Option<NonZeroU32>,
        /// Seconds between status checks
        #[arg(long)]
        interval: Option<u64>,
        /// Seconds to wait for the job before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run the configuration wizard
    Config,
}

fn init_logging(verbose: u8, log_file: Option<&PathBuf>) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            simplelog::Config::default(),
            File::create(path)?,
        ));
    }
    let _ = CombinedLogger::init(loggers);
    Ok(())
}

fn exit_code(kind: FailureKind) -> u8 {
    match kind {
        FailureKind::Transport => 2,
        FailureKind::Protocol => 3,
        FailureKind::Timeout => 4,
        FailureKind::JobFailed => 5,
        FailureKind::Cancelled => 130,
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_logging(args.verbose, args.log_file.as_ref())?;

    let (query, fields, count, interval, timeout) = match args.command {
        Commands::Config => {
            config_wizard::run()?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Search {
            query,
            fields,
            count,
            interval,
            timeout,
        } => (query, fields, count, interval, timeout),
    };

    let config = AppConfig::load()?;
    log::info!("Loaded Config URL: '{}'", config.splunk_base_url);
    let client = SplunkClient::new(&config.client_config()?)?;
    let orchestrator = SearchOrchestrator::new(client);

    let mut options = config
        .search_options()
        .with_fields(fields)
        .with_max_results(count);
    if let Some(secs) = interval {
        options = options.with_poll_interval(Duration::from_secs(secs.max(1)));
    }
    if let Some(secs) = timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match orchestrator.search_with_cancel(&query, &options, &cancel).await {
        Ok(rows) => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Search failed: {}", e);
            Ok(ExitCode::from(exit_code(e.kind())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_search_arguments() {
        let cli = Cli::try_parse_from([
            "spelunk-dispatch",
            "-vv",
            "search",
            "index=main error",
            "-f",
            "host",
            "--field",
            "_time",
            "-c",
            "25",
            "--timeout",
            "120",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search {
                query,
                fields,
                count,
                interval,
                timeout,
            } => {
                assert_eq!(query, "index=main error");
                assert_eq!(fields, vec!["host", "_time"]);
                assert_eq!(count, NonZeroU32::new(25));
                assert_eq!(interval, None);
                assert_eq!(timeout, Some(120));
            }
            Commands::Config => panic!("expected search"),
        }
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(Cli::try_parse_from(["spelunk-dispatch", "search", "x", "-c", "0"]).is_err());
    }

    #[test]
    fn failure_kinds_have_distinct_exit_codes() {
        let kinds = [
            FailureKind::Transport,
            FailureKind::Protocol,
            FailureKind::Timeout,
            FailureKind::JobFailed,
            FailureKind::Cancelled,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| exit_code(*k)).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }
}
