//! dbaas CLI entrypoint.
//!
//! This is the main entrypoint for the dbaas command-line tool.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dbaas_provisioner::cli::{Cli, Commands, OutputFormatter};
use dbaas_provisioner::config::{ConfigParser, ConfigValidator};
use dbaas_provisioner::dbaas::{CAPTURE_TARGET, DbaasClient};
use dbaas_provisioner::error::{AggregateError, ConfigError, ProvisionerError, Result};
use dbaas_provisioner::provision::{
    NoProgress, ProgressBars, ProgressTracker, ProvisionOptions, Provisioner,
};

use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Main entrypoint.
fn main() -> ExitCode {
    // .env must be loaded before clap resolves env fallbacks
    if let Err(e) = ConfigParser::new().load_dotenv() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse_args();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Console output is filtered by verbosity. When `log_file` is set, raw API
/// traffic is additionally written there as JSON lines.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let capture = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_filter(Targets::new().with_target(CAPTURE_TARGET, Level::TRACE)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(capture)
        .init();
    Ok(())
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    let options = ProvisionOptions {
        dry_run: cli.dry_run,
        polling_interval: Duration::from_secs(cli.polling_interval),
        ..ProvisionOptions::default()
    };
    let api_key = cli.api_key.ok_or_else(|| ConfigError::MissingEnvVar {
        name: String::from("COMPOSE_API_KEY"),
    })?;
    let client = DbaasClient::with_base_url(&api_key, &cli.api_url)?;
    debug!("Using API at {}", client.base_url());

    let parser = ConfigParser::new();
    match cli.command {
        Commands::Provision {
            files,
            connection_strings,
            endpoint_map,
        } => {
            cmd_provision(
                &parser,
                client,
                options,
                &files,
                connection_strings.as_deref(),
                endpoint_map.as_deref(),
                formatter,
            )
            .await
        }
        Commands::Deprovision { files } => {
            cmd_deprovision(&parser, client, options, &files, formatter).await
        }
        Commands::Validate { files } => cmd_validate(&parser, client, &files, formatter).await,
    }
}

/// Provision every deployment in the spec files.
async fn cmd_provision(
    parser: &ConfigParser,
    client: DbaasClient,
    options: ProvisionOptions,
    files: &[PathBuf],
    connection_strings: Option<&Path>,
    endpoint_map: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let records = parser.load_files(files)?;
    let endpoints = match endpoint_map {
        Some(path) => parser.load_endpoint_map(path)?,
        None => BTreeMap::new(),
    };

    let provisioner = Provisioner::init(Arc::new(client), options).await?;
    let descriptors =
        ConfigValidator::new(provisioner.inventory().datacenters()).validate_all(&records)?;
    let provisioner = provisioner.with_progress(progress_for(&options));

    let report = provisioner.provision_report(descriptors).await;
    eprintln!("{}", formatter.format_run(&report.tasks));

    let mut failures = Vec::new();
    if let Err(e) = report.result {
        failures.push(e);
    }

    if let Some(out) = connection_strings {
        if options.dry_run {
            info!("[dry-run] would write connection strings to {}", out.display());
        } else if let Err(e) = provisioner.connection_strings(&endpoints, out).await {
            failures.push(e);
        }
    }

    combine(failures)
}

/// Delete every deployment named in the spec files.
async fn cmd_deprovision(
    parser: &ConfigParser,
    client: DbaasClient,
    options: ProvisionOptions,
    files: &[PathBuf],
    formatter: &OutputFormatter,
) -> Result<()> {
    let records = parser.load_files(files)?;
    let names: BTreeSet<String> = records
        .into_iter()
        .map(|r| r.name)
        .filter(|name| !name.is_empty())
        .collect();

    let provisioner = Provisioner::init(Arc::new(client), options)
        .await?
        .with_progress(progress_for(&options));

    let report = provisioner
        .deprovision_report(names.into_iter().collect())
        .await;
    eprintln!("{}", formatter.format_run(&report.tasks));
    report.result
}

/// Validate spec files against the account's datacenters.
async fn cmd_validate(
    parser: &ConfigParser,
    client: DbaasClient,
    files: &[PathBuf],
    formatter: &OutputFormatter,
) -> Result<()> {
    let records = parser.load_files(files)?;
    let provisioner = Provisioner::init(Arc::new(client), ProvisionOptions::default()).await?;

    let descriptors =
        ConfigValidator::new(provisioner.inventory().datacenters()).validate_all(&records)?;
    eprintln!("{}", formatter.format_validation(&descriptors));
    Ok(())
}

fn progress_for(options: &ProvisionOptions) -> Arc<dyn ProgressTracker> {
    if options.dry_run {
        Arc::new(NoProgress)
    } else {
        Arc::new(ProgressBars::new(options.polling_interval))
    }
}

/// Folds several surfaced errors into one, flattening aggregates.
fn combine(failures: Vec<ProvisionerError>) -> Result<()> {
    let mut errors = Vec::new();
    for failure in failures {
        match failure {
            ProvisionerError::Aggregate(agg) => errors.extend(agg.errors),
            other => errors.push(other),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AggregateError { errors }.into())
    }
}
