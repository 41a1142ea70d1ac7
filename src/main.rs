//! labscan - bulk TLS assessment driver.
//!
//! Submits hostnames to the SSL Labs analysis API, polls each assessment to
//! completion under a shared parallelism budget, and prints or saves the
//! graded results.

mod api;
mod cli;
mod config;
mod grade;
mod output;
mod scanner;

use api::HttpTransport;
use cli::Options;
use scanner::{ScanOutcome, ScanPool};

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let options = Options::parse();

    // Diagnostics go to stderr; stdout carries only results.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("labscan={}", options.verbosity.log_filter()).parse()?),
        )
        .init();

    let (targets, mut errors) = options.populate_targets();
    errors.extend(options.validate(&targets));

    if !errors.is_empty() {
        eprintln!("Errors found:");
        for error in &errors {
            eprintln!(" * {error}");
        }
        eprintln!("\nUse --help for details of command options.");
        return Err("invalid options".into());
    }

    let config = options.scan_config();
    tracing::info!(
        "Scanning {} target(s), up to {} in parallel",
        targets.len(),
        config.max_parallel
    );

    let transport = Arc::new(HttpTransport::new()?);
    let pool = ScanPool::new(config, transport);
    let mut results = pool.run(targets);

    while let Some(outcome) = results.recv().await {
        process_outcome(&options, &outcome);
    }

    Ok(())
}

/// Hand one terminal outcome to the save and print collaborators.
fn process_outcome(options: &Options, outcome: &ScanOutcome) {
    // Failures were already reported by the scan engine.
    let Some(report) = &outcome.report else {
        return;
    };
    if !outcome.status.is_success() {
        return;
    }

    if let Some(template) = &options.output {
        match output::save_report(template, &outcome.hostname, report) {
            Ok(path) => tracing::info!("Writing to: {}", path.display()),
            Err(e) => tracing::error!("Unable to save {}: {e}", outcome.hostname),
        }
    }

    output::print_result(options.verbosity, options.detail_level, &outcome.hostname, report);
}
