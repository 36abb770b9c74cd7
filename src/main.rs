//! Chanmap Conformance - command line runner
//!
//! Runs the channel mapping test cases against a live API and prints a
//! report. Exits with status 1 when any test fails.

use anyhow::{Context, Result};
use chanmap_conformance::suite::{self, TEST_CASES};
use chanmap_conformance::{SuiteReport, TestConfig, TestContext};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "chanmap-conformance", version, about)]
struct Cli {
    /// Log HTTP requests and polling at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the suite against a channel mapping API
    Run {
        /// Base URL of the API, e.g. http://device/x-nmos/channelmapping/v1.0/
        #[arg(long, env = "CHANMAP_API_URL")]
        api_url: Option<String>,

        /// JSON file with timing and retry settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run only this test (full name or `test_NN`); repeatable
        #[arg(long = "test", value_name = "NAME")]
        tests: Vec<String>,

        /// Also write the report as JSON to this file
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },
    /// List the available tests
    List,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "chanmap=debug" } else { "chanmap=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::List => {
            for case in TEST_CASES {
                println!("{:<48} {}", case.name, case.description);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            api_url,
            config,
            tests,
            json,
        } => run(api_url, config, tests, json),
    }
}

fn run(
    api_url: Option<String>,
    config_path: Option<PathBuf>,
    tests: Vec<String>,
    json: Option<PathBuf>,
) -> Result<ExitCode> {
    let mut config = config_path
        .as_deref()
        .map(TestConfig::load)
        .unwrap_or_default();
    if let Some(url) = api_url {
        config.api_url = url;
    }

    if let Some(unknown) = tests.iter().find(|name| suite::find(name).is_none()) {
        anyhow::bail!("Unknown test: {unknown} (see `chanmap-conformance list`)");
    }

    info!(api_url = %config.api_url, "Starting conformance run");
    let ctx = TestContext::new(config).context("Failed to create HTTP client")?;
    let results = suite::run_suite(&ctx, &tests);
    let report = SuiteReport::new(ctx.client.base_url(), results);

    print!("{}", report.generate_text());

    if let Some(path) = json {
        let body = report.generate_json()?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "JSON report written");
    }

    if report.has_failures() {
        warn!("Conformance run finished with failures");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
