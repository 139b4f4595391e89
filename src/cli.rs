use std::{io::IsTerminal, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    build::{BuildId, BuildOutcome},
    client::{BrowserStackClient, DEFAULT_BASE_URL, parse_base_url},
    config::{Config, DEFAULT_DEVICE, DEFAULT_OUTPUT_KEY},
    pipeline::{self, Observer},
    publish::EnvmanPublisher,
    upload::UploadedArtifacts,
};

#[derive(Parser, Debug)]
#[command(
    name = "bstack-xcuitest",
    version,
    about = "Run an XCUITest suite on BrowserStack App Automate",
    long_about = None,
    after_help = "Required environment: browserstack_username, browserstack_password, ipa_path, xcuitest_package_path"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Device to run on, e.g. "iPhone XS-12" (repeat or comma separate)
    #[arg(
        long = "device",
        env = "browserstack_devices",
        value_delimiter = ',',
        default_value = DEFAULT_DEVICE
    )]
    devices: Vec<String>,

    /// Do not capture device logs
    #[arg(long)]
    no_device_logs: bool,

    /// Seconds between build status checks
    #[arg(long, env = "browserstack_poll_interval", default_value_t = 30)]
    poll_interval: u64,

    /// Pipeline variable that receives the build id
    #[arg(long, default_value = DEFAULT_OUTPUT_KEY)]
    output_key: String,

    /// BrowserStack API root
    #[arg(long, env = "browserstack_api_url", default_value = DEFAULT_BASE_URL)]
    api_url: String,
}

impl Cli {
    fn config(&self) -> crate::Result<Config> {
        Config::from_env()?
            .with_devices(&self.devices)?
            .with_device_logs(!self.no_device_logs)
            .with_poll_interval(Duration::from_secs(self.poll_interval))?
            .with_output_key(self.output_key.clone())
    }
}

pub async fn run_cli() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli).await {
        Ok(BuildOutcome::Succeeded) => {
            info!("Build succeeded");
            ExitCode::SUCCESS
        }
        Ok(BuildOutcome::Failed) => {
            error!("Build failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: &Cli) -> Result<BuildOutcome> {
    let config = cli.config().context("Invalid configuration")?;
    let base_url = parse_base_url(&cli.api_url).context("Invalid configuration")?;
    let client = BrowserStackClient::new(config.credentials.clone())?.with_base_url(base_url);

    info!(app = %config.app_path.display(), "IPA path");
    info!(test_suite = %config.test_suite_path.display(), "XCUITest package path");

    let progress = SpinnerObserver::new();
    let outcome = pipeline::run(&client, &config, &EnvmanPublisher::default(), &progress).await;
    progress.clear();
    outcome.context("BrowserStack run failed")
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

struct SpinnerObserver {
    pb: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Self {
        Self {
            pb: spinner("Preparing..."),
        }
    }

    fn clear(&self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}

impl Observer for SpinnerObserver {
    fn uploading(&self) {
        self.pb.set_message("Uploading app and test suite...");
    }

    fn uploaded(&self, _artifacts: &UploadedArtifacts) {
        self.pb.set_message("Starting build...");
    }

    fn build_started(&self, id: &BuildId) {
        self.pb.set_message(format!("Waiting for build {id}..."));
    }

    fn build_finished(&self, _outcome: BuildOutcome) {
        self.pb.finish_and_clear();
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(80));
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb
}
