use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, Parser};
use ip_lookup::{
    run_ip_lookup, CountdownWait, LookupConfig, LookupError, MinreqTransport, StdinConfirm,
    DEFAULT_ENDPOINT,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "ip-lookup")]
#[command(about = "Look up geolocation info for IP addresses and CIDR ranges")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(group(ArgGroup::new("target").args(["file", "ip", "ignore"]).multiple(false)))]
struct Cli {
    /// File(s) of target ip addresses, one per line
    #[arg(short, long, num_args = 1..)]
    file: Vec<PathBuf>,

    /// Target ip address or CIDR block
    #[arg(long)]
    ip: Option<String>,

    /// Run the default ip list
    #[arg(short, long)]
    ignore: bool,

    /// Lookup endpoint
    #[arg(short, long, env = "IP_LOOKUP_URL", default_value = DEFAULT_ENDPOINT)]
    url: String,

    /// Response format requested from the API (json or csv)
    #[arg(short = 't', long, default_value = "csv")]
    output_type: String,

    /// Append every result to this file
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Seconds to wait before retrying a failed lookup
    #[arg(long, default_value_t = 60)]
    retry_interval: u64,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Don't show the retry countdown
    #[arg(short, long)]
    quiet: bool,
}

impl From<Cli> for LookupConfig {
    fn from(cli: Cli) -> Self {
        LookupConfig {
            ip: cli.ip,
            files: cli.file,
            ignore: cli.ignore,
            defaults: Vec::new(),
            endpoint: cli.url,
            output_type: cli.output_type,
            output_file: cli.output_file,
            retry_interval: Duration::from_secs(cli.retry_interval),
            timeout: Duration::from_secs(cli.timeout),
            countdown: !cli.quiet,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LookupConfig::from(Cli::parse());

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<LookupError>() {
                Some(err) => {
                    match err {
                        LookupError::Aborted(path) => {
                            eprintln!("{} left untouched, stopping", path.display())
                        }
                        LookupError::NoTarget => {
                            eprintln!("Error: {}", err);
                            eprintln!("Try 'ip-lookup --help' for more info.");
                        }
                        _ => eprintln!("Error: {}", err),
                    }
                    err.exit_code()
                }
                None => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            };
            ExitCode::from(code as u8)
        }
    }
}

fn run(config: &LookupConfig) -> anyhow::Result<()> {
    let transport = MinreqTransport::new(config.timeout);
    let wait = CountdownWait::new(config.countdown);
    let stdout = io::stdout();

    run_ip_lookup(config, transport, wait, &mut StdinConfirm, &mut stdout.lock())?;
    Ok(())
}
