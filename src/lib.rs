use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

pub mod error;
pub mod output;
pub mod query;
pub mod targets;

pub use error::{LookupError, Result};
pub use output::{render_result, Confirm, OutputFormat, OutputSink, StdinConfirm};
pub use query::{
    CountdownWait, HttpResponse, MinreqTransport, QueryEngine, QueryResult, Transport, Wait,
    FIELDS_MASK,
};
pub use targets::{expand_cidr, resolve_targets, TargetSource, Targets};

pub const DEFAULT_ENDPOINT: &str = "http://ip-api.com/";
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub ip: Option<String>,
    pub files: Vec<PathBuf>,
    pub ignore: bool,
    /// Targets used for `--ignore`.
    pub defaults: Vec<String>,
    pub endpoint: String,
    pub output_type: String,
    pub output_file: Option<PathBuf>,
    pub retry_interval: Duration,
    pub timeout: Duration,
    pub countdown: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            ip: None,
            files: Vec::new(),
            ignore: false,
            defaults: Vec::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            output_type: OutputFormat::default().to_string(),
            output_file: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            countdown: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub queried: usize,
    pub attempts: u32,
}

/// Resolves the targets, then looks each one up in turn. Configuration and
/// input problems are reported before the first request goes out.
pub fn run_ip_lookup<T, W, C, O>(
    config: &LookupConfig,
    transport: T,
    wait: W,
    confirm: &mut C,
    out: &mut O,
) -> Result<RunSummary>
where
    T: Transport,
    W: Wait,
    C: Confirm + ?Sized,
    O: Write,
{
    let format: OutputFormat = config.output_type.parse()?;

    let source = TargetSource::from_args(
        config.ip.clone(),
        config.files.clone(),
        config.ignore,
        config.defaults.clone(),
    )?;
    let targets = resolve_targets(&source)?;

    let mut sink = match &config.output_file {
        Some(path) => Some(OutputSink::open(path, confirm)?),
        None => None,
    };

    let engine = QueryEngine::new(&config.endpoint, transport, wait, config.retry_interval);
    let mut summary = RunSummary::default();

    info!("looking up targets as {}", format);
    for target in targets {
        let result = engine.query(&target, format);

        if let Some(sink) = sink.as_mut() {
            sink.append(&result.body)?;
        }
        render_result(out, &result.target, result.format, &result.text())?;

        summary.queried += 1;
        summary.attempts += result.attempts;
    }

    if let Some(sink) = &sink {
        info!("{} results written to {}", summary.queried, sink.path().display());
    }

    Ok(summary)
}
