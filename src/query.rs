use std::borrow::Cow;
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, warn};

use crate::error::{LookupError, Result};
use crate::output::OutputFormat;

/// Selects which response fields the lookup API returns. Opaque to us.
pub const FIELDS_MASK: u32 = 33292287;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: i32,
    pub body: Vec<u8>,
}

/// Sends a bodyless POST and hands back whatever the server answered.
pub trait Transport {
    fn post(&self, url: &str) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, url: &str) -> Result<HttpResponse> {
        (**self).post(url)
    }
}

pub struct MinreqTransport {
    timeout_secs: u64,
}

impl MinreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_secs: timeout.as_secs().max(1),
        }
    }
}

impl Transport for MinreqTransport {
    fn post(&self, url: &str) -> Result<HttpResponse> {
        let response = minreq::post(url).with_timeout(self.timeout_secs).send()?;
        Ok(HttpResponse {
            status: response.status_code,
            body: response.into_bytes(),
        })
    }
}

/// Blocks between failed attempts.
pub trait Wait {
    fn wait(&self, interval: Duration);
}

impl<W: Wait + ?Sized> Wait for &W {
    fn wait(&self, interval: Duration) {
        (**self).wait(interval)
    }
}

/// Sleeps in one-second ticks, optionally drawing a countdown that is wiped
/// once the wait is over.
pub struct CountdownWait {
    draw_target: Box<dyn Fn() -> ProgressDrawTarget>,
}

impl CountdownWait {
    /// Countdown on stderr, or nothing at all when `show` is off.
    pub fn new(show: bool) -> Self {
        if show {
            Self::with_draw_target(ProgressDrawTarget::stderr)
        } else {
            Self::with_draw_target(ProgressDrawTarget::hidden)
        }
    }

    /// Draws each wait's countdown on a fresh target from `draw_target`.
    pub fn with_draw_target<F>(draw_target: F) -> Self
    where
        F: Fn() -> ProgressDrawTarget + 'static,
    {
        Self {
            draw_target: Box::new(draw_target),
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        let pb = ProgressBar::with_draw_target(None, (self.draw_target)());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb
    }
}

impl Wait for CountdownWait {
    fn wait(&self, interval: Duration) {
        let pb = self.progress_bar();
        let whole = interval.as_secs();

        for remaining in (1..=whole).rev() {
            pb.set_message(format!("lookup failed, retrying in {}s", remaining));
            pb.tick();
            thread::sleep(TICK);
        }

        let rest = interval.saturating_sub(Duration::from_secs(whole));
        if !rest.is_zero() {
            thread::sleep(rest);
        }
        pb.finish_and_clear();
    }
}

/// Raw API answer for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub target: String,
    pub format: OutputFormat,
    /// Response body exactly as received.
    pub body: Vec<u8>,
    pub attempts: u32,
}

impl QueryResult {
    /// Body as text for the console; invalid UTF-8 is replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

pub struct QueryEngine<T, W> {
    endpoint: String,
    transport: T,
    wait: W,
    retry_interval: Duration,
}

impl<T: Transport, W: Wait> QueryEngine<T, W> {
    pub fn new(endpoint: &str, transport: T, wait: W, retry_interval: Duration) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            transport,
            wait,
            retry_interval,
        }
    }

    pub fn request_url(&self, target: &str, format: OutputFormat) -> String {
        format!("{}/{}/{}?fields={}", self.endpoint, format, target, FIELDS_MASK)
    }

    /// Looks up one target. Failures are never returned: any non-200 answer or
    /// transport error waits the retry interval and sends the same request
    /// again, for as long as it takes.
    pub fn query(&self, target: &str, format: OutputFormat) -> QueryResult {
        let url = self.request_url(target, format);
        debug!("lookup URL: {}", url);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(&url) {
                Ok(body) => {
                    return QueryResult {
                        target: target.to_string(),
                        format,
                        body,
                        attempts,
                    }
                }
                Err(e) => {
                    // Permanent errors such as 401/404 land here too.
                    debug!("lookup of {} failed (attempt {}): {}", target, attempts, e);
                    if attempts % 10 == 0 {
                        warn!("{} still failing after {} attempts: {}", target, attempts, e);
                    }
                    self.wait.wait(self.retry_interval);
                }
            }
        }
    }

    fn attempt(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.transport.post(url)?;
        if response.status != 200 {
            return Err(LookupError::Status(response.status));
        }
        Ok(response.body)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
