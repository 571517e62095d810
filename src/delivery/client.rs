//! HTTP delivery client for telemetry entries
//!
//! A stripped-down collector client: round-robins over a pool of endpoint
//! connections, skips dead ones, retries failed requests per the backoff
//! strategy, and keeps dead/alive state fresh with periodic health checks.
//! When every connection is dead the whole pool is resurrected rather than
//! deadlocking permanently.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::TelemetryConfig;
use crate::core::entry::TelemetryEntry;
use crate::core::error::{Result, TelemetryError};
use crate::core::publisher::Shipper;
use crate::core::telemetry::ShipperFactory;

use super::backoff::Backoff;
use super::connection::Connection;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a health-check probe
pub const DEFAULT_HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// Default interval between health-check sweeps
pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(60);

struct Pool {
    conns: Vec<Arc<Connection>>,
    index: usize,
}

struct ClientInner {
    agent: ureq::Agent,
    pool: Mutex<Pool>,
    credentials: Option<(String, String)>,
    backoff: Backoff,
    healthcheck_timeout: Duration,
}

/// Round-robin HTTP client shipping entries to one or more collector nodes
#[derive(Clone)]
pub struct DeliveryClient {
    inner: Arc<ClientInner>,
}

/// Builder for [`DeliveryClient`]
pub struct DeliveryClientBuilder {
    urls: Vec<String>,
    credentials: Option<(String, String)>,
    backoff: Backoff,
    request_timeout: Duration,
    healthcheck_timeout: Duration,
    healthcheck_interval: Option<Duration>,
}

impl DeliveryClientBuilder {
    pub fn new() -> Self {
        Self {
            urls: Vec::new(),
            credentials: None,
            backoff: Backoff::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            healthcheck_timeout: DEFAULT_HEALTHCHECK_TIMEOUT,
            healthcheck_interval: Some(DEFAULT_HEALTHCHECK_INTERVAL),
        }
    }

    /// Add a collector endpoint URL
    #[must_use = "builder methods return a new value"]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Set HTTP basic auth credentials
    #[must_use = "builder methods return a new value"]
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    /// Set the retry backoff strategy
    #[must_use = "builder methods return a new value"]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the per-request timeout
    #[must_use = "builder methods return a new value"]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the health-check probe timeout
    #[must_use = "builder methods return a new value"]
    pub fn healthcheck_timeout(mut self, timeout: Duration) -> Self {
        self.healthcheck_timeout = timeout;
        self
    }

    /// Set the interval between background health-check sweeps, or `None`
    /// to disable the background checker.
    #[must_use = "builder methods return a new value"]
    pub fn healthcheck_interval(mut self, interval: Option<Duration>) -> Self {
        self.healthcheck_interval = interval;
        self
    }

    pub fn build(self) -> Result<DeliveryClient> {
        if self.urls.is_empty() {
            return Err(TelemetryError::config(
                "DeliveryClient",
                "at least one endpoint URL is required",
            ));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(self.request_timeout)
            .build();

        let conns = self
            .urls
            .into_iter()
            .map(|url| Arc::new(Connection::new(url)))
            .collect();

        let inner = Arc::new(ClientInner {
            agent,
            pool: Mutex::new(Pool { conns, index: 0 }),
            credentials: self.credentials,
            backoff: self.backoff,
            healthcheck_timeout: self.healthcheck_timeout,
        });

        if let Some(interval) = self.healthcheck_interval {
            spawn_health_checker(Arc::downgrade(&inner), interval);
        }

        Ok(DeliveryClient { inner })
    }
}

impl Default for DeliveryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryClient {
    pub fn builder() -> DeliveryClientBuilder {
        DeliveryClientBuilder::new()
    }

    /// Build a client from a telemetry configuration.
    pub fn from_config(cfg: &TelemetryConfig) -> Result<Self> {
        let mut builder = Self::builder().url(cfg.uri.clone());
        if !cfg.user_name.is_empty() {
            builder = builder.basic_auth(cfg.user_name.clone(), cfg.password.clone());
        }
        builder.build()
    }

    /// Ship one entry, retrying per the backoff strategy.
    pub fn publish(&self, entry: &TelemetryEntry) -> Result<()> {
        self.inner.publish(&entry.to_wire())
    }

    /// Probe every pool member and update its dead/alive state.
    pub fn health_check(&self) {
        self.inner.health_check();
    }

    #[cfg(test)]
    fn inner(&self) -> &ClientInner {
        &self.inner
    }
}

impl Shipper for DeliveryClient {
    fn publish(&self, entry: &TelemetryEntry) -> Result<()> {
        DeliveryClient::publish(self, entry)
    }
}

/// The shipper factory wired into [`crate::enable_telemetry`]: builds a
/// [`DeliveryClient`] for the configured URI and credentials.
pub fn shipper_factory() -> ShipperFactory {
    Box::new(|cfg| {
        let client = DeliveryClient::from_config(cfg)?;
        Ok(Box::new(client) as Box<dyn Shipper>)
    })
}

impl ClientInner {
    fn publish(&self, body: &serde_json::Value) -> Result<()> {
        let mut attempt = 0usize;
        loop {
            let conn = match self.next_conn() {
                Ok(conn) => conn,
                Err(err) => {
                    attempt += 1;
                    if attempt == 1 {
                        // All connections looked dead; re-probe before the
                        // resurrected pool is tried again.
                        self.health_check();
                    }
                    match self.backoff.next(attempt) {
                        Some(wait) => {
                            thread::sleep(wait);
                            continue;
                        }
                        None => return Err(err),
                    }
                }
            };

            match self.send(&conn, body) {
                Ok(()) => {
                    conn.mark_alive();
                    return Ok(());
                }
                // Collector answered but rejected the entry: terminal for
                // this entry, and no reflection on connection health.
                Err(err @ TelemetryError::HttpStatus { .. }) => return Err(err),
                Err(err) => {
                    attempt += 1;
                    match self.backoff.next(attempt) {
                        Some(wait) => {
                            thread::sleep(wait);
                            continue;
                        }
                        None => {
                            warn!(url = conn.url(), "collector connection is dead");
                            conn.mark_dead();
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    fn send(&self, conn: &Connection, body: &serde_json::Value) -> Result<()> {
        let mut request = self.agent.request("POST", conn.url());
        if let Some(header) = self.auth_header() {
            request = request.set("Authorization", &header);
        }

        match request.send_json(body) {
            Ok(response) => {
                debug!(
                    url = conn.url(),
                    status = response.status(),
                    "telemetry entry shipped"
                );
                Ok(())
            }
            Err(ureq::Error::Status(status, _)) => {
                Err(TelemetryError::http_status(conn.url(), status))
            }
            Err(err) => Err(TelemetryError::transport(conn.url(), err)),
        }
    }

    /// Next live connection, round-robin. When every connection is dead the
    /// whole pool is resurrected so the next attempt can try again.
    fn next_conn(&self) -> Result<Arc<Connection>> {
        let mut pool = self.pool.lock();
        let count = pool.conns.len();

        for _ in 0..count {
            pool.index = (pool.index + 1) % count;
            let conn = &pool.conns[pool.index];
            if !conn.is_dead() {
                return Ok(Arc::clone(conn));
            }
        }

        warn!(
            connections = count,
            "all collector connections marked dead; resurrecting them to prevent deadlock"
        );
        for conn in &pool.conns {
            conn.mark_alive();
        }

        Err(TelemetryError::NoConnection)
    }

    fn health_check(&self) {
        let conns: Vec<Arc<Connection>> = self.pool.lock().conns.clone();
        for conn in conns {
            let mut request = self
                .agent
                .request("HEAD", conn.url())
                .timeout(self.healthcheck_timeout);
            if let Some(header) = self.auth_header() {
                request = request.set("Authorization", &header);
            }

            match request.call() {
                Ok(_) => conn.mark_alive(),
                Err(ureq::Error::Status(status, _)) => {
                    warn!(url = conn.url(), status, "collector endpoint failed health check");
                    conn.mark_dead();
                }
                Err(_) => {
                    warn!(url = conn.url(), "collector endpoint is unreachable");
                    conn.mark_dead();
                }
            }
        }
    }

    fn auth_header(&self) -> Option<String> {
        self.credentials.as_ref().map(|(user, password)| {
            format!(
                "Basic {}",
                BASE64.encode(format!("{}:{}", user, password))
            )
        })
    }
}

/// Periodic health checker; exits once the owning client is dropped.
fn spawn_health_checker(inner: Weak<ClientInner>, interval: Duration) {
    thread::spawn(move || loop {
        thread::sleep(interval);
        match inner.upgrade() {
            Some(inner) => inner.health_check(),
            None => break,
        }
    });
}
