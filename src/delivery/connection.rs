//! Connection state tracking for the delivery pool

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// One collector endpoint in the pool
///
/// Connections are never destroyed, only marked dead or alive by request
/// outcomes and health checks.
#[derive(Debug)]
pub struct Connection {
    url: String,
    dead: AtomicBool,
    last_failure: Mutex<Option<Instant>>,
}

impl Connection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dead: AtomicBool::new(false),
            last_failure: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    pub fn mark_dead(&self) {
        self.dead.store(true, Ordering::SeqCst);
        *self.last_failure.lock() = Some(Instant::now());
    }

    pub fn mark_alive(&self) {
        self.dead.store(false, Ordering::SeqCst);
    }

    pub fn last_failure(&self) -> Option<Instant> {
        *self.last_failure.lock()
    }
}
