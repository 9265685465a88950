//! Periodic discovery sweep over the configured port range.
//!
//! Each cycle probes every unclaimed port concurrently, so the whole sweep
//! costs one connect timeout regardless of how many dead ports it covers.
//! A single-flight flag keeps cycles from overlapping when a sweep runs
//! longer than the scan period.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use crate::config::Config;
use crate::connection::Connection;
use crate::registry::Registry;

/// Discovery sweep driver
pub struct Scanner {
    config: Config,
    registry: Arc<Mutex<Registry>>,
    closed_tx: mpsc::UnboundedSender<u16>,
    scanning: AtomicBool,
}

/// Releases the single-flight flag on every exit path of a cycle.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scanner {
    #[must_use]
    pub fn new(
        config: Config,
        registry: Arc<Mutex<Registry>>,
        closed_tx: mpsc::UnboundedSender<u16>,
    ) -> Self {
        Self {
            config,
            registry,
            closed_tx,
            scanning: AtomicBool::new(false),
        }
    }

    /// Run one scan cycle.
    ///
    /// No-op if a cycle is already in flight. Otherwise attempts every
    /// unclaimed port in the range concurrently, waits for all attempts to
    /// settle, and merges the successes into the registry as one batch.
    pub async fn scan(&self) {
        if self.scanning.swap(true, Ordering::SeqCst) {
            trace!("scan already in progress, skipping");
            return;
        }
        let _guard = ScanGuard(&self.scanning);

        let candidates: Vec<u16> = {
            let registry = self.registry.lock().await;
            self.config
                .ports()
                .filter(|port| !registry.contains(*port))
                .collect()
        };

        if candidates.is_empty() {
            trace!("no unclaimed ports to probe");
            return;
        }

        debug!("probing {} candidate ports", candidates.len());
        let attempts = candidates.into_iter().map(|port| {
            Connection::open(
                self.config.host,
                port,
                self.config.connect_timeout,
                self.closed_tx.clone(),
            )
        });

        let found: Vec<Connection> = join_all(attempts).await.into_iter().flatten().collect();

        if !found.is_empty() {
            self.registry.lock().await.add(found);
        }
    }

    /// Drive [`Scanner::scan`] on the configured period, forever.
    ///
    /// The hub owns the task running this loop and aborts it on shutdown.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.scan_interval);
        loop {
            interval.tick().await;
            self.scan().await;
        }
    }
}
