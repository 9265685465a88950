//! Wiring facade for the discovery and dispatch engine.
//!
//! The hub owns the shared registry and the two background tasks around
//! it: the close-event pump, which turns connection close reports into
//! registry removals, and the periodic scan loop. Consumers get the
//! registry change feed from [`Hub::new`] and a [`Dispatcher`] from
//! [`Hub::dispatcher`].

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::registry::{Registry, RegistryChange};
use crate::scanner::Scanner;

/// Engine facade: registry + close pump + scan loop
pub struct Hub {
    registry: Arc<Mutex<Registry>>,
    scanner: Arc<Scanner>,
    scan_loop: Option<JoinHandle<()>>,
    close_pump: JoinHandle<()>,
}

impl Hub {
    /// Build the engine and return it with the registry change feed.
    ///
    /// The close-event pump starts immediately. The periodic scan loop
    /// starts on [`Hub::start`], so one-shot callers can drive
    /// [`Hub::scan_once`] themselves instead.
    #[must_use]
    pub fn new(config: Config) -> (Self, mpsc::UnboundedReceiver<RegistryChange>) {
        let (registry, changes_rx) = Registry::new();
        let registry = Arc::new(Mutex::new(registry));

        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<u16>();

        let pump_registry = registry.clone();
        let close_pump = tokio::spawn(async move {
            while let Some(port) = closed_rx.recv().await {
                // A close racing an explicit removal lands here as a no-op.
                pump_registry.lock().await.remove(port);
            }
        });

        let scanner = Arc::new(Scanner::new(config, registry.clone(), closed_tx));

        (
            Self {
                registry,
                scanner,
                scan_loop: None,
                close_pump,
            },
            changes_rx,
        )
    }

    /// Start the periodic scan loop. Idempotent.
    pub fn start(&mut self) {
        if self.scan_loop.is_some() {
            return;
        }
        info!("starting discovery loop");
        self.scan_loop = Some(tokio::spawn(self.scanner.clone().run()));
    }

    /// Run a single scan cycle to completion.
    pub async fn scan_once(&self) {
        self.scanner.scan().await;
    }

    /// Handle for sending scripts to registered targets.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.registry.clone())
    }

    /// Currently registered target ports, ascending.
    pub async fn ports(&self) -> Vec<u16> {
        self.registry.lock().await.ports()
    }

    /// Stop the background loops and tear down every connection.
    pub async fn shutdown(mut self) {
        if let Some(scan_loop) = self.scan_loop.take() {
            scan_loop.abort();
        }
        self.registry.lock().await.clear().await;
        self.close_pump.abort();
        info!("hub stopped");
    }
}
