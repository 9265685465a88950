//! Target discovery and script dispatch engine for scriptcast.
//!
//! Script-execution targets listen on loopback TCP ports within a small
//! fixed range. This crate keeps a live set of connections to them and
//! delivers encoded script frames on demand.
//!
//! # Architecture
//!
//! - [`config`]: fixed engine constants (host, port range, timings)
//! - [`connection`]: one socket-level link to a target, with lifecycle tasks
//! - [`registry`]: the authoritative port-keyed connection set and its
//!   change notifications
//! - [`scanner`]: periodic single-flight sweep over unclaimed ports
//! - [`dispatch`]: frame delivery to one or all registered targets
//! - [`hub`]: wiring facade that owns the registry and background tasks
//!
//! # Example
//!
//! ```no_run
//! use scriptcast_core::{Config, Hub, Target};
//!
//! # async fn example() {
//! let (mut hub, mut changes) = Hub::new(Config::default());
//! hub.start();
//!
//! // React to targets appearing and disappearing.
//! tokio::spawn(async move {
//!     while let Some(change) = changes.recv().await {
//!         println!("registry changed: {change:?}");
//!     }
//! });
//!
//! let dispatcher = hub.dispatcher();
//! dispatcher.dispatch(Target::All, "print('hello')").await;
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod registry;
pub mod scanner;

pub use config::Config;
pub use connection::{ConnectError, Connection};
pub use dispatch::{Dispatcher, Target};
pub use error::{Error, Result};
pub use hub::Hub;
pub use registry::{Registry, RegistryChange};
pub use scanner::Scanner;
