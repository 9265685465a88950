//! On-demand frame delivery to one or all registered targets.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use scriptcast_proto::encode_script;

use crate::error::Error;
use crate::registry::Registry;

/// Dispatch destination: one specific target, or every registered one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Port(u16),
    All,
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Target::All);
        }
        s.parse::<u16>()
            .map(Target::Port)
            .map_err(|_| Error::InvalidTarget(s.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Port(port) => write!(f, "{port}"),
            Target::All => write!(f, "all"),
        }
    }
}

/// Handle for sending scripts to registered targets.
///
/// Cheap to clone; every clone shares the hub's registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl Dispatcher {
    #[must_use]
    pub(crate) fn new(registry: Arc<Mutex<Registry>>) -> Self {
        Self { registry }
    }

    /// Send `script` to the selected target(s).
    ///
    /// Fire-and-forget: frames are queued, nothing is awaited on the
    /// network, and no acknowledgement exists. An empty script and a
    /// target that vanished since it was selected are both silent no-ops.
    pub async fn dispatch(&self, target: Target, script: &str) {
        if script.is_empty() {
            debug!("dispatch skipped: no script available");
            return;
        }

        let frame = encode_script(script);
        let registry = self.registry.lock().await;

        match target {
            Target::Port(port) => {
                let Some(conn) = registry.get(port) else {
                    debug!("[{port}] dispatch skipped: target no longer registered");
                    return;
                };
                debug!("[{port}] dispatching {} bytes", frame.len());
                conn.send(frame);
            }
            Target::All => {
                // Encoded once; every target gets the identical bytes.
                debug!(
                    "dispatching {} bytes to {} targets",
                    frame.len(),
                    registry.len()
                );
                for conn in registry.all() {
                    conn.send(frame.clone());
                }
            }
        }
    }
}
