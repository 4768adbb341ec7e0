//! Per-endpoint runtime configuration.
//!
//! Defaults reproduce the classic pair of programs: the initiator journals
//! to `client.out` and lingers two seconds after its final ACK, the responder
//! listens on every interface and journals to `server.out`.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INITIATOR_HOST: &str = "127.0.0.1";
pub const DEFAULT_RESPONDER_HOST: &str = "0.0.0.0";
pub const INITIATOR_JOURNAL: &str = "client.out";
pub const RESPONDER_JOURNAL: &str = "server.out";

/// Pause after the initiator's final ACK before the stream is dropped.
pub const INITIATOR_LINGER: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Host to connect to (initiator) or bind on (responder).
    pub host: String,
    /// Responder's port.
    pub port: u16,
    /// File the journal appends to.
    pub journal_path: PathBuf,
    /// Also print journal records to standard output.
    pub echo_console: bool,
    pub linger: Duration,
}

impl EndpointConfig {
    pub fn initiator(port: u16) -> Self {
        Self {
            host: DEFAULT_INITIATOR_HOST.to_string(),
            port,
            journal_path: PathBuf::from(INITIATOR_JOURNAL),
            echo_console: true,
            linger: INITIATOR_LINGER,
        }
    }

    pub fn responder(port: u16) -> Self {
        Self {
            host: DEFAULT_RESPONDER_HOST.to_string(),
            port,
            journal_path: PathBuf::from(RESPONDER_JOURNAL),
            echo_console: true,
            linger: Duration::ZERO,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = path.into();
        self
    }

    pub fn with_echo_console(mut self, echo: bool) -> Self {
        self.echo_console = echo;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }
}
