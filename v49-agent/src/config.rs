// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Daemon configuration: the small set of values the bundled binaries need
to bind a socket and bound their packet pagination. The section-oriented
`daemon.conf`/`resource.conf` loader described alongside these values
stays out of scope; `DaemonConfig` is the typed surface such a loader
would hand the daemon core.
*/

use std::path::PathBuf;

use vita49::{DEFAULT_MTU, HEAD_RESERVATION};

/// Daemon-wide configuration: bind path, MTU, head reservation, and the
/// grace period given to a worker before it is forcibly killed during
/// shutdown.
#[derive(Clone, Debug)]
pub struct DaemonConfig {
    /// Filesystem path of the Unix-domain socket the daemon listens on.
    pub bind_path: PathBuf,
    /// Maximum wire frame size before pagination kicks in.
    pub mtu: usize,
    /// Bytes reserved at the head of every frame's budget.
    pub head_reservation: usize,
    /// How long a worker is given to stop cleanly during shutdown before
    /// it is terminated unconditionally.
    pub shutdown_grace: std::time::Duration,
}

impl DaemonConfig {
    /// Builds a config bound to `bind_path` with every other field at its
    /// default.
    pub fn new(bind_path: impl Into<PathBuf>) -> DaemonConfig {
        DaemonConfig {
            bind_path: bind_path.into(),
            mtu: DEFAULT_MTU,
            head_reservation: HEAD_RESERVATION,
            shutdown_grace: std::time::Duration::from_secs(2),
        }
    }

    /// Builds a config from environment variables, falling back to
    /// defaults: `V49_AGENT_SOCK` (bind path, required), `V49_AGENT_MTU`
    /// (optional, parsed as `usize`).
    pub fn from_env() -> Result<DaemonConfig, crate::errors::AgentError> {
        let bind_path = std::env::var("V49_AGENT_SOCK").map_err(|_| {
            crate::errors::AgentError::Fatal("V49_AGENT_SOCK is not set".into())
        })?;
        let mut config = DaemonConfig::new(bind_path);
        if let Ok(mtu) = std::env::var("V49_AGENT_MTU") {
            config.mtu = mtu.parse().map_err(|_| {
                crate::errors::AgentError::Fatal("V49_AGENT_MTU is not a valid integer".into())
            })?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_protocol_defaults() {
        let config = DaemonConfig::new("/tmp/v49-agent.sock");
        assert_eq!(config.mtu, DEFAULT_MTU);
        assert_eq!(config.head_reservation, HEAD_RESERVATION);
    }
}
