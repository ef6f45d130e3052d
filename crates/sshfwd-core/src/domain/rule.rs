//! Forwarding rule value type.
//!
//! A [`ForwardRule`] describes one tunnel: a local address, a remote address,
//! and which side accepts connections.  Rules are validated once at
//! construction and never change afterwards, so the accept loops that own
//! them can rely on both addresses carrying a port.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::address::{split_host_port, AddressError};

/// Which side of the tunnel accepts connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Local clients connect to `local_address`; each connection is relayed
    /// through the transport to `remote_address`.
    LocalToRemote,
    /// The transport accepts connections on `remote_address`; each one is
    /// relayed to the local service at `local_address`.
    RemoteToLocal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::LocalToRemote => f.write_str("local-to-remote"),
            Direction::RemoteToLocal => f.write_str("remote-to-local"),
        }
    }
}

/// Errors returned by [`ForwardRule::new`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("local address is empty")]
    EmptyLocalAddress,

    #[error("remote address is empty")]
    EmptyRemoteAddress,

    #[error("invalid local address: {0}")]
    InvalidLocalAddress(#[source] AddressError),

    #[error("invalid remote address: {0}")]
    InvalidRemoteAddress(#[source] AddressError),
}

/// One configured tunnel.
///
/// # Example
///
/// ```rust
/// use sshfwd_core::{Direction, ForwardRule};
///
/// let rule = ForwardRule::new("127.0.0.1:3391", "127.0.0.1:3389", Direction::LocalToRemote)
///     .unwrap();
/// assert_eq!(rule.local_address(), "127.0.0.1:3391");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForwardRule {
    local_address: String,
    remote_address: String,
    direction: Direction,
}

impl ForwardRule {
    /// Builds a rule after checking that both addresses are `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if either address is empty or lacks a valid port.
    pub fn new(
        local_address: impl Into<String>,
        remote_address: impl Into<String>,
        direction: Direction,
    ) -> Result<Self, RuleError> {
        let local_address = local_address.into();
        let remote_address = remote_address.into();

        if local_address.trim().is_empty() {
            return Err(RuleError::EmptyLocalAddress);
        }
        if remote_address.trim().is_empty() {
            return Err(RuleError::EmptyRemoteAddress);
        }
        split_host_port(&local_address).map_err(RuleError::InvalidLocalAddress)?;
        split_host_port(&remote_address).map_err(RuleError::InvalidRemoteAddress)?;

        Ok(Self {
            local_address,
            remote_address,
            direction,
        })
    }

    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The address this rule listens on: local for
    /// [`Direction::LocalToRemote`], remote otherwise.
    pub fn listen_address(&self) -> &str {
        match self.direction {
            Direction::LocalToRemote => &self.local_address,
            Direction::RemoteToLocal => &self.remote_address,
        }
    }

    /// The address each accepted connection is relayed to.
    pub fn target_address(&self) -> &str {
        match self.direction {
            Direction::LocalToRemote => &self.remote_address,
            Direction::RemoteToLocal => &self.local_address,
        }
    }
}

impl fmt::Display for ForwardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::LocalToRemote => write!(
                f,
                "local {} to remote {}",
                self.local_address, self.remote_address
            ),
            Direction::RemoteToLocal => write!(
                f,
                "remote {} to local {}",
                self.remote_address, self.local_address
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
