//! # sshfwd-core
//!
//! Shared library for sshfwd containing the forwarding-rule model, address
//! helpers and the connection profile schema.
//!
//! It has zero dependencies on sockets, async runtimes or the SSH library, so
//! everything here can be tested without a network.
//!
//! # Architecture overview
//!
//! sshfwd keeps a set of TCP tunnels open over one SSH connection.  A tunnel
//! is described by a [`ForwardRule`]: which local address pairs with which
//! remote address, and in which direction connections flow.  Rules are grouped
//! into named [`Profile`]s together with the SSH connection details.
//!
//! - **`domain::rule`** – [`ForwardRule`] and [`Direction`].
//! - **`domain::address`** – `host:port` splitting and default port handling.
//! - **`domain::profile`** – the profile schema, the built-in profiles, and
//!   default-profile selection.

pub mod domain;

pub use domain::address::{ensure_port, split_host_port, AddressError, DEFAULT_SSH_PORT};
pub use domain::profile::{
    AuthKind, PortForward, Profile, ProfileError, ProfileSet, SshAuthMethod, SshConnection,
    FALLBACK_PROFILE_NAME,
};
pub use domain::rule::{Direction, ForwardRule, RuleError};
