//! `host:port` address helpers.
//!
//! Addresses travel through sshfwd as plain strings (`"127.0.0.1:3389"`,
//! `"[::1]:22"`, `"example.com:22"`) because the SSH protocol wants the host
//! and port as separate fields while the local TCP side wants them joined.
//! These helpers do the splitting and the default port substitution in one
//! place.

use thiserror::Error;

/// Port appended to an SSH host that was given without one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Errors produced while parsing a `host:port` string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address string was empty.
    #[error("address is empty")]
    Empty,

    /// No `:port` suffix was present.
    #[error("missing port in address '{0}'")]
    MissingPort(String),

    /// The port was not a number in `0..=65535`.
    #[error("invalid port in address '{0}'")]
    InvalidPort(String),

    /// An IPv6 literal was opened with `[` but never closed.
    #[error("missing ']' in address '{0}'")]
    MissingBracket(String),
}

/// Splits `"host:port"` into its host and numeric port.
///
/// IPv6 literals must be bracketed (`"[::1]:22"`); the brackets are stripped
/// from the returned host.  An empty host (`":8080"`) is allowed and means
/// "all interfaces" to a listener.
///
/// # Errors
///
/// Returns [`AddressError`] when the string is empty, has no port, has a
/// non-numeric port, or has an unterminated bracket.
///
/// # Example
///
/// ```rust
/// use sshfwd_core::split_host_port;
///
/// assert_eq!(split_host_port("127.0.0.1:3389").unwrap(), ("127.0.0.1", 3389));
/// assert_eq!(split_host_port("[::1]:22").unwrap(), ("::1", 22));
/// ```
pub fn split_host_port(address: &str) -> Result<(&str, u16), AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| AddressError::MissingBracket(address.to_string()))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| AddressError::MissingPort(address.to_string()))?;
        (host, port)
    } else {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(address.to_string()))?;
        // A second colon without brackets is a bare IPv6 literal, not host:port.
        if host.contains(':') {
            return Err(AddressError::MissingPort(address.to_string()));
        }
        (host, port)
    };

    let port = port
        .parse::<u16>()
        .map_err(|_| AddressError::InvalidPort(address.to_string()))?;
    Ok((host, port))
}

/// Returns `address` unchanged when it already carries a port, otherwise
/// appends `default_port`.
///
/// Bare IPv6 literals get bracketed on the way (`"::1"` → `"[::1]:22"`).
///
/// # Errors
///
/// Propagates every [`AddressError`] except [`AddressError::MissingPort`].
pub fn ensure_port(address: &str, default_port: u16) -> Result<String, AddressError> {
    match split_host_port(address) {
        Ok(_) => Ok(address.to_string()),
        Err(AddressError::MissingPort(_)) if address.contains(':') && !address.starts_with('[') => {
            Ok(format!("[{address}]:{default_port}"))
        }
        Err(AddressError::MissingPort(_)) => Ok(format!("{address}:{default_port}")),
        Err(e) => Err(e),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
