//! Turns a profile's SSH block plus command-line values into connection
//! settings.
//!
//! Precedence for host, user and password: the profile value, then the
//! command-line value, then an interactive [`Prompt`].  With prompting
//! disabled a value that is still missing is an error.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use sshfwd_core::{ensure_port, AddressError, AuthKind, SshConnection, DEFAULT_SSH_PORT};

/// Asks the operator for a value.
pub trait Prompt {
    /// Shows `label` and returns the trimmed answer.  `secret` marks values
    /// that should not be echoed when the implementation can avoid it.
    fn ask(&mut self, label: &str, secret: bool) -> io::Result<String>;
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CredentialFlags {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub no_prompt: bool,
}

/// One authentication attempt, in the order it will be tried.
#[derive(Clone, PartialEq, Eq)]
pub enum SshAuth {
    Password(String),
    PublicKey(PathBuf),
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuth::Password(_) => f.write_str("Password(***)"),
            SshAuth::PublicKey(path) => f.debug_tuple("PublicKey").field(path).finish(),
        }
    }
}

/// Everything needed to open the SSH session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    /// `host:port`; port 22 is filled in when the host had none.
    pub address: String,
    pub user: String,
    pub auth: Vec<SshAuth>,
    /// Expected SHA-256 host key fingerprint, if pinned.
    pub host_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no {what} given; use {flag} or drop --noprompt")]
    Missing {
        what: &'static str,
        flag: &'static str,
    },

    #[error("invalid SSH host '{host}': {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: AddressError,
    },

    #[error("the profile lists no SSH authentication methods")]
    NoAuthMethods,

    #[error("failed to read from the terminal: {0}")]
    Prompt(#[from] io::Error),
}

/// Builds [`SshSettings`] from `connection`, falling back to `flags` and
/// then to `prompt`.
pub fn resolve_settings(
    connection: &SshConnection,
    flags: &CredentialFlags,
    prompt: &mut dyn Prompt,
) -> Result<SshSettings, CredentialError> {
    if connection.auth.is_empty() {
        return Err(CredentialError::NoAuthMethods);
    }

    let host = pick(&connection.host, &flags.host, flags.no_prompt, prompt, "Host", "--host", false)?;
    let address = ensure_port(&host, DEFAULT_SSH_PORT)
        .map_err(|source| CredentialError::InvalidHost { host, source })?;
    let user = pick(&connection.user, &flags.user, flags.no_prompt, prompt, "User", "--user", false)?;

    // One password answer serves every password method left blank.
    let mut password: Option<String> = None;
    let mut auth = Vec::with_capacity(connection.auth.len());
    for method in &connection.auth {
        match method.kind {
            AuthKind::Password if !method.data.is_empty() => {
                auth.push(SshAuth::Password(method.data.clone()));
            }
            AuthKind::Password => {
                if password.is_none() {
                    password = Some(pick(
                        "",
                        &flags.password,
                        flags.no_prompt,
                        prompt,
                        "Password",
                        "--password",
                        true,
                    )?);
                }
                auth.push(SshAuth::Password(password.clone().unwrap_or_default()));
            }
            AuthKind::PublicKey => auth.push(SshAuth::PublicKey(PathBuf::from(&method.data))),
        }
    }

    debug!(address = %address, user = %user, methods = auth.len(), "resolved SSH settings");
    Ok(SshSettings {
        address,
        user,
        auth,
        host_key: connection.host_key.clone(),
    })
}

fn pick(
    configured: &str,
    flag: &Option<String>,
    no_prompt: bool,
    prompt: &mut dyn Prompt,
    what: &'static str,
    flag_name: &'static str,
    secret: bool,
) -> Result<String, CredentialError> {
    if !configured.is_empty() {
        return Ok(configured.to_string());
    }
    if let Some(value) = flag.as_deref().filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }
    if no_prompt {
        return Err(CredentialError::Missing {
            what,
            flag: flag_name,
        });
    }
    let answer = prompt.ask(what, secret)?;
    if answer.is_empty() {
        return Err(CredentialError::Missing {
            what,
            flag: flag_name,
        });
    }
    Ok(answer)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
