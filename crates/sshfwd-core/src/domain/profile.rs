//! Connection profiles.
//!
//! A profile bundles the SSH connection details with the tunnels to open once
//! connected.  Profiles are stored by name; the schema below is what a
//! profiles file contains, e.g.:
//!
//! ```json
//! {
//!   "office_rdp": {
//!     "isDefault": true,
//!     "ssh": {
//!       "host": "gateway.example.com",
//!       "user": "alice",
//!       "auth": [{ "kind": "password", "data": "" }]
//!     },
//!     "localToRemote": [{ "local": "127.0.0.1:3391", "remote": "10.0.0.7:3389" }]
//!   }
//! }
//! ```
//!
//! Empty strings in the `ssh` block mean "ask for it": the binary fills them
//! from command-line flags or an interactive prompt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::rule::{Direction, ForwardRule, RuleError};

/// Profile used when neither the command line nor the profiles file picks one.
pub const FALLBACK_PROFILE_NAME: &str = "rdp_server";

/// Errors raised while selecting or resolving profiles.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// More than one profile carries `isDefault: true`.
    #[error("cannot have multiple default profiles ('{first}' and '{second}')")]
    MultipleDefaults { first: String, second: String },

    /// The requested profile name does not exist.
    #[error("unable to find profile named '{0}'")]
    NotFound(String),

    /// One of the profile's forwards is not a valid rule.
    #[error("profile '{profile}' has an invalid forward: {source}")]
    InvalidRule {
        profile: String,
        #[source]
        source: RuleError,
    },
}

// ── Schema types ──────────────────────────────────────────────────────────────

/// How an SSH authentication method supplies its secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthKind {
    /// `data` is the password; empty means prompt.
    #[serde(rename = "password")]
    Password,
    /// `data` is the path to a private key file.
    #[serde(rename = "publickey")]
    PublicKey,
}

/// One entry of the `auth` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshAuthMethod {
    pub kind: AuthKind,
    #[serde(default)]
    pub data: String,
}

impl SshAuthMethod {
    pub fn password(data: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::Password,
            data: data.into(),
        }
    }

    pub fn public_key(path: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::PublicKey,
            data: path.into(),
        }
    }
}

/// SSH server address, login and authentication methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConnection {
    /// `host` or `host:port`; port 22 is assumed when absent.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_auth")]
    pub auth: Vec<SshAuthMethod>,
    /// Expected `SHA256:...` fingerprint of the server host key.  When unset
    /// any host key is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key: Option<String>,
}

fn default_auth() -> Vec<SshAuthMethod> {
    vec![SshAuthMethod::password("")]
}

impl Default for SshConnection {
    /// No host, no user, a single password method with the password left
    /// blank, so everything is asked for at startup.
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            auth: default_auth(),
            host_key: None,
        }
    }
}

/// A `{ "local": ..., "remote": ... }` pair as written in a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForward {
    pub local: String,
    pub remote: String,
}

impl PortForward {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }
}

/// A named set of tunnels plus the SSH connection they ride on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SshConnection>,
    #[serde(default)]
    pub local_to_remote: Vec<PortForward>,
    #[serde(default)]
    pub remote_to_local: Vec<PortForward>,
}

impl Profile {
    /// The profile's SSH block, or [`SshConnection::default`] when it has none.
    pub fn ssh_connection(&self) -> SshConnection {
        self.ssh.clone().unwrap_or_default()
    }

    /// Converts the profile's forwards into validated rules, local-to-remote
    /// forwards first, each group in file order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleError`] encountered.
    pub fn rules(&self) -> Result<Vec<ForwardRule>, RuleError> {
        let l2r = self
            .local_to_remote
            .iter()
            .map(|f| ForwardRule::new(&f.local, &f.remote, Direction::LocalToRemote));
        let r2l = self
            .remote_to_local
            .iter()
            .map(|f| ForwardRule::new(&f.local, &f.remote, Direction::RemoteToLocal));
        l2r.chain(r2l).collect()
    }
}

// ── Profile set ───────────────────────────────────────────────────────────────

/// All known profiles keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    /// The profiles every installation has, even without a profiles file.
    ///
    /// | Name         | Tunnel                                                |
    /// |--------------|-------------------------------------------------------|
    /// | `rdp_server` | remote `127.0.0.1:3391` → local `127.0.0.1:3389`      |
    /// | `rdp_client` | local `127.0.0.1:3391` → remote `127.0.0.1:3391`      |
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "rdp_server".to_string(),
            Profile {
                remote_to_local: vec![PortForward::new("127.0.0.1:3389", "127.0.0.1:3391")],
                ..Profile::default()
            },
        );
        profiles.insert(
            "rdp_client".to_string(),
            Profile {
                local_to_remote: vec![PortForward::new("127.0.0.1:3391", "127.0.0.1:3391")],
                ..Profile::default()
            },
        );
        Self { profiles }
    }

    /// Lays `overrides` over the built-in profiles (same name replaces) and
    /// checks that at most one profile is marked default.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::MultipleDefaults`] if two profiles claim to be
    /// the default.
    pub fn with_overrides(overrides: BTreeMap<String, Profile>) -> Result<Self, ProfileError> {
        let mut set = Self::builtin();
        set.profiles.extend(overrides);
        set.check_single_default()?;
        Ok(set)
    }

    fn check_single_default(&self) -> Result<(), ProfileError> {
        let mut defaults = self
            .profiles
            .iter()
            .filter(|(_, p)| p.is_default)
            .map(|(name, _)| name);
        if let (Some(first), Some(second)) = (defaults.next(), defaults.next()) {
            return Err(ProfileError::MultipleDefaults {
                first: first.clone(),
                second: second.clone(),
            });
        }
        Ok(())
    }

    /// Name of the profile marked default, or [`FALLBACK_PROFILE_NAME`].
    pub fn default_name(&self) -> &str {
        self.profiles
            .iter()
            .find(|(_, p)| p.is_default)
            .map(|(name, _)| name.as_str())
            .unwrap_or(FALLBACK_PROFILE_NAME)
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Picks `requested` if given, otherwise the default profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if the chosen name is unknown.
    pub fn select<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ProfileError> {
        let name = requested.unwrap_or_else(|| self.default_name());
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    /// Selects a profile and resolves its rules in one step.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] or [`ProfileError::InvalidRule`].
    pub fn resolve(
        &self,
        requested: Option<&str>,
    ) -> Result<(String, Profile, Vec<ForwardRule>), ProfileError> {
        let (name, profile) = self.select(requested)?;
        let rules = profile.rules().map_err(|source| ProfileError::InvalidRule {
            profile: name.to_string(),
            source,
        })?;
        Ok((name.to_string(), profile.clone(), rules))
    }
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
