//! Profiles file loading.
//!
//! The profiles file maps profile names to profiles:
//!
//! ```json
//! {
//!   "office": {
//!     "isDefault": true,
//!     "ssh": { "host": "gw.example.com", "user": "alice" },
//!     "localToRemote": [{ "local": "127.0.0.1:3391", "remote": "10.0.0.7:3389" }]
//!   }
//! }
//! ```
//!
//! Files ending in `.toml` are read as TOML with the same keys; anything else
//! is read as JSON.  The default location is
//! - Windows:  `%APPDATA%\sshfwd\profiles.json`
//! - Linux:    `$XDG_CONFIG_HOME/sshfwd/profiles.json` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/sshfwd/profiles.json`
//!
//! A missing file at the default location just means "built-ins only"; a
//! missing file the user named explicitly is an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use sshfwd_core::{Profile, ProfileError, ProfileSet};

/// File name used inside the platform config directory.
pub const PROFILES_FILE_NAME: &str = "profiles.json";

/// Error type for profiles file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing profiles at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profiles JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("failed to parse profiles TOML: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The file parsed but its contents are inconsistent.
    #[error(transparent)]
    Profiles(#[from] ProfileError),
}

/// Syntax of a profiles file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
    Json,
    Toml,
}

impl ProfileFormat {
    /// `.toml` (any case) selects TOML; everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ProfileFormat::Toml,
            _ => ProfileFormat::Json,
        }
    }
}

/// Parses profiles text and merges it over the built-ins.
///
/// # Errors
///
/// Returns a parse error for malformed text and
/// [`ConfigError::Profiles`] when more than one profile is marked default.
pub fn parse_profiles(text: &str, format: ProfileFormat) -> Result<ProfileSet, ConfigError> {
    let parsed: BTreeMap<String, Profile> = match format {
        ProfileFormat::Json => serde_json::from_str(text)?,
        ProfileFormat::Toml => toml::from_str(text)?,
    };
    Ok(ProfileSet::with_overrides(parsed)?)
}

/// Resolves the full path of the default profiles file.
///
/// Other Unix systems follow the Linux (XDG) layout.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the environment variable
/// the platform layout relies on is unset.
pub fn default_profiles_path() -> Result<PathBuf, ConfigError> {
    let var = |name: &str| std::env::var_os(name).map(PathBuf::from);
    let base = if cfg!(target_os = "windows") {
        var("APPDATA")
    } else if cfg!(target_os = "macos") {
        var("HOME").map(|home| home.join("Library").join("Application Support"))
    } else {
        var("XDG_CONFIG_HOME").or_else(|| var("HOME").map(|home| home.join(".config")))
    };
    base.map(|base| base.join("sshfwd").join(PROFILES_FILE_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the profile set.
///
/// With `explicit` set, that file must exist.  Without it the platform
/// default path is tried and the built-in profiles are returned when there is
/// no file (or no config directory) at all.
pub fn load_profiles(explicit: Option<&Path>) -> Result<ProfileSet, ConfigError> {
    if let Some(path) = explicit {
        return read_profiles(path);
    }

    let path = match default_profiles_path() {
        Ok(path) => path,
        Err(ConfigError::NoPlatformConfigDir) => {
            debug!("no platform config directory; using built-in profiles");
            return Ok(ProfileSet::builtin());
        }
        Err(e) => return Err(e),
    };

    match read_profiles(&path) {
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!("no profiles file at {}; using built-in profiles", path.display());
            Ok(ProfileSet::builtin())
        }
        other => other,
    }
}

fn read_profiles(path: &Path) -> Result<ProfileSet, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let set = parse_profiles(&text, ProfileFormat::from_path(path))?;
    info!("loaded profiles from {}", path.display());
    Ok(set)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
