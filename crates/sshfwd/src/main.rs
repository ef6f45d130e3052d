//! sshfwd: keeps a set of TCP tunnels open over one SSH connection.
//!
//! # Usage
//!
//! ```text
//! sshfwd [OPTIONS]
//!
//! Options:
//!   --profile <NAME>      Profile to run [default: the profile file's default, else rdp_server]
//!   --config <PATH>       Profiles file (JSON, or TOML when it ends in .toml)
//!   --host <HOST[:PORT]>  SSH server when the profile has none
//!   --user <USER>         SSH user when the profile has none
//!   --password <PASS>     SSH password for password methods left blank
//!   --noprompt            Fail instead of prompting for missing values
//!   --nokeyexit           Exit without waiting for Enter
//!   --direct              Forward over local TCP instead of SSH
//!   -v, --verbose         Debug logging unless RUST_LOG is set
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Flag         |
//! |-------------------|--------------|
//! | `SSHFWD_PROFILE`  | `--profile`  |
//! | `SSHFWD_CONFIG`   | `--config`   |
//! | `SSHFWD_HOST`     | `--host`     |
//! | `SSHFWD_USER`     | `--user`     |
//! | `SSHFWD_PASSWORD` | `--password` |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sshfwd::application::credentials::{resolve_settings, CredentialFlags};
use sshfwd::application::session::SessionManager;
use sshfwd::application::shutdown::ShutdownReason;
use sshfwd::infrastructure::prompt::{wait_for_enter, StdinPrompt};
use sshfwd::infrastructure::signal;
use sshfwd::infrastructure::ssh::SshTransport;
use sshfwd::infrastructure::storage::profiles::load_profiles;
use sshfwd::infrastructure::tcp::TcpTransport;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bidirectional TCP port forwarding over SSH.
#[derive(Debug, Parser)]
#[command(name = "sshfwd", about = "Bidirectional TCP port forwarding over SSH", version)]
struct Cli {
    /// Name of the profile to run.
    #[arg(long, env = "SSHFWD_PROFILE")]
    profile: Option<String>,

    /// Profiles file to load instead of the one in the platform config
    /// directory.
    #[arg(long, env = "SSHFWD_CONFIG")]
    config: Option<PathBuf>,

    /// SSH server (`host` or `host:port`), used when the profile has none.
    #[arg(long, env = "SSHFWD_HOST")]
    host: Option<String>,

    /// SSH user, used when the profile has none.
    #[arg(long, env = "SSHFWD_USER")]
    user: Option<String>,

    /// SSH password for password methods the profile leaves blank.
    #[arg(long, env = "SSHFWD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Never prompt; missing host, user or password is an error.
    #[arg(long)]
    noprompt: bool,

    /// Exit as soon as the session ends instead of waiting for Enter.
    #[arg(long)]
    nokeyexit: bool,

    /// Forward over plain local TCP instead of SSH.
    #[arg(long)]
    direct: bool,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn credential_flags(&self) -> CredentialFlags {
        CredentialFlags {
            host: self.host.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            no_prompt: self.noprompt,
        }
    }

    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
        )
        .init();

    let result = run(&cli).await;
    if let Err(e) = &result {
        tracing::error!("{e:#}");
    }

    if !cli.nokeyexit {
        tokio::task::spawn_blocking(wait_for_enter)
            .await
            .context("waiting for Enter")??;
    }
    result
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let profiles = load_profiles(cli.config.as_deref()).context("loading profiles")?;
    let (name, profile, rules) = profiles
        .resolve(cli.profile.as_deref())
        .context("selecting profile")?;
    info!("using profile {name} with {} forwarding rule(s)", rules.len());

    let reason = if cli.direct {
        info!("direct mode: forwarding over local TCP");
        SessionManager::new(Arc::new(TcpTransport::new()), rules)
            .run(signal::interrupted())
            .await
    } else {
        let connection = profile.ssh_connection();
        let flags = cli.credential_flags();
        let settings = tokio::task::spawn_blocking(move || {
            resolve_settings(&connection, &flags, &mut StdinPrompt)
        })
        .await
        .context("credential prompt task")??;

        let transport = Arc::new(
            SshTransport::connect(&settings)
                .await
                .with_context(|| format!("connecting to {}", settings.address))?,
        );
        let reason = SessionManager::new(transport.clone(), rules)
            .run(signal::interrupted())
            .await;
        if let Err(e) = transport.close().await {
            warn!("{e}");
        }
        reason
    };

    info!("session ended: {reason}");
    if let ShutdownReason::ListenerFailed { rule, error } = reason {
        bail!("forwarding {rule} failed: {error}");
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
