//! Application layer: the forwarding engine.
//!
//! Everything here talks to the network only through tokio byte streams and
//! the [`transport::Transport`] port, so the whole engine runs against plain
//! loopback TCP in tests exactly as it runs over SSH in production.
//!
//! # Sub-modules
//!
//! - **`transport`**   – The `Transport` / `ChannelListener` port and the
//!   boxed `Connection` stream type.
//! - **`local`**       – The local TCP side of every tunnel.
//! - **`forwarder`**   – Full-duplex relay of one connection pair.
//! - **`listener`**    – Per-rule accept loop.
//! - **`session`**     – Runs all rules and waits for shutdown.
//! - **`shutdown`**    – The single-fire shutdown signal.
//! - **`credentials`** – Resolves host, user and authentication methods,
//!   prompting for whatever is missing.

pub mod credentials;
pub mod forwarder;
pub mod listener;
pub mod local;
pub mod session;
pub mod shutdown;
pub mod transport;
