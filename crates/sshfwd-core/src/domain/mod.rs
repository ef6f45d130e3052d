//! Domain entities for sshfwd.
//!
//! Pure values with no I/O: forwarding rules, addresses, and profiles.  The
//! `sshfwd` crate's application and infrastructure layers depend on these
//! types; nothing here depends on them.

pub mod address;
pub mod profile;
pub mod rule;
