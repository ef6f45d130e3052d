//! Infrastructure layer: OS-facing adapters.
//!
//! SSH and TCP transports, profile file storage, terminal prompting and
//! signal handling.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `sshfwd_core`, but MUST NOT be imported by the `application` layer.

pub mod prompt;
pub mod signal;
pub mod ssh;
pub mod storage;
pub mod tcp;
