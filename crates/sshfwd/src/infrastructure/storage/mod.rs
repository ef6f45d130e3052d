//! Storage infrastructure: the profiles file.
//!
//! The `profiles` sub-module reads the user's profiles file (JSON or TOML)
//! from an explicit path or the platform config directory and merges it over
//! the built-in profiles.

pub mod profiles;
