//! Subcommand implementations.

pub mod backends;
pub mod completions;
pub mod mount;
pub mod mounts;
pub mod resolve;
pub mod unmount;
