//! Command implementations for the linkerd-install CLI

pub mod completions;
pub mod install;
pub mod version;
