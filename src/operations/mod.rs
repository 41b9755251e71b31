//! Operations coordinating the installer's modules
//!
//! - [`install`]: Checks the cluster, prepares credentials and values, then
//!   renders the manifest for the requested stage

pub mod install;

pub use install::{InstallMode, InstallOperation, InstallOptions};
