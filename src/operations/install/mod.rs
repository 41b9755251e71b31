//! Install operation submodules
//!
//! - [`orchestrator`]: The install state machine
//! - [`render`]: Base chart and add-on rendering for a stage
//! - [`overrides`]: The persisted override Secret

pub mod orchestrator;
pub mod overrides;
pub mod render;

pub use orchestrator::{InstallMode, InstallOperation, InstallOptions};
