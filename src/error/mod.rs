//! Error types and handling for the installer
//!
//! Uses `thiserror` for error definitions and `miette` for diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`cluster`]: Cluster reachability, conflicts and transport errors
//! - [`values`]: Setting, add-on and validation errors
//! - [`render`]: Diff, template and credential errors

pub mod cluster;
pub mod render;
pub mod values;

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for install operations
#[derive(Error, Diagnostic, Debug)]
pub enum InstallError {
    // Cluster errors
    #[error(
        "Unable to install the Linkerd control plane. Cannot connect to the Kubernetes cluster:\n\n{message}"
    )]
    #[diagnostic(
        code(linkerd_install::cluster::unreachable),
        help("You can use the --ignore-cluster flag if you just want to generate the installation config.")
    )]
    Reachability { message: String },

    #[error(
        "Unable to install the Linkerd control plane. It appears that there is an existing installation:\n\n{resources}"
    )]
    #[diagnostic(
        code(linkerd_install::cluster::global_resources_exist),
        help(
            "If you are sure you'd like to have a fresh install, remove these resources with:\n\n    linkerd-install install --ignore-cluster | kubectl delete -f -\n\nOtherwise, you can use the --ignore-cluster flag to overwrite the existing global resources."
        )
    )]
    GlobalResourcesExist { resources: String },

    #[error("Can't install the Linkerd control plane in the '{namespace}' namespace. Reason: {reason}.")]
    #[diagnostic(
        code(linkerd_install::cluster::config_conflict),
        help("If this is expected, use the --ignore-cluster flag to continue the installation.")
    )]
    ConfigConflict { namespace: String, reason: String },

    #[error(
        "Can't install the Linkerd control plane in the '{namespace}' namespace. The required Linkerd global resources are missing."
    )]
    #[diagnostic(
        code(linkerd_install::cluster::global_resources_missing),
        help("If this is expected, use the --skip-checks flag to continue the installation.")
    )]
    GlobalResourcesMissing { namespace: String },

    #[error("{message}")]
    #[diagnostic(code(linkerd_install::cluster::transport))]
    Transport { message: String },

    // Value errors
    #[error("Invalid setting '{name}': {reason}")]
    #[diagnostic(code(linkerd_install::values::parse))]
    Parse { name: String, reason: String },

    #[error("Invalid configuration for add-on '{name}': {reason}")]
    #[diagnostic(code(linkerd_install::values::addon_parse))]
    AddOnParse { name: String, reason: String },

    #[error("{message}")]
    #[diagnostic(code(linkerd_install::values::invalid))]
    Validation { message: String },

    // Render errors
    #[error("Cannot diff values at '{path}': {reason}")]
    #[diagnostic(code(linkerd_install::render::diff))]
    Diff { path: String, reason: String },

    #[error("Failed to render chart '{chart}': {reason}")]
    #[diagnostic(code(linkerd_install::render::template))]
    Render { chart: String, reason: String },

    #[error("Failed to initialize identity credentials: {message}")]
    #[diagnostic(code(linkerd_install::identity::credentials))]
    Credentials { message: String },

    #[error("Serialization failed: {message}")]
    #[diagnostic(code(linkerd_install::serialization))]
    Serialization { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(linkerd_install::io))]
    IoError { message: String },
}

impl InstallError {
    /// True for the reachability category, which outranks every other finding
    #[cfg(test)]
    pub fn is_reachability(&self) -> bool {
        matches!(self, InstallError::Reachability { .. })
    }

    /// True for errors meaning an existing installation was detected
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            InstallError::GlobalResourcesExist { .. } | InstallError::ConfigConflict { .. }
        )
    }
}

impl From<std::io::Error> for InstallError {
    fn from(err: std::io::Error) -> Self {
        InstallError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for InstallError {
    fn from(err: serde_yaml::Error) -> Self {
        InstallError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for InstallError {
    fn from(err: serde_json::Error) -> Self {
        InstallError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, InstallError>;
