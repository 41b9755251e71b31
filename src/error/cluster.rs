//! Cluster errors

use super::InstallError;

/// Creates a reachability error
pub fn unreachable(message: impl Into<String>) -> InstallError {
    InstallError::Reachability {
        message: message.into(),
    }
}

/// Creates a global resources conflict error from `kind/name` descriptors
pub fn global_resources_exist(resources: &[String]) -> InstallError {
    InstallError::GlobalResourcesExist {
        resources: resources.join("\n"),
    }
}

/// Creates a configuration conflict error
pub fn config_conflict(namespace: impl Into<String>, reason: impl Into<String>) -> InstallError {
    InstallError::ConfigConflict {
        namespace: namespace.into(),
        reason: reason.into(),
    }
}

/// Creates a missing global resources error
pub fn global_resources_missing(namespace: impl Into<String>) -> InstallError {
    InstallError::GlobalResourcesMissing {
        namespace: namespace.into(),
    }
}

/// Creates a transport error
pub fn transport(message: impl Into<String>) -> InstallError {
    InstallError::Transport {
        message: message.into(),
    }
}
