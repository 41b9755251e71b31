//! Render errors

use super::InstallError;

/// Creates a diff error for the given path
pub fn diff_failed(path: impl Into<String>, reason: impl Into<String>) -> InstallError {
    InstallError::Diff {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a template render error
pub fn render_failed(chart: impl Into<String>, reason: impl Into<String>) -> InstallError {
    InstallError::Render {
        chart: chart.into(),
        reason: reason.into(),
    }
}

/// Creates a credentials error
pub fn credentials_failed(message: impl Into<String>) -> InstallError {
    InstallError::Credentials {
        message: message.into(),
    }
}
