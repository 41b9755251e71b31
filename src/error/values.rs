//! Value model errors

use super::InstallError;

/// Creates a setting parse error
pub fn parse_failed(name: impl Into<String>, reason: impl Into<String>) -> InstallError {
    InstallError::Parse {
        name: name.into(),
        reason: reason.into(),
    }
}

/// Creates an add-on parse error
pub fn addon_parse_failed(name: impl Into<String>, reason: impl Into<String>) -> InstallError {
    InstallError::AddOnParse {
        name: name.into(),
        reason: reason.into(),
    }
}

/// Creates a validation error
pub fn invalid(message: impl Into<String>) -> InstallError {
    InstallError::Validation {
        message: message.into(),
    }
}
