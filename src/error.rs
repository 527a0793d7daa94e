use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("failed to parse config file {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("share [{share}] is missing required key '{field}'")]
    MissingField { share: String, field: &'static str },

    #[error("failed to install package '{package}': {reason}")]
    PackageInstall {
        package: String,
        reason: PackageFailure,
    },

    #[error("empty domain username")]
    EmptyUsername,

    #[error("empty domain password")]
    EmptyPassword,

    #[error("command timed out after {}s: {command}", .timeout.as_secs())]
    CommandTimeout { command: String, timeout: Duration },

    #[error("unable to determine the login name of the current user")]
    UnknownUser,

    #[error("invalid settings file {}: {reason}", .path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a required package could not be made available.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageFailure {
    #[error("package is not available in this distribution")]
    NotAvailable,

    #[error("insufficient privileges, run as root")]
    PermissionDenied,

    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
