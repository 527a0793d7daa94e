//! Makes sure the packages needed for CIFS mounts are installed (Debian/Ubuntu).

use tracing::{debug, info, warn};

use crate::error::{Error, PackageFailure, Result};
use crate::exec::CommandRunner;

pub struct PackageInstaller<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> PackageInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Installs `package` with apt unless dpkg already reports it installed.
    pub async fn ensure(&self, package: &str) -> Result<()> {
        if !is_valid_package_name(package) {
            return Err(Error::PackageInstall {
                package: package.to_string(),
                reason: PackageFailure::NotAvailable,
            });
        }

        let query = format!("dpkg-query -W -f='${{Status}}' {}", package);
        let status = self.runner.run(&query, &query).await?;
        if status.success()
            && status
                .output
                .as_deref()
                .is_some_and(|out| out.contains("install ok installed"))
        {
            debug!("Package {} already installed", package);
            return Ok(());
        }

        info!("Installing required package {}", package);
        let install = format!("DEBIAN_FRONTEND=noninteractive apt-get install -y {}", package);
        let result = self.runner.run(&install, &install).await?;
        if result.success() {
            info!("Installed {}", package);
            return Ok(());
        }

        let output = result.output.unwrap_or_default();
        let reason = classify_failure(&output);
        warn!("Installing {} failed: {}", package, reason);
        Err(Error::PackageInstall {
            package: package.to_string(),
            reason,
        })
    }
}

fn classify_failure(output: &str) -> PackageFailure {
    if output.contains("Unable to locate package") || output.contains("has no installation candidate") {
        PackageFailure::NotAvailable
    } else if output.contains("are you root")
        || output.contains("Permission denied")
        || output.contains("Could not open lock file")
    {
        PackageFailure::PermissionDenied
    } else {
        PackageFailure::Failed(output.trim().to_string())
    }
}

/// Debian policy: lowercase alphanumerics plus `+ - .`, starting alphanumeric.
fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{failed, ok, CommandOutput, ScriptedRunner};

    fn installed() -> CommandOutput {
        CommandOutput {
            code: 0,
            output: Some("install ok installed".to_string()),
        }
    }

    #[tokio::test]
    async fn installed_package_is_left_alone() {
        let runner = ScriptedRunner::new(|_: &str| installed());
        PackageInstaller::new(&runner).ensure("cifs-utils").await.unwrap();
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_package_is_installed() {
        let runner = ScriptedRunner::new(|cmd: &str| {
            if cmd.starts_with("dpkg-query") {
                failed(1, "dpkg-query: no packages found matching cifs-utils")
            } else {
                ok()
            }
        });
        PackageInstaller::new(&runner).ensure("cifs-utils").await.unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].ends_with("apt-get install -y cifs-utils"));
    }

    #[tokio::test]
    async fn lock_failure_is_permission_denied() {
        let runner = ScriptedRunner::new(|cmd: &str| {
            if cmd.starts_with("dpkg-query") {
                failed(1, "")
            } else {
                failed(
                    100,
                    "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)",
                )
            }
        });
        let err = PackageInstaller::new(&runner).ensure("cifs-utils").await.unwrap_err();
        assert!(matches!(
            err,
            Error::PackageInstall { reason: PackageFailure::PermissionDenied, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_package_is_not_available() {
        let runner = ScriptedRunner::new(|cmd: &str| {
            if cmd.starts_with("dpkg-query") {
                failed(1, "")
            } else {
                failed(100, "E: Unable to locate package smbfs")
            }
        });
        let err = PackageInstaller::new(&runner).ensure("smbfs").await.unwrap_err();
        assert!(matches!(
            err,
            Error::PackageInstall { reason: PackageFailure::NotAvailable, ref package } if package == "smbfs"
        ));
    }

    #[tokio::test]
    async fn shell_metacharacters_are_rejected() {
        let runner = ScriptedRunner::new(|_: &str| ok());
        let err = PackageInstaller::new(&runner).ensure("foo; rm -rf /").await.unwrap_err();
        assert!(matches!(err, Error::PackageInstall { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn package_names() {
        assert!(is_valid_package_name("cifs-utils"));
        assert!(is_valid_package_name("libstdc++6"));
        assert!(!is_valid_package_name("Cifs"));
        assert!(!is_valid_package_name(""));
    }
}
