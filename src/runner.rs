use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::command::{MountCommand, ShareCommandBuilder};
use crate::exec::{CommandOutput, CommandRunner};
use crate::share::ShareRecord;

/// Result of mounting or unmounting one share.
#[derive(Debug, Clone, Serialize)]
pub struct ShareOutcome {
    pub name: String,
    pub share: String,
    pub mountpoint: PathBuf,
    pub code: i32,
    pub output: Option<String>,
    /// Set when the command could not be run at all (timeout, I/O).
    pub error: Option<String>,
}

impl ShareOutcome {
    fn new(record: &ShareRecord) -> Self {
        Self {
            name: record.name.clone(),
            share: record.share.clone(),
            mountpoint: record.mountpoint.clone(),
            code: 0,
            output: None,
            error: None,
        }
    }

    fn failed(mut self, error: String) -> Self {
        self.code = -1;
        self.error = Some(error);
        self
    }

    fn with_output(mut self, output: CommandOutput) -> Self {
        self.code = output.code;
        self.output = output.output;
        self
    }

    pub fn success(&self) -> bool {
        self.code == 0 && self.error.is_none()
    }
}

/// Mounts shares one after another, in the order given.
pub struct Mounter<'a> {
    runner: &'a dyn CommandRunner,
    builder: ShareCommandBuilder<'a>,
    dry_run: bool,
    settle: Duration,
}

impl<'a> Mounter<'a> {
    pub fn new(runner: &'a dyn CommandRunner, builder: ShareCommandBuilder<'a>) -> Self {
        Self {
            runner,
            builder,
            dry_run: false,
            settle: Duration::ZERO,
        }
    }

    /// Skip filesystem changes; commands still go to the runner.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Pause after unmounting, before mounting again.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub async fn mount_all(&self, shares: &[ShareRecord]) -> Vec<ShareOutcome> {
        let mut outcomes = Vec::with_capacity(shares.len());
        for record in shares {
            let outcome = self.mount_one(record).await;
            if outcome.success() {
                info!("Mounted [{}] at {}", record.name, record.mountpoint.display());
            } else {
                error!(
                    "Failed to mount [{}] (exit code {}): {}",
                    record.name,
                    outcome.code,
                    outcome
                        .error
                        .as_deref()
                        .or(outcome.output.as_deref())
                        .unwrap_or("no output")
                        .trim()
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    pub async fn unmount_all(&self, shares: &[ShareRecord]) -> Vec<ShareOutcome> {
        let mut outcomes = Vec::with_capacity(shares.len());
        for record in shares {
            let command = self.builder.build(record);
            let outcome = match self.runner.run(&command.umount, &command.umount).await {
                Ok(output) => ShareOutcome::new(record).with_output(output),
                Err(e) => ShareOutcome::new(record).failed(e.to_string()),
            };
            if outcome.success() {
                info!("Unmounted [{}]", record.name);
            } else {
                warn!("Failed to unmount [{}] (exit code {})", record.name, outcome.code);
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn mount_one(&self, record: &ShareRecord) -> ShareOutcome {
        let command = self.builder.build(record);
        let outcome = match self.prepare_mountpoint(record).await {
            Ok(()) => {
                if let Some(hook) = &record.hook_pre_command {
                    self.run_hook(record, "pre", hook).await;
                }
                self.remount(record, &command, ShareOutcome::new(record))
                    .await
            }
            Err(e) => ShareOutcome::new(record).failed(e),
        };

        // Runs whatever happened above.
        if let Some(hook) = &record.hook_post_command {
            self.run_hook(record, "post", hook).await;
        }

        outcome
    }

    async fn prepare_mountpoint(&self, record: &ShareRecord) -> Result<(), String> {
        if record.mountpoint.exists() {
            return Ok(());
        }
        warn!("Mountpoint {} does not exist", record.mountpoint.display());
        if self.dry_run {
            return Ok(());
        }
        tokio::fs::create_dir_all(&record.mountpoint)
            .await
            .map_err(|e| {
                format!(
                    "cannot create mountpoint {}: {}",
                    record.mountpoint.display(),
                    e
                )
            })
    }

    async fn remount(
        &self,
        record: &ShareRecord,
        command: &MountCommand,
        outcome: ShareOutcome,
    ) -> ShareOutcome {
        // Nothing mounted yet is the common case, so a failure here is not an error.
        match self.runner.run(&command.umount, &command.umount).await {
            Ok(output) if !output.success() => {
                debug!("umount for [{}] exited with {}", record.name, output.code)
            }
            Ok(_) => {}
            Err(e) => debug!("umount for [{}] failed: {}", record.name, e),
        }
        if !self.settle.is_zero() && !self.dry_run {
            tokio::time::sleep(self.settle).await;
        }

        info!("Mount command: {}", command.redacted());
        match self.runner.run(&command.mount, command.redacted()).await {
            Ok(output) => outcome.with_output(output),
            Err(e) => outcome.failed(e.to_string()),
        }
    }

    async fn run_hook(&self, record: &ShareRecord, stage: &str, hook: &str) {
        debug!("Running {} hook for [{}]: {}", stage, record.name, hook);
        match self.runner.run(hook, hook).await {
            Ok(output) if output.success() => {}
            Ok(output) => warn!(
                "{} hook for [{}] exited with {}",
                stage, record.name, output.code
            ),
            Err(e) => warn!("{} hook for [{}] failed: {}", stage, record.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{failed, ok, DryRunRunner, ScriptedRunner};
    use crate::prompt::Credentials;
    use crate::share::MountOptions;
    use std::path::Path;

    fn record(name: &str, mountpoint: &Path) -> ShareRecord {
        ShareRecord {
            name: name.to_string(),
            hostname: "srv".to_string(),
            share: name.to_string(),
            mountpoint: mountpoint.to_path_buf(),
            username: None,
            password: None,
            options: MountOptions::new(),
            hook_pre_command: None,
            hook_post_command: None,
        }
    }

    #[tokio::test]
    async fn mounts_in_order_with_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = record("a", &dir.path().join("a"));
        first.hook_pre_command = Some("echo pre".to_string());
        first.hook_post_command = Some("echo post".to_string());
        let second = record("b", &dir.path().join("b"));

        let runner = ScriptedRunner::new(|_: &str| ok());
        let mounter = Mounter::new(&runner, ShareCommandBuilder::new());
        let outcomes = mounter.mount_all(&[first, second]).await;

        assert!(outcomes.iter().all(ShareOutcome::success));
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        assert_eq!(
            runner.calls(),
            [
                "echo pre".to_string(),
                format!("umount {}", a.display()),
                format!("mount -t cifs //srv/a {}", a.display()),
                "echo post".to_string(),
                format!("umount {}", b.display()),
                format!("mount -t cifs //srv/b {}", b.display()),
            ]
        );
        assert!(a.is_dir());
        assert!(b.is_dir());
    }

    #[tokio::test]
    async fn failed_share_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let shares = [
            record("bad", &dir.path().join("bad")),
            record("good", &dir.path().join("good")),
        ];

        let runner = ScriptedRunner::new(|cmd: &str| {
            if cmd.starts_with("mount") && cmd.contains("//srv/bad") {
                failed(32, "mount error(13): Permission denied")
            } else {
                ok()
            }
        });
        let outcomes = Mounter::new(&runner, ShareCommandBuilder::new())
            .mount_all(&shares)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].code, 32);
        assert_eq!(
            outcomes[0].output.as_deref(),
            Some("mount error(13): Permission denied")
        );
        assert!(outcomes[1].success());
    }

    #[tokio::test]
    async fn failing_umount_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let shares = [record("a", dir.path())];
        let runner = ScriptedRunner::new(|cmd: &str| {
            if cmd.starts_with("umount") {
                failed(32, "umount: not mounted.")
            } else {
                ok()
            }
        });
        let outcomes = Mounter::new(&runner, ShareCommandBuilder::new())
            .mount_all(&shares)
            .await;
        assert!(outcomes[0].success());
    }

    #[tokio::test]
    async fn dry_run_creates_nothing_and_masks_password() {
        let dir = tempfile::tempdir().unwrap();
        let mountpoint = dir.path().join("net").join("docs");
        let shares = [record("docs", &mountpoint)];
        let creds = Credentials {
            username: "dom".to_string(),
            password: "secret".to_string(),
        };

        let runner = DryRunRunner::new();
        let builder = ShareCommandBuilder::new().credentials(Some(&creds));
        let outcomes = Mounter::new(&runner, builder)
            .dry_run(true)
            .mount_all(&shares)
            .await;

        assert!(outcomes[0].success());
        assert!(!mountpoint.exists());
        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[1].ends_with("-o username=dom,password=******"));
    }

    #[tokio::test]
    async fn post_hook_runs_when_mountpoint_cannot_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"").unwrap();
        let mut share = record("a", &file.join("sub"));
        share.hook_pre_command = Some("echo pre".to_string());
        share.hook_post_command = Some("echo post".to_string());

        let runner = ScriptedRunner::new(|_: &str| ok());
        let outcomes = Mounter::new(&runner, ShareCommandBuilder::new())
            .mount_all(&[share])
            .await;

        assert!(!outcomes[0].success());
        assert!(outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("cannot create mountpoint"));
        assert_eq!(runner.calls(), ["echo post"]);
    }

    #[tokio::test]
    async fn unmount_only_runs_umount() {
        let dir = tempfile::tempdir().unwrap();
        let shares = [record("a", dir.path())];
        let runner = ScriptedRunner::new(|_: &str| ok());
        let outcomes = Mounter::new(&runner, ShareCommandBuilder::new())
            .unmount_all(&shares)
            .await;
        assert!(outcomes[0].success());
        assert_eq!(runner.calls(), [format!("umount {}", dir.path().display())]);
    }
}
