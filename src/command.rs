use crate::prompt::Credentials;
use crate::share::{MountOptions, ShareRecord};

const MOUNT_COMMAND: &str = "mount";
const UMOUNT_COMMAND: &str = "umount";
const FILESYSTEM_TYPE: &str = "cifs";
const MASK: &str = "******";

/// The command lines for one share. Rebuilt on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCommand {
    pub mount: String,
    pub umount: String,
    redacted: String,
}

impl MountCommand {
    /// The mount line with the password masked, safe for logs.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

/// `//host/share` with exactly one slash between the two segments.
pub fn service(hostname: &str, share: &str) -> String {
    format!(
        "//{}/{}",
        hostname.trim_matches('/'),
        share.trim_start_matches('/')
    )
}

/// Formats `mount -t cifs` / `umount` lines from a share record.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShareCommandBuilder<'a> {
    credentials: Option<&'a Credentials>,
    host_user: Option<&'a str>,
}

impl<'a> ShareCommandBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Domain credentials used for shares that do not carry their own.
    pub fn credentials(mut self, credentials: Option<&'a Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Local login name, passed to `mount` as `uid=`.
    pub fn host_user(mut self, host_user: Option<&'a str>) -> Self {
        self.host_user = host_user;
        self
    }

    pub fn build(&self, record: &ShareRecord) -> MountCommand {
        let options = self.merged_options(record);
        let base = format!(
            "{} -t {} {} {}",
            MOUNT_COMMAND,
            FILESYSTEM_TYPE,
            service(&record.hostname, &record.share),
            record.mountpoint.display()
        );

        let mount = with_options(&base, &options);
        let redacted = if options.contains("password") {
            let mut masked = options.clone();
            masked.insert("password", Some(MASK.to_string()));
            with_options(&base, &masked)
        } else {
            mount.clone()
        };

        MountCommand {
            mount,
            umount: format!("{} {}", UMOUNT_COMMAND, record.mountpoint.display()),
            redacted,
        }
    }

    fn merged_options(&self, record: &ShareRecord) -> MountOptions {
        let mut options = record.options.clone();

        let username = record
            .username
            .clone()
            .or_else(|| self.credentials.map(|c| c.username.clone()));
        let password = record
            .password
            .clone()
            .or_else(|| self.credentials.map(|c| c.password.clone()));

        if let Some(username) = username {
            options.insert("username", Some(username));
        }
        if let Some(password) = password {
            options.insert("password", Some(password));
        }
        if let Some(user) = self.host_user {
            options.insert_default("uid", Some(user.to_string()));
        }
        options
    }
}

fn with_options(base: &str, options: &MountOptions) -> String {
    if options.is_empty() {
        base.to_string()
    } else {
        format!("{} {}", base, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(options: MountOptions) -> ShareRecord {
        ShareRecord {
            name: "test".to_string(),
            hostname: "h".to_string(),
            share: "s".to_string(),
            mountpoint: PathBuf::from("/m"),
            username: None,
            password: None,
            options,
            hook_pre_command: None,
            hook_post_command: None,
        }
    }

    #[test]
    fn service_joins_with_single_slash() {
        assert_eq!(service("a.example.com", "b"), "//a.example.com/b");
        assert_eq!(service("a.example.com/", "/b"), "//a.example.com/b");
        assert_eq!(service("host", "share/sub"), "//host/share/sub");
    }

    #[test]
    fn no_options_omits_dash_o() {
        let cmd = ShareCommandBuilder::new().build(&record(MountOptions::new()));
        assert_eq!(cmd.mount, "mount -t cifs //h/s /m");
        assert_eq!(cmd.umount, "umount /m");
        assert_eq!(cmd.redacted(), cmd.mount);
    }

    #[test]
    fn bare_flag_option() {
        let options: MountOptions = [("foo", None::<String>)].into_iter().collect();
        let cmd = ShareCommandBuilder::new().build(&record(options));
        assert_eq!(cmd.mount, "mount -t cifs //h/s /m -o foo");
    }

    #[test]
    fn credentials_and_uid_are_appended() {
        let options: MountOptions = [("vers", Some("3.0".to_string()))].into_iter().collect();
        let creds = Credentials {
            username: "dom".to_string(),
            password: "pw".to_string(),
        };
        let cmd = ShareCommandBuilder::new()
            .credentials(Some(&creds))
            .host_user(Some("alice"))
            .build(&record(options));
        assert_eq!(
            cmd.mount,
            "mount -t cifs //h/s /m -o vers=3.0,username=dom,password=pw,uid=alice"
        );
        assert_eq!(
            cmd.redacted(),
            "mount -t cifs //h/s /m -o vers=3.0,username=dom,password=******,uid=alice"
        );
    }

    #[test]
    fn record_credentials_beat_prompted_ones() {
        let mut rec = record(MountOptions::new());
        rec.username = Some("carol".to_string());
        let creds = Credentials {
            username: "dom".to_string(),
            password: "pw".to_string(),
        };
        let cmd = ShareCommandBuilder::new()
            .credentials(Some(&creds))
            .build(&rec);
        assert_eq!(cmd.mount, "mount -t cifs //h/s /m -o username=carol,password=pw");
    }

    #[test]
    fn explicit_uid_option_is_kept() {
        let options: MountOptions = [("uid", Some("1000".to_string()))].into_iter().collect();
        let cmd = ShareCommandBuilder::new()
            .host_user(Some("alice"))
            .build(&record(options));
        assert_eq!(cmd.mount, "mount -t cifs //h/s /m -o uid=1000");
    }
}
