use std::ffi::{CStr, CString};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// The user the shares belong to: `SUDO_USER` when run through sudo, else `USER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUser {
    pub name: String,
    pub via_sudo: bool,
}

impl HostUser {
    pub fn current() -> Result<Self> {
        Self::from_env(
            std::env::var("SUDO_USER").ok(),
            std::env::var("USER").ok(),
        )
        .or_else(|_| {
            username_for_uid(unsafe { libc::geteuid() })
                .map(|name| Self {
                    name,
                    via_sudo: false,
                })
                .ok_or(Error::UnknownUser)
        })
    }

    fn from_env(sudo_user: Option<String>, user: Option<String>) -> Result<Self> {
        let nonempty = |v: Option<String>| v.filter(|v| !v.is_empty());
        if let Some(name) = nonempty(sudo_user) {
            return Ok(Self {
                name,
                via_sudo: true,
            });
        }
        nonempty(user)
            .map(|name| Self {
                name,
                via_sudo: false,
            })
            .ok_or(Error::UnknownUser)
    }

    /// Home directory from the passwd database, falling back to `HOME`.
    pub fn home_dir(&self) -> Result<PathBuf> {
        if let Some(home) = home_for_name(&self.name) {
            return Ok(home);
        }
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or(Error::UnknownUser)
    }
}

fn username_for_uid(uid: libc::uid_t) -> Option<String> {
    unsafe {
        let pw = libc::getpwuid(uid);
        if pw.is_null() {
            return None;
        }
        let name = CStr::from_ptr((*pw).pw_name);
        name.to_str().ok().map(|name| name.to_string())
    }
}

fn home_for_name(name: &str) -> Option<PathBuf> {
    let c_name = CString::new(name).ok()?;
    unsafe {
        let pw = libc::getpwnam(c_name.as_ptr());
        if pw.is_null() || (*pw).pw_dir.is_null() {
            return None;
        }
        let dir = CStr::from_ptr((*pw).pw_dir);
        dir.to_str().ok().map(PathBuf::from)
    }
}

/// Whether the process runs with root privileges.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sudo_user_wins() {
        let user = HostUser::from_env(Some("alice".into()), Some("root".into())).unwrap();
        assert_eq!(user.name, "alice");
        assert!(user.via_sudo);
    }

    #[test]
    fn falls_back_to_user() {
        let user = HostUser::from_env(Some(String::new()), Some("bob".into())).unwrap();
        assert_eq!(user.name, "bob");
        assert!(!user.via_sudo);
    }

    #[test]
    fn no_user_is_an_error() {
        assert!(matches!(HostUser::from_env(None, None), Err(Error::UnknownUser)));
    }

    #[test]
    fn unknown_name_has_no_passwd_home() {
        assert_eq!(home_for_name("no-such-user-for-mount-smb-shares"), None);
    }
}
