//! Reads the INI file that describes the shares to mount.
//!
//! Every section is one share. The keys `hostname`, `share`, `mountpoint`,
//! `username`, `password`, `hook_pre_command` and `hook_post_command` are
//! understood; any other key is passed through to `mount` as an `-o` option.

use configparser::ini::Ini;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::settings::expand_tilde;
use crate::share::{MountOptions, ShareRecord};

/// Section whose keys apply to every share.
const DEFAULT_SECTION: &str = "DEFAULT";

pub fn read_shares(path: &Path, home: &Path) -> Result<Vec<ShareRecord>> {
    debug!("Reading shares from {:?}", path);

    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        warn!("Config file is empty: {:?}", path);
        return Ok(Vec::new());
    }

    parse_shares(&content, home).map_err(|e| match e {
        Error::ConfigParse { reason, .. } => Error::ConfigParse {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

pub fn parse_shares(content: &str, home: &Path) -> Result<Vec<ShareRecord>> {
    // Only whole-line comments: passwords may contain `#` or `;`.
    let mut defaults = Ini::new_cs().defaults();
    defaults.default_section = DEFAULT_SECTION.to_string();
    defaults.enable_inline_comments = false;
    let mut conf = Ini::new_from_defaults(defaults);

    let sections = conf.read(content.to_string()).map_err(|reason| Error::ConfigParse {
        path: PathBuf::new(),
        reason,
    })?;

    let defaults: Vec<(String, Option<String>)> = sections
        .get(DEFAULT_SECTION)
        .map(|entries| {
            entries
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    let mut shares = Vec::new();
    for (name, entries) in sections.iter() {
        if name == DEFAULT_SECTION {
            continue;
        }

        // Section keys override defaults but defaults keep their position.
        let mut merged: indexmap::IndexMap<String, Option<String>> =
            defaults.iter().cloned().collect();
        for (key, value) in entries.iter() {
            merged.insert(key.to_lowercase(), value.clone());
        }

        let record = build_record(name, merged, home)?;
        debug!(
            "Parsed share [{}]: //{}/{} -> {:?}",
            record.name, record.hostname, record.share, record.mountpoint
        );
        shares.push(record);
    }

    Ok(shares)
}

fn build_record(
    name: &str,
    entries: indexmap::IndexMap<String, Option<String>>,
    home: &Path,
) -> Result<ShareRecord> {
    let mut hostname = None;
    let mut share = None;
    let mut mountpoint = None;
    let mut embedded_username = None;
    let mut embedded_password = None;
    let mut username = None;
    let mut password = None;
    let mut hook_pre_command = None;
    let mut hook_post_command = None;
    let mut options = MountOptions::new();

    for (key, value) in entries {
        let value = value.filter(|v| !v.is_empty());
        match key.as_str() {
            "hostname" => {
                if let Some(value) = value {
                    let parsed = split_hostname(&value);
                    hostname = Some(parsed.host);
                    embedded_username = parsed.username;
                    embedded_password = parsed.password;
                }
            }
            "share" => share = value,
            "mountpoint" => mountpoint = value,
            "username" => username = value,
            "password" => password = value,
            "hook_pre_command" => hook_pre_command = value,
            "hook_post_command" => hook_post_command = value,
            _ => options.insert(key, value),
        }
    }

    let hostname = hostname.ok_or_else(|| Error::MissingField {
        share: name.to_string(),
        field: "hostname",
    })?;
    let share = share.ok_or_else(|| Error::MissingField {
        share: name.to_string(),
        field: "share",
    })?;
    let mountpoint = resolve_mountpoint(mountpoint.as_deref(), &hostname, &share, home);

    Ok(ShareRecord {
        name: name.to_string(),
        hostname,
        share,
        mountpoint,
        username: username.or(embedded_username),
        password: password.or(embedded_password),
        options,
        hook_pre_command,
        hook_post_command,
    })
}

#[derive(Debug, PartialEq, Eq)]
struct HostSpec {
    host: String,
    username: Option<String>,
    password: Option<String>,
}

/// Splits `user[:password]@host`. The rightmost `@` separates the host.
fn split_hostname(value: &str) -> HostSpec {
    let Some((credentials, host)) = value.rsplit_once('@') else {
        return HostSpec {
            host: value.to_string(),
            username: None,
            password: None,
        };
    };

    let unquote = |s: &str| s.trim_matches('"').to_string();
    let (username, password) = match credentials.split_once(':') {
        Some((user, pass)) => (unquote(user), Some(unquote(pass))),
        None => (unquote(credentials), None),
    };

    HostSpec {
        host: host.to_string(),
        username: Some(username),
        password,
    }
}

/// Absent mountpoints live under `<home>/<hostname>/<share>`, relative ones under `<home>`.
fn resolve_mountpoint(
    mountpoint: Option<&str>,
    hostname: &str,
    share: &str,
    home: &Path,
) -> PathBuf {
    match mountpoint {
        None => home.join(hostname).join(share.trim_start_matches('/')),
        Some(path) => {
            let path = expand_tilde(path, home);
            if path.is_absolute() {
                path
            } else {
                home.join(path)
            }
        }
    }
}
