use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One configured network share, as read from a config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareRecord {
    pub name: String,
    pub hostname: String,
    pub share: String,
    /// Always absolute once the config reader has produced the record.
    pub mountpoint: PathBuf,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub options: MountOptions,
    pub hook_pre_command: Option<String>,
    pub hook_post_command: Option<String>,
}

impl ShareRecord {
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Ordered `-o` mount options. A `None` value is a bare flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MountOptions(IndexMap<String, Option<String>>);

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an option. An existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.insert(key.into(), value);
    }

    /// Inserts an option only when the key is not already present.
    pub fn insert_default(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.entry(key.into()).or_insert(value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Reads `-o k1=v1,k2` (the leading `-o` is optional) back into options.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let body = text.strip_prefix("-o").unwrap_or(text).trim();

        let mut options = Self::new();
        for item in body.split(',').filter(|item| !item.is_empty()) {
            match item.split_once('=') {
                Some((key, value)) => options.insert(key, Some(value.to_string())),
                None => options.insert(item, None),
            }
        }
        options
    }
}

impl fmt::Display for MountOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }

        f.write_str("-o ")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match value {
                Some(value) => write!(f, "{}={}", key, value)?,
                None => f.write_str(key)?,
            }
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for MountOptions {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}
