use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::secrets::SecretStore;

/// Domain login used for shares without credentials of their own.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

impl Credentials {
    /// Rejects empty usernames and passwords.
    pub fn new(username: String, password: String) -> Result<Self> {
        if username.trim().is_empty() {
            return Err(Error::EmptyUsername);
        }
        if password.is_empty() {
            return Err(Error::EmptyPassword);
        }
        Ok(Self {
            username: username.trim().to_string(),
            password,
        })
    }
}

/// Source of domain credentials.
#[async_trait]
pub trait CredentialPrompt {
    async fn domain_credentials(&self, default_user: &str) -> Result<Credentials>;
}

/// Asks on the terminal; the password is read without echo.
pub struct TerminalPrompt;

#[async_trait]
impl CredentialPrompt for TerminalPrompt {
    async fn domain_credentials(&self, default_user: &str) -> Result<Credentials> {
        let default_user = default_user.to_string();
        tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let username = read_username(&mut stdin.lock(), &mut std::io::stderr(), &default_user)?;

            eprint!("Domain password: ");
            std::io::stderr().flush()?;
            let password = rpassword::read_password()?;

            Credentials::new(username, password)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

fn read_username(
    input: &mut impl BufRead,
    output: &mut impl Write,
    default_user: &str,
) -> Result<String> {
    write!(output, "Domain username [{}]: ", default_user)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let line = line.trim();
    Ok(if line.is_empty() {
        default_user.to_string()
    } else {
        line.to_string()
    })
}

/// Looks credentials up in the Secret Service first, then falls back to another prompt.
pub struct KeyringPrompt<P> {
    profile: String,
    fallback: P,
}

impl<P> KeyringPrompt<P> {
    pub fn new(profile: impl Into<String>, fallback: P) -> Self {
        Self {
            profile: profile.into(),
            fallback,
        }
    }
}

#[async_trait]
impl<P: CredentialPrompt + Send + Sync> CredentialPrompt for KeyringPrompt<P> {
    async fn domain_credentials(&self, default_user: &str) -> Result<Credentials> {
        match lookup(&self.profile).await {
            Ok(Some(credentials)) => {
                info!("Using domain credentials stored for profile '{}'", self.profile);
                Ok(credentials)
            }
            Ok(None) => {
                debug!("No credentials stored for profile '{}'", self.profile);
                self.fallback.domain_credentials(default_user).await
            }
            Err(e) => {
                debug!("Keyring unavailable: {}", e);
                self.fallback.domain_credentials(default_user).await
            }
        }
    }
}

async fn lookup(profile: &str) -> Result<Option<Credentials>> {
    let store = SecretStore::new().await?;
    store.load_credentials(profile).await
}
