use secret_service::EncryptionType;
use secret_service::SecretService;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::prompt::Credentials;

const APPLICATION: &str = "mount-smb-shares";

/// Domain credentials kept in the Secret Service (GNOME Keyring, KWallet).
pub struct SecretStore {
    service: SecretService<'static>,
}

fn keyring_err(context: &str) -> impl Fn(secret_service::Error) -> Error + '_ {
    move |e| Error::Keyring(format!("{}: {}", context, e))
}

fn attributes(profile: &str) -> HashMap<&str, &str> {
    let mut attributes = HashMap::new();
    attributes.insert("application", APPLICATION);
    attributes.insert("type", "credentials");
    attributes.insert("profile", profile);
    attributes
}

/// Decodes a stored secret, holding it to the same rules as typed-in credentials.
fn decode_credentials(secret: &[u8]) -> Result<Credentials> {
    let stored: Credentials = serde_json::from_slice(secret)
        .map_err(|e| Error::Keyring(format!("Stored credentials are corrupt: {}", e)))?;
    Credentials::new(stored.username, stored.password)
}

impl SecretStore {
    pub async fn new() -> Result<Self> {
        let service = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(keyring_err("Failed to connect to Secret Service"))?;

        Ok(Self { service })
    }

    pub async fn store_credentials(&self, profile: &str, credentials: &Credentials) -> Result<()> {
        let payload = serde_json::to_string(credentials)
            .map_err(|e| Error::Keyring(format!("Failed to encode credentials: {}", e)))?;

        let collection = self
            .service
            .get_default_collection()
            .await
            .map_err(keyring_err("Failed to get default collection"))?;

        collection
            .create_item(
                &format!("{} credentials: {}", APPLICATION, profile),
                attributes(profile),
                payload.as_bytes(),
                true, // replace existing
                "text/plain",
            )
            .await
            .map_err(keyring_err("Failed to store credentials"))?;

        Ok(())
    }

    pub async fn load_credentials(&self, profile: &str) -> Result<Option<Credentials>> {
        let collection = self
            .service
            .get_default_collection()
            .await
            .map_err(keyring_err("Failed to get default collection"))?;

        let items = collection
            .search_items(attributes(profile))
            .await
            .map_err(keyring_err("Failed to search for credentials"))?;

        let Some(item) = items.first() else {
            return Ok(None);
        };

        let secret = item
            .get_secret()
            .await
            .map_err(keyring_err("Failed to get secret"))?;

        decode_credentials(&secret).map(Some)
    }

    /// Removes stored credentials; returns how many entries were deleted.
    pub async fn clear_credentials(&self, profile: &str) -> Result<usize> {
        let collection = self
            .service
            .get_default_collection()
            .await
            .map_err(keyring_err("Failed to get default collection"))?;

        let items = collection
            .search_items(attributes(profile))
            .await
            .map_err(keyring_err("Failed to search for credentials"))?;

        let count = items.len();
        for item in items {
            item.delete()
                .await
                .map_err(keyring_err("Failed to delete credentials"))?;
        }
        Ok(count)
    }
}
