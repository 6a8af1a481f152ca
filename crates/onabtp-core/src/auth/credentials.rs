use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "onabtp";

/// Odoo passwords in the OS keychain, one entry per database and login.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(database: &str, login: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &format!("{}:{}", database, login))
            .context("Failed to create keyring entry")
    }

    /// Store the password for a login in the OS keychain
    pub fn store(database: &str, login: &str, password: &str) -> Result<()> {
        Self::entry(database, login)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for a login from the OS keychain
    pub fn get_password(database: &str, login: &str) -> Result<String> {
        Self::entry(database, login)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored password for a login
    pub fn delete(database: &str, login: &str) -> Result<()> {
        Self::entry(database, login)?
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    pub fn has_credentials(database: &str, login: &str) -> bool {
        Self::entry(database, login)
            .and_then(|entry| entry.get_password().map_err(Into::into))
            .is_ok()
    }
}
