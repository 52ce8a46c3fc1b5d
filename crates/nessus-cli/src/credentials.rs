use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "pynessus";

/// Scanner passwords in the OS keychain, one entry per `user@server`.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(server: &str, username: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &format!("{}@{}", username, server))
            .context("Failed to create keyring entry")
    }

    /// Store a password in the OS keychain
    pub fn store(server: &str, username: &str, password: &str) -> Result<()> {
        Self::entry(server, username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Retrieve a password from the OS keychain
    pub fn get_password(server: &str, username: &str) -> Result<String> {
        Self::entry(server, username)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored password
    pub fn delete(server: &str, username: &str) -> Result<()> {
        Self::entry(server, username)?
            .delete_credential()
            .context("Failed to delete credential from keychain")
    }
}
