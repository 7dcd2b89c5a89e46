use super::Result;
use std::env;

#[cfg(not(test))]
use keyring::Entry;

/// Per-profile session credential, backed by the OS keyring. A token from
/// the environment takes priority over the stored one.
#[derive(Debug, Clone)]
pub struct Credentials {
    session_token: Option<String>,
    pub profile_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenSource {
    Environment,
    Keyring,
}

impl Credentials {
    pub fn new(profile_name: String) -> Self {
        Self {
            session_token: None,
            profile_name,
        }
    }

    pub fn load(profile_name: &str) -> Result<Self> {
        let mut credentials = Self::new(profile_name.to_string());
        credentials.session_token = credentials.load_entry("session")?;
        Ok(credentials)
    }

    #[cfg(not(test))]
    fn load_entry(&self, key_type: &str) -> Result<Option<String>> {
        let entry = Entry::new("anv-cli", &format!("{}-{}", key_type, self.profile_name))
            .map_err(|e| crate::error::StorageError::KeyringError(e.to_string()))?;

        match entry.get_password() {
            Ok(v) => Ok(Some(v)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(crate::error::StorageError::KeyringError(e.to_string())),
        }
    }

    #[cfg(test)]
    fn load_entry(&self, _key_type: &str) -> Result<Option<String>> {
        Ok(None) // Mock implementation for tests
    }

    pub fn save_session_for_profile(profile_name: &str, token: &str) -> Result<()> {
        let mut credentials = Self::new(profile_name.to_string());
        credentials.session_token = Some(token.to_string());
        credentials.save_entry("session", &credentials.session_token)?;
        Ok(())
    }

    pub fn clear_session_for_profile(profile_name: &str) -> Result<()> {
        let credentials = Self::new(profile_name.to_string());
        credentials.delete_entry("session")?;
        Ok(())
    }

    #[cfg(not(test))]
    fn save_entry(&self, key_type: &str, value: &Option<String>) -> Result<()> {
        if let Some(v) = value {
            let key_name = format!("{}-{}", key_type, self.profile_name);
            let entry = Entry::new("anv-cli", &key_name)
                .map_err(|e| crate::error::StorageError::KeyringError(e.to_string()))?;
            entry
                .set_password(v)
                .map_err(|e| crate::error::StorageError::KeyringError(e.to_string()))?;
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn delete_entry(&self, key_type: &str) -> Result<()> {
        let key_name = format!("{}-{}", key_type, self.profile_name);
        let entry = Entry::new("anv-cli", &key_name)
            .map_err(|e| crate::error::StorageError::KeyringError(e.to_string()))?;

        match entry.delete_credential() {
            Ok(_) => Ok(()),
            // Entry doesn't exist, which is fine for logout
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(crate::error::StorageError::KeyringError(e.to_string())),
        }
    }

    #[cfg(test)]
    fn save_entry(&self, _key_type: &str, _value: &Option<String>) -> Result<()> {
        Ok(()) // Mock implementation for tests
    }

    #[cfg(test)]
    fn delete_entry(&self, _key_type: &str) -> Result<()> {
        Ok(()) // Mock implementation for tests
    }

    #[cfg(not(test))]
    fn env_token() -> Option<String> {
        env::var("ANV_SESSION_TOKEN").ok().filter(|t| !t.is_empty())
    }

    #[cfg(test)]
    fn env_token() -> Option<String> {
        env::var("TEST_ANV_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
    }

    pub fn token_source(&self) -> TokenSource {
        if Self::env_token().is_some() {
            TokenSource::Environment
        } else {
            TokenSource::Keyring
        }
    }

    /// The effective session token: environment first, then keyring.
    pub fn get_session_token(&self) -> Option<String> {
        Self::env_token().or_else(|| self.session_token.clone())
    }
}
