use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Names of the fields that are empty or whitespace only.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.endpoint.trim().is_empty() {
            missing.push("endpoint");
        }
        if self.access_key.trim().is_empty() {
            missing.push("access key");
        }
        if self.secret_key.trim().is_empty() {
            missing.push("secret key");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

// Keeps secrets out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// The credentials the browser connects with.
///
/// Only a complete submission replaces the stored value, so other components
/// never observe a half-edited set.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<Credentials>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded from configuration. Incomplete seeds are ignored.
    pub fn seeded(credentials: Option<Credentials>) -> Self {
        Self {
            current: credentials.filter(Credentials::is_complete),
        }
    }

    pub fn current(&self) -> Option<&Credentials> {
        self.current.as_ref()
    }

    pub fn submit(
        &mut self,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Credentials> {
        let candidate = Credentials::new(endpoint.trim(), access_key.trim(), secret_key.trim());
        if !candidate.is_complete() {
            return Err(BrowserError::Validation(
                "Endpoint, Access Key and Secret Key are required".to_string(),
            ));
        }
        self.current = Some(candidate.clone());
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_rejects_any_empty_field() {
        let mut store = CredentialStore::new();
        assert!(store.submit("", "key", "secret").is_err());
        assert!(store.submit("http://s3", "  ", "secret").is_err());
        assert!(store.submit("http://s3", "key", "").is_err());
        assert!(store.current().is_none());
    }

    #[test]
    fn failed_submit_keeps_previous_credentials() {
        let mut store = CredentialStore::new();
        store.submit("http://s3", "key", "secret").unwrap();
        let err = store.submit("http://other", "", "secret").unwrap_err();
        assert!(matches!(err, BrowserError::Validation(_)));
        assert_eq!(store.current().unwrap().endpoint, "http://s3");
    }

    #[test]
    fn submit_replaces_credentials() {
        let mut store = CredentialStore::seeded(Some(Credentials::new("http://a", "k", "s")));
        let committed = store.submit(" http://b ", "k2", "s2").unwrap();
        assert_eq!(committed, Credentials::new("http://b", "k2", "s2"));
        assert_eq!(store.current(), Some(&committed));
    }

    #[test]
    fn incomplete_seed_is_ignored() {
        let store = CredentialStore::seeded(Some(Credentials::new("http://a", "", "s")));
        assert!(store.current().is_none());
    }

    #[test]
    fn debug_output_hides_secret() {
        let creds = Credentials::new("http://a", "key", "topsecret");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("topsecret"));
    }
}
