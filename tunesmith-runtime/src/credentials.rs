use anyhow::Context;
use thiserror::Error;
use tunesmith_providers::spotify::ClientCredentials;

/// Where we store secrets in the OS keyring.
///
/// This is intentionally constant so upgrades don't orphan secrets.
const SERVICE: &str = "tunesmith";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    GoogleApiKey,
    SpotifyClientId,
    SpotifyClientSecret,
}

impl SecretKey {
    pub const ALL: [SecretKey; 3] = [
        SecretKey::GoogleApiKey,
        SecretKey::SpotifyClientId,
        SecretKey::SpotifyClientSecret,
    ];

    /// Environment variable consulted before the keyring.
    pub fn env_var(self) -> &'static str {
        match self {
            SecretKey::GoogleApiKey => "GOOGLE_API_KEY",
            SecretKey::SpotifyClientId => "SPOTIFY_CLIENT_ID",
            SecretKey::SpotifyClientSecret => "SPOTIFY_CLIENT_SECRET",
        }
    }

    fn user(self) -> &'static str {
        match self {
            SecretKey::GoogleApiKey => "google_api_key",
            SecretKey::SpotifyClientId => "spotify_client_id",
            SecretKey::SpotifyClientSecret => "spotify_client_secret",
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("missing credential: set {0}")]
    Missing(&'static str),
}

pub fn get_secret(key: SecretKey) -> anyhow::Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;

    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
    }
}

/// API credentials for the inference and catalog services.
///
/// Missing values are only an error once a collaborator actually needs them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    google_api_key: Option<String>,
    spotify_client_id: Option<String>,
    spotify_client_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn presence(v: &Option<String>) -> &'static str {
            if v.is_some() { "[REDACTED]" } else { "<unset>" }
        }
        f.debug_struct("Credentials")
            .field("google_api_key", &presence(&self.google_api_key))
            .field("spotify_client_id", &self.spotify_client_id)
            .field("spotify_client_secret", &presence(&self.spotify_client_secret))
            .finish()
    }
}

impl Credentials {
    /// Builds credentials from an arbitrary lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(SecretKey) -> Option<String>) -> Self {
        let get = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());
        Self {
            google_api_key: get(SecretKey::GoogleApiKey),
            spotify_client_id: get(SecretKey::SpotifyClientId),
            spotify_client_secret: get(SecretKey::SpotifyClientSecret),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key.env_var()).ok())
    }

    /// Environment first, then the OS keyring. Keyring failures are logged and skipped.
    pub fn load() -> Self {
        Self::from_lookup(|key| {
            if let Ok(v) = std::env::var(key.env_var()) {
                return Some(v);
            }
            match get_secret(key) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("keyring lookup for {} failed: {e:#}", key.env_var());
                    None
                }
            }
        })
    }

    pub fn google_api_key(&self) -> Result<&str, CredentialsError> {
        self.google_api_key
            .as_deref()
            .ok_or(CredentialsError::Missing(SecretKey::GoogleApiKey.env_var()))
    }

    pub fn spotify(&self) -> Result<ClientCredentials, CredentialsError> {
        let client_id = self
            .spotify_client_id
            .clone()
            .ok_or(CredentialsError::Missing(SecretKey::SpotifyClientId.env_var()))?;
        let client_secret = self
            .spotify_client_secret
            .clone()
            .ok_or(CredentialsError::Missing(SecretKey::SpotifyClientSecret.env_var()))?;
        Ok(ClientCredentials {
            client_id,
            client_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Credentials {
        Credentials::from_lookup(|key| {
            Some(match key {
                SecretKey::GoogleApiKey => "g-secret".into(),
                SecretKey::SpotifyClientId => "client".into(),
                SecretKey::SpotifyClientSecret => "s-secret".into(),
            })
        })
    }

    #[test]
    fn lookup_fills_every_field() {
        let creds = full();
        assert_eq!(creds.google_api_key().unwrap(), "g-secret");
        let spotify = creds.spotify().unwrap();
        assert_eq!(spotify.client_id, "client");
        assert_eq!(spotify.client_secret, "s-secret");
    }

    #[test]
    fn blank_values_are_missing() {
        let creds = Credentials::from_lookup(|key| match key {
            SecretKey::SpotifyClientId => Some("client".into()),
            _ => Some("  ".into()),
        });
        assert!(matches!(
            creds.google_api_key(),
            Err(CredentialsError::Missing("GOOGLE_API_KEY"))
        ));
        assert!(matches!(
            creds.spotify(),
            Err(CredentialsError::Missing("SPOTIFY_CLIENT_SECRET"))
        ));
    }

    #[test]
    fn debug_hides_secrets() {
        let s = format!("{:?}", full());
        assert!(!s.contains("g-secret"));
        assert!(!s.contains("s-secret"));
        assert!(s.contains("client"));
        assert!(format!("{:?}", Credentials::default()).contains("<unset>"));
    }

    #[test]
    fn env_var_names() {
        let names: Vec<_> = SecretKey::ALL.iter().map(|k| k.env_var()).collect();
        assert_eq!(
            names,
            vec!["GOOGLE_API_KEY", "SPOTIFY_CLIENT_ID", "SPOTIFY_CLIENT_SECRET"]
        );
    }
}
