use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::session::Prompter;
use crate::GrabError;

/// Client id shipped with spotdl and shared by every user, which is what gets rate limited
pub const SHARED_CLIENT_ID: &str = "f8a606e5583643beaa27ce62c48e3fc1";

/// Spotify developer credentials used by spotdl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl SpotifyCredentials {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        let client_id = client_id.trim();
        let client_secret = client_secret.trim();

        if client_id.is_empty() || client_secret.is_empty() {
            return Err(GrabError::InvalidCredentials(
                "client id and client secret are both required".to_string(),
            )
            .into());
        }

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    pub fn is_shared_default(&self) -> bool {
        self.client_id == SHARED_CLIENT_ID
    }
}

/// spotdl's JSON config file, of which only the credential keys are managed here.
/// Every other key is kept as-is when the file is rewritten.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.spotdl/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".spotdl").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content =
            fs_err::read_to_string(&self.path).context("Failed to read spotdl config file")?;

        match serde_json::from_str::<Value>(&content).context("Failed to parse spotdl config file")? {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("spotdl config file is not a JSON object: {}", self.path.display()),
        }
    }

    /// Read stored credentials, `None` when the file or either key is missing
    pub fn load(&self) -> Result<Option<SpotifyCredentials>> {
        let document = self.read_document()?;

        let field = |key: &str| {
            document
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        Ok(match (field("client_id"), field("client_secret")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            }),
            _ => None,
        })
    }

    /// Write credentials, enabling `load_config` and preserving unrelated keys
    pub fn save(&self, credentials: &SpotifyCredentials) -> Result<()> {
        let mut document = self.read_document()?;

        document.insert("client_id".into(), Value::String(credentials.client_id.clone()));
        document.insert(
            "client_secret".into(),
            Value::String(credentials.client_secret.clone()),
        );
        document.insert("load_config".into(), Value::Bool(true));

        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&Value::Object(document))
            .context("Failed to serialize spotdl config")?;
        fs_err::write(&self.path, content).context("Failed to write spotdl config file")?;

        tracing::debug!("Saved Spotify credentials to {}", self.path.display());
        Ok(())
    }

    /// True when credentials other than spotdl's shared ones are on file
    pub fn has_custom_credentials(&self) -> bool {
        match self.load() {
            Ok(Some(credentials)) => !credentials.is_shared_default(),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Ignoring unreadable spotdl config: {:#}", e);
                false
            }
        }
    }

    /// Walk the user through creating a Spotify app and store its credentials.
    ///
    /// Returns whether custom credentials are configured afterwards.
    pub fn setup_interactive<R: BufRead, W: Write>(
        &self,
        prompter: &mut Prompter<R, W>,
    ) -> Result<bool> {
        prompter.say("\n🔧 Setting up Spotify credentials to avoid rate limiting...")?;
        prompter.say("\n📋 To get your own Spotify credentials:")?;
        prompter.say("1. Go to: https://developer.spotify.com/dashboard")?;
        prompter.say("2. Log in with your Spotify account")?;
        prompter.say("3. Click 'Create App'")?;
        prompter.say("4. Fill in any app name (e.g., 'My Music Downloader')")?;
        prompter.say("5. Add redirect URI: http://localhost:8080/callback")?;
        prompter.say("6. Copy your Client ID and Client Secret")?;
        prompter.say(format!("\n📁 Config will be saved to: {}", self.path.display()))?;

        if self.exists() {
            prompter.say("\n✅ Found existing config file")?;
            if let Some(credentials) = self.load()? {
                if !credentials.is_shared_default() {
                    prompter.say("✅ Custom credentials already configured!")?;
                    return Ok(true);
                }
                prompter.say("⚠️ Using default shared credentials (causes rate limiting)")?;
            }
        }

        if !prompter.confirm("\nSet up your own Spotify credentials now? (y/n): ")? {
            prompter.say("⚠️ Continuing with shared credentials (may hit rate limits)")?;
            return Ok(false);
        }

        prompter.say("\nEnter your Spotify Developer credentials:")?;
        let client_id = prompter.ask("Client ID: ")?.unwrap_or_default();
        let client_secret = prompter.ask("Client Secret: ")?.unwrap_or_default();

        let credentials = match SpotifyCredentials::new(&client_id, &client_secret) {
            Ok(credentials) => credentials,
            Err(_) => {
                prompter.say("❌ Invalid credentials. Continuing with defaults.")?;
                return Ok(false);
            }
        };

        self.save(&credentials)?;
        prompter.say("✅ Credentials saved successfully!")?;
        Ok(true)
    }

    /// Print the stored credentials with the secret masked
    pub fn display(&self) -> Result<()> {
        println!("spotdl config: {}", self.path.display());
        match self.load()? {
            Some(credentials) => {
                println!("  Client ID: {}", credentials.client_id);
                println!("  Client Secret: {}", mask_secret(&credentials.client_secret));
                if credentials.is_shared_default() {
                    println!("  ⚠️ These are spotdl's shared credentials (may hit rate limits)");
                }
            }
            None => println!("  No credentials configured"),
        }
        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{}{}", "*".repeat(secret.chars().count().saturating_sub(4)), visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join(".spotdl").join("config.json"))
    }

    #[test]
    fn test_credentials_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let credentials = SpotifyCredentials::new("my-client-id", "my-secret").unwrap();
        store.save(&credentials).unwrap();

        assert_eq!(store.load().unwrap(), Some(credentials));
        assert!(store.has_custom_credentials());
    }

    #[test]
    fn test_save_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs_err::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs_err::write(store.path(), r#"{"audio_providers": ["youtube"], "threads": 4}"#).unwrap();

        store
            .save(&SpotifyCredentials::new("id", "secret").unwrap())
            .unwrap();

        let document: Value =
            serde_json::from_str(&fs_err::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(document["threads"], 4);
        assert_eq!(document["audio_providers"][0], "youtube");
        assert_eq!(document["load_config"], true);
        assert_eq!(document["client_id"], "id");
    }

    #[test]
    fn test_missing_file_has_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load().unwrap(), None);
        assert!(!store.has_custom_credentials());
    }

    #[test]
    fn test_shared_default_is_not_custom() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&SpotifyCredentials::new(SHARED_CLIENT_ID, "shared").unwrap())
            .unwrap();

        assert!(!store.has_custom_credentials());
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(SpotifyCredentials::new("  ", "secret").is_err());
        assert!(SpotifyCredentials::new("id", "").is_err());
    }

    #[test]
    fn test_setup_interactive_saves_entered_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("y\nabc123\nsecret456\n"), &mut output);

        assert!(store.setup_interactive(&mut prompter).unwrap());
        assert_eq!(
            store.load().unwrap(),
            Some(SpotifyCredentials::new("abc123", "secret456").unwrap())
        );
    }

    #[test]
    fn test_setup_interactive_declined_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("n\n"), &mut output);

        assert!(!store.setup_interactive(&mut prompter).unwrap());
        assert!(!store.exists());
    }

    #[test]
    fn test_setup_interactive_skips_when_custom_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&SpotifyCredentials::new("custom", "secret").unwrap())
            .unwrap();
        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new(""), &mut output);

        assert!(store.setup_interactive(&mut prompter).unwrap());
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("Custom credentials already configured"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
        assert_eq!(mask_secret("abc"), "abc");
    }
}
