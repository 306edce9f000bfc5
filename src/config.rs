use crate::error::{DocParseError, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use toml_edit::{DocumentMut, Item, value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub document_ai: DocumentAiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Serve a stored result again when the same PDF bytes come back.
    #[serde(default = "default_true")]
    pub reuse_cached: bool,
    /// File this config was loaded from; refreshed tokens are written back here.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_db_path() -> String {
    "docstore/documents.db".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3001".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentAiConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub processor_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    pub auth: AuthConfig,
}

fn default_location() -> String {
    "eu".to_string()
}

fn default_endpoint() -> String {
    "eu-documentai.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> usize {
    2
}

fn default_initial_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Service-account JSON key, the usual setup for Document AI.
    ServiceAccount { credentials_path: String },
    /// Installed-app OAuth client with a stored refresh token.
    Oauth(OauthConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    pub tokens: Tokens,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tokens {
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.source_path = Some(path.as_ref().to_path_buf());
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `GOOGLE_*` and `PORT` take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok().filter(|v| !v.is_empty()));
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("GOOGLE_PROJECT_ID") {
            self.document_ai.project_id = v;
        }
        if let Some(v) = lookup("GOOGLE_PROCESSOR_ID") {
            self.document_ai.processor_id = v;
        }
        if let Some(v) = lookup("GOOGLE_LOCATION") {
            self.document_ai.location = v;
        }
        if let Some(v) = lookup("GOOGLE_CREDENTIALS_PATH") {
            if let AuthConfig::ServiceAccount { credentials_path } = &mut self.document_ai.auth {
                *credentials_path = v;
            }
        }
        if let Some(port) = lookup("PORT") {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map_or(self.server.bind.as_str(), |(host, _)| host);
            self.server.bind = format!("{host}:{port}");
        }
    }

    /// Persist a refreshed OAuth access token without disturbing the rest
    /// of the file.
    pub fn update_access_token(path: impl AsRef<Path>, new_token: &str) -> Result<()> {
        let content = fs::read_to_string(&path)?;
        let updated = Self::with_access_token(&content, new_token)?;
        fs::write(&path, updated)?;
        Ok(())
    }

    fn with_access_token(content: &str, new_token: &str) -> Result<String> {
        let mut doc = content.parse::<DocumentMut>()?;
        // get_mut on a missing key inserts it, so look before touching
        let has_tokens = doc
            .get("document_ai")
            .and_then(|d| d.get("auth"))
            .and_then(|a| a.get("tokens"))
            .and_then(Item::as_table_like)
            .is_some();
        if !has_tokens {
            return Err(DocParseError::Config("no [document_ai.auth.tokens] table".into()));
        }
        doc["document_ai"]["auth"]["tokens"]["access_token"] = value(new_token);
        Ok(doc.to_string())
    }
}

impl DocumentAiConfig {
    pub fn process_url(&self) -> Result<String> {
        if self.project_id.is_empty() || self.processor_id.is_empty() {
            return Err(DocParseError::MissingProcessor);
        }
        Ok(format!(
            "https://{}/v1/projects/{}/locations/{}/processors/{}:process",
            self.endpoint, self.project_id, self.location, self.processor_id
        ))
    }
}
