use crate::config::{AuthConfig, Config, OauthConfig};
use crate::error::{DocParseError, Result};
use crate::simple_refresh::manual_refresh;
use crate::simplestore::SimpleTokenStore;
use std::env;
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::info;
use yup_oauth2::{
    AccessToken, ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
    ServiceAccountAuthenticator,
};

const SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Assumed lifetime of an access token read back from the config file.
const CACHED_TOKEN_TTL: i64 = 3599;

/// Tokens this close to expiry are fetched again.
const EXPIRY_MARGIN: Duration = Duration::seconds(60);

struct CachedToken {
    token: String,
    expires_at: Option<OffsetDateTime>,
}

impl CachedToken {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|at| at - EXPIRY_MARGIN > now)
    }
}

/// Hands out bearer tokens for Document AI, fetching a new one only when
/// the last is about to expire.
pub struct TokenSource {
    auth: AuthConfig,
    config_path: Option<PathBuf>,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(cfg: &Config, http: reqwest::Client) -> Self {
        Self {
            auth: cfg.document_ai.auth.clone(),
            config_path: cfg.source_path.clone(),
            http,
            cached: Mutex::new(None),
        }
    }

    pub async fn bearer(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(c) = cached.as_ref().filter(|c| c.is_fresh(OffsetDateTime::now_utc())) {
            return Ok(c.token.clone());
        }

        let access = match &self.auth {
            AuthConfig::ServiceAccount { credentials_path } => {
                service_account_token(credentials_path).await?
            }
            AuthConfig::Oauth(oauth) => self.oauth_token(oauth).await?,
        };
        let token = access
            .token()
            .ok_or_else(|| DocParseError::Auth("authenticator returned no access token".into()))?
            .to_string();

        info!(expires_at = ?access.expiration_time(), "Obtained Document AI access token");
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: access.expiration_time(),
        });
        Ok(token)
    }

    async fn oauth_token(&self, oauth: &OauthConfig) -> Result<AccessToken> {
        let (tok, ttl) = if env::var("REFRESH").is_ok_and(|v| v == "1") {
            let token = manual_refresh(&self.http, oauth).await?;
            if let Some(path) = &self.config_path {
                Config::update_access_token(path, &token.access_token)?;
                info!(path = %path.display(), "Stored refreshed access token");
            }
            (token.access_token, token.expires_in)
        } else {
            (oauth.tokens.access_token.clone(), CACHED_TOKEN_TTL)
        };

        let secret = ApplicationSecret {
            client_id: oauth.client_id.clone(),
            client_secret: oauth.client_secret.clone(),
            token_uri: oauth.token_url.clone(),
            auth_uri: oauth.auth_url.clone(),
            redirect_uris: vec!["http://localhost".to_string()],
            project_id: None,
            client_email: None,
            auth_provider_x509_cert_url: None,
            client_x509_cert_url: None,
        };

        let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
            .with_storage(Box::new(SimpleTokenStore::seeded(
                &tok,
                &oauth.tokens.refresh_token,
                ttl,
            )))
            .build()
            .await?;

        auth.token(SCOPES)
            .await
            .map_err(|e| DocParseError::Auth(e.to_string()))
    }
}

async fn service_account_token(credentials_path: &str) -> Result<AccessToken> {
    let key = yup_oauth2::read_service_account_key(credentials_path)
        .await
        .map_err(|e| DocParseError::Auth(format!("reading {credentials_path}: {e}")))?;
    let auth = ServiceAccountAuthenticator::builder(key).build().await?;
    auth.token(SCOPES)
        .await
        .map_err(|e| DocParseError::Auth(e.to_string()))
}
