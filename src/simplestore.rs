use async_trait::async_trait;
use std::sync::Mutex;
use time::{Duration, OffsetDateTime};
use yup_oauth2::error::TokenStorageError;
use yup_oauth2::storage::{TokenInfo, TokenStorage};

/// In-memory token storage seeded from the access/refresh token pair in
/// the config file. Tokens refreshed by the authenticator replace the seed
/// for the lifetime of the store.
pub struct SimpleTokenStore {
    token: Mutex<Option<TokenInfo>>,
}

impl SimpleTokenStore {
    pub fn seeded(access_token: &str, refresh_token: &str, expires_in: i64) -> Self {
        let access_token = Some(access_token.to_string()).filter(|t| !t.is_empty());
        // no access token yet: mark expired so the refresh token is used
        let expires_in = if access_token.is_some() { expires_in } else { 0 };
        Self {
            token: Mutex::new(Some(TokenInfo {
                access_token,
                refresh_token: Some(refresh_token.to_string()),
                expires_at: Some(OffsetDateTime::now_utc() + Duration::seconds(expires_in)),
                id_token: None,
            })),
        }
    }
}

#[async_trait]
impl TokenStorage for SimpleTokenStore {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> Result<(), TokenStorageError> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token);
        }
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.token.lock().ok().and_then(|slot| slot.clone())
    }
}
