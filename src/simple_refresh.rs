use crate::config::OauthConfig;
use crate::error::{DocParseError, Result};
use serde::Deserialize;
use tracing::{info, warn};
use urlencoding::encode;

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Exchange the stored refresh token for a new access token.
pub async fn manual_refresh(client: &reqwest::Client, oauth: &OauthConfig) -> Result<TokenResponse> {
    info!(token_url = %oauth.token_url, "Refreshing OAuth access token");

    let resp = client
        .post(&oauth.token_url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(refresh_body(oauth))
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let error_text = resp.text().await.unwrap_or_default();
        warn!(status = %status, "Token refresh rejected");
        return Err(DocParseError::Auth(format!("token refresh {status}: {error_text}")));
    }

    let token_resp: TokenResponse = resp.json().await?;
    info!(expires_in = token_resp.expires_in, "Access token refreshed");
    Ok(token_resp)
}

fn refresh_body(oauth: &OauthConfig) -> String {
    format!(
        "client_id={}&client_secret={}&refresh_token={}&grant_type=refresh_token",
        encode(&oauth.client_id),
        encode(&oauth.client_secret),
        encode(&oauth.tokens.refresh_token),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tokens;

    #[test]
    fn test_refresh_body_is_form_encoded() {
        let oauth = OauthConfig {
            client_id: "id.apps.googleusercontent.com".to_string(),
            client_secret: "s3cr&t".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            tokens: Tokens {
                refresh_token: "1//abc=".to_string(),
                access_token: String::new(),
            },
        };
        assert_eq!(
            refresh_body(&oauth),
            "client_id=id.apps.googleusercontent.com&client_secret=s3cr%26t&refresh_token=1%2F%2Fabc%3D&grant_type=refresh_token"
        );
    }
}
