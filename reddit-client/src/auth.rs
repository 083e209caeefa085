//! App-only OAuth2 for Reddit.
//!
//! Reddit's script/app credentials use the client-credentials grant; there is
//! no refresh token, so an expired token is simply requested again.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use reddify_core::{CoreError, RedditApiError};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct RedditAuth {
    http_client: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    token: Arc<Mutex<Option<RedditToken>>>,
}

impl RedditAuth {
    pub fn new(
        http_client: Client,
        client_id: String,
        client_secret: String,
        token_url: String,
    ) -> Self {
        Self {
            http_client,
            client_id,
            client_secret,
            token_url,
            token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn get_required_scopes() -> Vec<&'static str> {
        vec!["read"]
    }

    /// Current access token, requesting a new one when none is cached or the
    /// cached one is about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Force a token request, replacing any cached token.
    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        let mut cached = self.token.lock().await;
        let token = self.request_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    pub async fn invalidate(&self) {
        debug!("Dropping cached Reddit access token");
        *self.token.lock().await = None;
    }

    pub async fn cached_token(&self) -> Option<RedditToken> {
        self.token.lock().await.clone()
    }

    pub async fn set_token(&self, token: RedditToken) {
        *self.token.lock().await = Some(token);
    }

    fn oauth_client(&self) -> Result<BasicClient, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("Invalid auth URL: {}", e),
            }
        })?;
        let token_url = TokenUrl::new(self.token_url.clone()).map_err(|e| {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("Invalid token URL {}: {}", self.token_url, e),
            })
        })?;

        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            auth_url,
            Some(token_url),
        ))
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        let oauth = self.oauth_client()?;
        let http_client = self.http_client.clone();

        let mut request = oauth.exchange_client_credentials();
        for scope in Self::get_required_scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let response = request
            .request_async(|req| send_oauth_request(http_client, req))
            .await
            .map_err(|e| match e {
                RequestTokenError::Request(e) => {
                    error!("Reddit token request failed: {}", e);
                    e
                }
                RequestTokenError::Parse(e, _) => {
                    error!("Unparseable Reddit token response: {}", e);
                    CoreError::RedditApi(RedditApiError::InvalidResponse {
                        details: format!("token response: {}", e),
                    })
                }
                other => {
                    error!("Reddit token request rejected: {}", other);
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: other.to_string(),
                    })
                }
            })?;

        let expires_in = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        info!("Obtained Reddit access token valid for {:?}", expires_in);
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + expires_in,
            scope,
        })
    }
}

/// Send an oauth2 token request through our own client so the configured
/// user agent is attached; Reddit throttles requests without one.
///
/// Statuses that say nothing about the credentials are turned into retryable
/// errors here, before oauth2 tries to read the body as a token.
async fn send_oauth_request(
    http_client: Client,
    request: HttpRequest,
) -> Result<HttpResponse, CoreError> {
    let response = http_client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                CoreError::RedditApi(RedditApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

    let status_code = response.status();
    match status_code {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint returned {}", status_code),
            }
            .into());
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Token endpoint rate limited, retry after {} seconds", retry_after);
            return Err(RedditApiError::RateLimitExceeded { retry_after }.into());
        }
        status if status.is_server_error() => {
            warn!("Token endpoint returned {}", status);
            return Err(RedditApiError::ServerError {
                status_code: status.as_u16(),
            }
            .into());
        }
        _ => {}
    }

    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
