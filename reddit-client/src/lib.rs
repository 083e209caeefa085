pub mod api;
pub mod auth;
pub mod retry;
pub mod stream;


pub use api::{listing_path, RedditApiClient, REDDIT_API_BASE};
pub use auth::{RedditAuth, RedditToken, REDDIT_TOKEN_URL};
pub use retry::{RetryConfig, RetryExecutor};
pub use stream::SubredditStream;

use async_trait::async_trait;
use reddify_core::{
    ConfigError, ContentKind, ContentSource, ContentStream, CoreError, RedditCredentials,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub token_url: String,
    pub api_base: String,
}

impl RedditOAuth2Config {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
            token_url: REDDIT_TOKEN_URL.to_string(),
            api_base: REDDIT_API_BASE.to_string(),
        }
    }

    /// Point the client somewhere other than reddit.com, e.g. a test server.
    pub fn with_endpoints(mut self, token_url: String, api_base: String) -> Self {
        self.token_url = token_url;
        self.api_base = api_base;
        self
    }
}

impl From<&RedditCredentials> for RedditOAuth2Config {
    fn from(credentials: &RedditCredentials) -> Self {
        Self::new(
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            credentials.user_agent.clone(),
        )
    }
}

/// Reddit handle serving live listings of posts or comments.
///
/// Each instance owns its own token cache, so workers that must not share
/// state should each build their own client.
#[derive(Debug, Clone)]
pub struct RedditClient {
    api: RedditApiClient,
    retry: RetryExecutor,
    skip_existing: bool,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let http_client = api::build_http_client(&config.user_agent)?;
        let auth = RedditAuth::new(
            http_client.clone(),
            config.client_id,
            config.client_secret,
            config.token_url,
        );

        Ok(Self {
            api: RedditApiClient::new(http_client, config.api_base, auth),
            retry: RetryExecutor::new(RetryConfig::reddit()),
            skip_existing: false,
        })
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    /// Obtain an access token up front so bad credentials fail at startup.
    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        self.api.auth().authenticate().await
    }

    pub fn stream(&self, channels: &[String], kind: ContentKind) -> SubredditStream {
        SubredditStream::new(
            self.api.clone(),
            self.retry.clone(),
            listing_path(channels, kind),
            kind,
            self.skip_existing,
        )
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn subscribe(
        &self,
        channels: &[String],
        kind: ContentKind,
    ) -> Result<ContentStream, CoreError> {
        if channels.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "channels".to_string(),
                value: "empty channel set".to_string(),
            }
            .into());
        }

        debug!("Opening {} stream for r/{}", kind, channels.join("+"));
        Ok(self.stream(channels, kind).into_stream())
    }
}
