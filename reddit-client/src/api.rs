use crate::auth::RedditAuth;
use reddify_core::{ContentItem, ContentKind, CoreError, RedditApiError};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

/// Largest page Reddit serves for a listing.
pub const LISTING_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    /// Fullname, e.g. `t3_abc123`
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub subreddit: String,
    pub permalink: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    /// Fullname, e.g. `t1_def456`
    pub name: String,
    #[serde(default)]
    pub body: String,
    pub subreddit: String,
    pub permalink: String,
}

fn absolute_permalink(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{}{}", REDDIT_WEB_BASE, permalink)
    }
}

impl From<RedditPostData> for ContentItem {
    fn from(post: RedditPostData) -> Self {
        ContentItem::Post {
            id: post.name,
            channel: post.subreddit,
            title: post.title,
            body: post.selftext,
            permalink: absolute_permalink(&post.permalink),
        }
    }
}

impl From<RedditCommentData> for ContentItem {
    fn from(comment: RedditCommentData) -> Self {
        ContentItem::Comment {
            id: comment.name,
            channel: comment.subreddit,
            body: comment.body,
            permalink: absolute_permalink(&comment.permalink),
        }
    }
}

/// Listing path for the newest items of `kind` across `channels`.
pub fn listing_path(channels: &[String], kind: ContentKind) -> String {
    let joined = channels.join("+");
    match kind {
        ContentKind::Post => format!("/r/{}/new", joined),
        ContentKind::Comment => format!("/r/{}/comments", joined),
    }
}

#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http_client: Client,
    api_base: String,
    auth: RedditAuth,
}

impl RedditApiClient {
    pub fn new(http_client: Client, api_base: String, auth: RedditAuth) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn auth(&self) -> &RedditAuth {
        &self.auth
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Response, CoreError> {
        let access_token = self.auth.access_token().await?;
        let url = format!("{}{}", self.api_base, endpoint);

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .map_err(|e| {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            StatusCode::UNAUTHORIZED => {
                self.auth.invalidate().await;
                RedditApiError::InvalidToken
            }
            StatusCode::FORBIDDEN => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            StatusCode::NOT_FOUND => RedditApiError::SubredditNotFound {
                subreddit: endpoint.to_string(),
            },
            status if status.is_server_error() => RedditApiError::ServerError {
                status_code: status.as_u16(),
            },
            status => RedditApiError::InvalidResponse {
                details: format!("unexpected status {} for {}", status, endpoint),
            },
        }
        .into())
    }

    async fn get_listing<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<RedditListing<T>, CoreError> {
        let limit = LISTING_LIMIT.to_string();
        let response = self
            .make_request(
                Method::GET,
                endpoint,
                &[("limit", limit.as_str()), ("raw_json", "1")],
            )
            .await?;

        response.json().await.map_err(|e| {
            error!("Failed to parse listing for {}: {}", endpoint, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse listing for {}", endpoint),
            })
        })
    }

    /// Newest items of `kind` for the given listing path, newest first.
    pub async fn fetch_items(
        &self,
        endpoint: &str,
        kind: ContentKind,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let items: Vec<ContentItem> = match kind {
            ContentKind::Post => self
                .get_listing::<RedditPostData>(endpoint)
                .await?
                .data
                .children
                .into_iter()
                .map(|child| child.data.into())
                .collect(),
            ContentKind::Comment => self
                .get_listing::<RedditCommentData>(endpoint)
                .await?
                .data
                .children
                .into_iter()
                .map(|child| child.data.into())
                .collect(),
        };

        debug!("Retrieved {} {} from {}", items.len(), kind, endpoint);
        Ok(items)
    }
}

pub(crate) fn build_http_client(user_agent: &str) -> Result<Client, CoreError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(CoreError::Network)
}
