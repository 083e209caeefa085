use background_service::{BackgroundService, Watcher};
use pushover_client::PushoverClient;
use reddify_core::{AppConfig, ChannelKeywordMap, ContentKind, CoreError, ErrorExt};
use reddit_client::{RedditClient, RedditOAuth2Config};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "reddify=info,reddify_core=info,background_service=info,reddit_client=info,pushover_client=info";

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Reddify - Reddit keyword notifications");

    run().await.map_err(|e| {
        e.log_error();
        e
    })
}

async fn run() -> Result<(), CoreError> {
    let (_, config) = AppConfig::discover()?;

    let notifier = Arc::new(PushoverClient::new(config.pushover.api_key.clone())?);
    notifier.validate_user(&config.pushover.user_id).await?;

    let posts = watcher(
        &config,
        ContentKind::Post,
        config.submissions.clone(),
        &notifier,
    )
    .await?;
    let comments = watcher(
        &config,
        ContentKind::Comment,
        config.comments.clone(),
        &notifier,
    )
    .await?;

    BackgroundService::new(vec![posts, comments]).run().await
}

/// Each worker gets its own Reddit client and token cache.
async fn watcher(
    config: &AppConfig,
    kind: ContentKind,
    keywords: ChannelKeywordMap,
    notifier: &Arc<PushoverClient>,
) -> Result<Watcher<RedditClient, Arc<PushoverClient>>, CoreError> {
    let reddit = RedditClient::new(RedditOAuth2Config::from(&config.reddit))?
        .with_skip_existing(config.skip_existing);
    if !keywords.is_empty() {
        reddit.authenticate().await?;
    }

    Ok(Watcher::new(
        kind,
        Arc::new(keywords),
        reddit,
        notifier.clone(),
        config.pushover.user_id.clone(),
    ))
}
