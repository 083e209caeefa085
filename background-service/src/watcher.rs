use futures::StreamExt;
use reddify_core::{
    is_subscribed_keyword, ChannelKeywordMap, ContentItem, ContentKind, ContentSource, CoreError,
    Notifier, PushMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Pause after a failed notification. Pushover bans clients that keep sending
/// failing requests, so a bad key or user must not turn into a tight loop.
pub const NOTIFICATION_COOLDOWN: Duration = Duration::from_secs(1800);

/// Turns one live stream of posts or comments into push notifications.
pub struct Watcher<S, N> {
    kind: ContentKind,
    keywords: Arc<ChannelKeywordMap>,
    source: S,
    notifier: N,
    recipient: String,
    cooldown: Duration,
}

impl<S, N> Watcher<S, N>
where
    S: ContentSource,
    N: Notifier,
{
    pub fn new(
        kind: ContentKind,
        keywords: Arc<ChannelKeywordMap>,
        source: S,
        notifier: N,
        recipient: String,
    ) -> Self {
        Self {
            kind,
            keywords,
            source,
            notifier,
            recipient,
            cooldown: NOTIFICATION_COOLDOWN,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Consume the stream until it ends. Stream errors are returned to the
    /// caller; failed notifications only pause the loop.
    pub async fn run(&self) -> Result<(), CoreError> {
        if self.keywords.is_empty() {
            info!("No streams setup for {}.", self.kind);
            return Ok(());
        }

        let channels = self.keywords.channels();
        info!(
            "Starting a {} stream for {} subreddits.",
            self.kind,
            channels.len()
        );
        let mut stream = self.source.subscribe(&channels, self.kind).await?;

        while let Some(item) = stream.next().await {
            let item = item?;
            self.handle_item(&item).await;
        }

        info!("{} stream ended", self.kind);
        Ok(())
    }

    async fn handle_item(&self, item: &ContentItem) {
        if !is_subscribed_keyword(Some(item), &self.keywords) {
            return;
        }

        match item {
            ContentItem::Post { title, .. } => info!("{} - {}", self.kind, title),
            ContentItem::Comment { .. } => info!("{}", self.kind),
        }

        let message = PushMessage::for_item(item, &self.recipient);
        let result = self.notifier.send_message(&message).await;
        if let Some(e) = result.error() {
            error!(
                "Pushover returned status {} for {} match in {}: {}",
                result.status,
                self.kind,
                item.channel(),
                e
            );
            info!("Pausing {} stream for {:?}", self.kind, self.cooldown);
            sleep(self.cooldown).await;
        }
    }
}
