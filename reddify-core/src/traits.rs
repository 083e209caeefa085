use crate::error::CoreError;
use crate::types::{ContentItem, ContentKind, NotificationResult, PushMessage};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Live feed of content items. `None` means the source has ended; an `Err`
/// item is fatal for the consumer.
pub type ContentStream = BoxStream<'static, Result<ContentItem, CoreError>>;

/// Supplies a live, deduplicated, order-preserving feed of new items for a
/// set of channels.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn subscribe(
        &self,
        channels: &[String],
        kind: ContentKind,
    ) -> Result<ContentStream, CoreError>;
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for Arc<T> {
    async fn subscribe(
        &self,
        channels: &[String],
        kind: ContentKind,
    ) -> Result<ContentStream, CoreError> {
        (**self).subscribe(channels, kind).await
    }
}

/// Delivers a push message and reports the endpoint's verdict. Transport
/// failures are folded into a not-ok result rather than an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, message: &PushMessage) -> NotificationResult;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send_message(&self, message: &PushMessage) -> NotificationResult {
        (**self).send_message(message).await
    }
}
