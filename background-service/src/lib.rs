pub mod watcher;

pub use watcher::{Watcher, NOTIFICATION_COOLDOWN};

use reddify_core::{ContentSource, CoreError, ErrorExt, Notifier};
use tokio::task::JoinSet;
use tracing::{error, info};

/// Runs the post and comment watchers side by side.
///
/// Each watcher is its own task with its own stream and cooldown. A watcher
/// that finishes cleanly leaves the other running; a watcher that fails
/// aborts the other and the whole service returns the failure.
pub struct BackgroundService<S, N> {
    watchers: Vec<Watcher<S, N>>,
}

impl<S, N> BackgroundService<S, N>
where
    S: ContentSource + 'static,
    N: Notifier + 'static,
{
    pub fn new(watchers: Vec<Watcher<S, N>>) -> Self {
        Self { watchers }
    }

    pub async fn run(self) -> Result<(), CoreError> {
        let mut tasks = JoinSet::new();
        for watcher in self.watchers {
            let kind = watcher.kind();
            tasks.spawn(async move { (kind, watcher.run().await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((kind, Ok(()))) => {
                    info!("{} watcher finished", kind);
                    continue;
                }
                Ok((kind, Err(e))) => CoreError::WatcherFailed {
                    kind,
                    source: Box::new(e),
                },
                Err(e) => CoreError::Internal {
                    message: format!("watcher task did not complete: {}", e),
                },
            };

            failure.log_error();
            error!(code = %failure.error_code(), "Stopping remaining watchers");
            tasks.shutdown().await;
            return Err(failure);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use reddify_core::{
        ChannelKeywordMap, ContentItem, ContentKind, ContentStream, NotificationResult,
        PushMessage, RedditApiError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Posts fail immediately; comments never end.
    struct SplitSource;

    #[async_trait]
    impl ContentSource for SplitSource {
        async fn subscribe(
            &self,
            _channels: &[String],
            kind: ContentKind,
        ) -> Result<ContentStream, CoreError> {
            match kind {
                ContentKind::Post => Ok(Box::pin(stream::iter(vec![Err(CoreError::RedditApi(
                    RedditApiError::AuthenticationFailed {
                        reason: "invalid_grant".to_string(),
                    },
                ))]))),
                ContentKind::Comment => Ok(Box::pin(stream::pending())),
            }
        }
    }

    /// Posts panic on subscribe; comments never end.
    struct PanickingSource;

    #[async_trait]
    impl ContentSource for PanickingSource {
        async fn subscribe(
            &self,
            _channels: &[String],
            kind: ContentKind,
        ) -> Result<ContentStream, CoreError> {
            match kind {
                ContentKind::Post => panic!("listing decoder blew up"),
                ContentKind::Comment => Ok(Box::pin(stream::pending())),
            }
        }
    }

    struct FiniteSource(Vec<ContentItem>);

    #[async_trait]
    impl ContentSource for FiniteSource {
        async fn subscribe(
            &self,
            _channels: &[String],
            _kind: ContentKind,
        ) -> Result<ContentStream, CoreError> {
            Ok(Box::pin(stream::iter(
                self.0.clone().into_iter().map(Ok).collect::<Vec<_>>(),
            )))
        }
    }

    #[derive(Default)]
    struct CountingNotifier(AtomicUsize);

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send_message(&self, _message: &PushMessage) -> NotificationResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            NotificationResult::ok()
        }
    }

    fn keywords() -> Arc<ChannelKeywordMap> {
        Arc::new([("testsub", vec!["rocket"])].into_iter().collect())
    }

    #[tokio::test]
    async fn test_worker_failure_stops_service() {
        let notifier = Arc::new(CountingNotifier::default());
        let watchers = [ContentKind::Post, ContentKind::Comment]
            .into_iter()
            .map(|kind| {
                Watcher::new(
                    kind,
                    keywords(),
                    Arc::new(SplitSource),
                    notifier.clone(),
                    "user".to_string(),
                )
            })
            .collect();

        let err = BackgroundService::new(watchers).run().await.unwrap_err();
        match err {
            CoreError::WatcherFailed { kind, source } => {
                assert_eq!(kind, ContentKind::Post);
                assert!(matches!(
                    *source,
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
                ));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_panic_stops_service() {
        let notifier = Arc::new(CountingNotifier::default());
        let watchers = [ContentKind::Post, ContentKind::Comment]
            .into_iter()
            .map(|kind| {
                Watcher::new(
                    kind,
                    keywords(),
                    Arc::new(PanickingSource),
                    notifier.clone(),
                    "user".to_string(),
                )
            })
            .collect();

        let err = BackgroundService::new(watchers).run().await.unwrap_err();
        assert!(matches!(err, CoreError::Internal { .. }));
        assert_eq!(err.error_code(), "INTERNAL");
    }

    #[tokio::test]
    async fn test_idle_watcher_does_not_stop_sibling() {
        let notifier = Arc::new(CountingNotifier::default());
        let item = ContentItem::Comment {
            id: "t1_a".to_string(),
            channel: "testsub".to_string(),
            body: "rocket".to_string(),
            permalink: "https://www.reddit.com/r/testsub/comments/p/t/a/".to_string(),
        };
        let source = Arc::new(FiniteSource(vec![item]));

        let watchers = vec![
            Watcher::new(
                ContentKind::Post,
                Arc::new(ChannelKeywordMap::new()),
                source.clone(),
                notifier.clone(),
                "user".to_string(),
            ),
            Watcher::new(
                ContentKind::Comment,
                keywords(),
                source,
                notifier.clone(),
                "user".to_string(),
            ),
        ];

        BackgroundService::new(watchers).run().await.unwrap();
        assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
    }
}
