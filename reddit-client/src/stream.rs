use crate::api::RedditApiClient;
use crate::retry::RetryExecutor;
use reddify_core::{ContentItem, ContentKind, ContentStream, CoreError};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

/// Number of recent fullnames remembered for deduplication. A full listing is
/// 100 items, so this covers three consecutive polls.
pub const SEEN_CAPACITY: usize = 301;

/// Longest pause between polls that returned nothing new.
pub const MAX_POLL_DELAY_SECS: u64 = 16;

/// Insertion-ordered set that forgets its oldest entries past `capacity`.
#[derive(Debug)]
pub struct BoundedSet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl BoundedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Returns `true` if `id` was not already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return false;
        }
        self.members.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Doubling poll delay with a little jitter, capped at `max`.
#[derive(Debug)]
pub struct ExponentialCounter {
    base: u64,
    max: u64,
}

impl ExponentialCounter {
    pub fn new(max: u64) -> Self {
        Self { base: 1, max }
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.base as f64;
        let max_jitter = base / 16.0;
        let value = base + fastrand::f64() * max_jitter - max_jitter / 2.0;
        self.base = (self.base * 2).min(self.max);
        Duration::from_secs_f64(value)
    }

    pub fn reset(&mut self) {
        self.base = 1;
    }
}

/// Polls one listing and yields each unseen item exactly once, oldest first.
pub struct SubredditStream {
    api: RedditApiClient,
    retry: RetryExecutor,
    endpoint: String,
    kind: ContentKind,
    seen: BoundedSet,
    pending: VecDeque<ContentItem>,
    counter: ExponentialCounter,
    skip_existing: bool,
    finished: bool,
}

impl SubredditStream {
    pub fn new(
        api: RedditApiClient,
        retry: RetryExecutor,
        endpoint: String,
        kind: ContentKind,
        skip_existing: bool,
    ) -> Self {
        Self {
            api,
            retry,
            endpoint,
            kind,
            seen: BoundedSet::new(SEEN_CAPACITY),
            pending: VecDeque::new(),
            counter: ExponentialCounter::new(MAX_POLL_DELAY_SECS),
            skip_existing,
            finished: false,
        }
    }

    /// Next unseen item. After an error has been yielded the stream is over.
    pub async fn next_item(&mut self) -> Option<Result<ContentItem, CoreError>> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(Ok(item));
            }

            let api = &self.api;
            let endpoint = self.endpoint.as_str();
            let kind = self.kind;
            let fetched = self
                .retry
                .execute(&format!("poll {}", endpoint), move || {
                    api.fetch_items(endpoint, kind)
                })
                .await;

            match fetched {
                Ok(items) => {
                    if self.absorb(items) {
                        self.counter.reset();
                    } else {
                        let delay = self.counter.next_delay();
                        debug!("No new {} on {}, sleeping {:?}", self.kind, self.endpoint, delay);
                        sleep(delay).await;
                    }
                }
                Err(e) => {
                    error!("{} stream for {} failed: {}", self.kind, self.endpoint, e);
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Queue the unseen items of a newest-first listing in chronological
    /// order. Returns whether anything unseen was found.
    fn absorb(&mut self, newest_first: Vec<ContentItem>) -> bool {
        let mut found = false;
        for item in newest_first.into_iter().rev() {
            if !self.seen.insert(item.id()) {
                continue;
            }
            found = true;
            if !self.skip_existing {
                self.pending.push_back(item);
            }
        }
        self.skip_existing = false;
        found
    }

    pub fn into_stream(self) -> ContentStream {
        Box::pin(futures::stream::unfold(self, |mut stream| async move {
            stream.next_item().await.map(|item| (item, stream))
        }))
    }
}
