use crate::error::NotificationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pushover reports success with `status: 1`; anything else is a failure.
pub const STATUS_OK: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
}

impl ContentKind {
    /// Stream name as it appears in logs.
    pub fn stream_name(&self) -> &'static str {
        match self {
            ContentKind::Post => "submissions",
            ContentKind::Comment => "comments",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stream_name())
    }
}

/// Channel name to keyword list, one map per content kind.
///
/// Keys are the exact subscription set handed to the stream, so an ordered
/// map keeps them unique and gives a stable subreddit path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKeywordMap(BTreeMap<String, Vec<String>>);

impl ChannelKeywordMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: impl Into<String>, keywords: Vec<String>) {
        self.0.insert(channel.into(), keywords);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn channels(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Keywords for `channel`. Reddit reports the canonical capitalisation of
    /// a subreddit, which need not match the configured key, so an exact miss
    /// falls back to a case-insensitive lookup.
    pub fn keywords_for(&self, channel: &str) -> Option<&[String]> {
        if let Some(keywords) = self.0.get(channel) {
            return Some(keywords);
        }
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(channel))
            .map(|(_, keywords)| keywords.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for ChannelKeywordMap
where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(channel, keywords)| {
                    (
                        channel.into(),
                        keywords.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    Post {
        id: String,
        channel: String,
        title: String,
        body: String,
        permalink: String,
    },
    Comment {
        id: String,
        channel: String,
        body: String,
        permalink: String,
    },
}

impl ContentItem {
    /// Reddit fullname (`t3_...` / `t1_...`).
    pub fn id(&self) -> &str {
        match self {
            ContentItem::Post { id, .. } | ContentItem::Comment { id, .. } => id,
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            ContentItem::Post { channel, .. } | ContentItem::Comment { channel, .. } => channel,
        }
    }

    pub fn permalink(&self) -> &str {
        match self {
            ContentItem::Post { permalink, .. } | ContentItem::Comment { permalink, .. } => {
                permalink
            }
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Post { .. } => ContentKind::Post,
            ContentItem::Comment { .. } => ContentKind::Comment,
        }
    }

    /// Fields searched for keywords, in priority order.
    pub fn text_fields(&self) -> Vec<&str> {
        match self {
            ContentItem::Post { title, body, .. } => vec![title.as_str(), body.as_str()],
            ContentItem::Comment { body, .. } => vec![body.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub recipient: String,
    pub title: String,
    pub url: String,
    pub message: String,
}

impl PushMessage {
    pub fn for_item(item: &ContentItem, recipient: &str) -> Self {
        match item {
            ContentItem::Post {
                channel,
                title,
                body,
                permalink,
                ..
            } => Self {
                recipient: recipient.to_string(),
                title: format!("{}: {}", channel, title),
                url: permalink.clone(),
                message: body.clone(),
            },
            ContentItem::Comment {
                channel,
                body,
                permalink,
                ..
            } => Self {
                recipient: recipient.to_string(),
                title: format!("{}: {}", channel, permalink),
                url: permalink.clone(),
                message: body.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationResult {
    pub status: i64,
    #[serde(default)]
    pub request: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl NotificationResult {
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK,
            request: None,
            errors: Vec::new(),
        }
    }

    /// Result for a call that never produced an API response.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: 0,
            request: None,
            errors: vec![detail.into()],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn error(&self) -> Option<NotificationError> {
        if self.is_ok() {
            None
        } else {
            Some(NotificationError::Rejected {
                status: self.status,
                errors: self.errors.clone(),
            })
        }
    }
}
