use crate::types::{ChannelKeywordMap, ContentItem};
use tracing::debug;

/// Check whether any keyword configured for the item's channel appears in
/// one of its text fields, ignoring case.
///
/// Absent content and channels without a keyword list never match. An empty
/// keyword matches everything, since it is a substring of any text.
pub fn is_subscribed_keyword(item: Option<&ContentItem>, keywords: &ChannelKeywordMap) -> bool {
    let Some(item) = item else {
        return false;
    };
    debug!("Looking for subscribed keywords in {}", item.channel());

    let Some(channel_keywords) = keywords.keywords_for(item.channel()) else {
        debug!("No keywords configured for {}", item.channel());
        return false;
    };

    let fields: Vec<String> = item
        .text_fields()
        .into_iter()
        .map(str::to_lowercase)
        .collect();

    channel_keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        fields.iter().any(|field| field.contains(&keyword))
    })
}
