use std::collections::BTreeSet;

use crate::key::KEY_DELIMITER;

/// Split `model:action` into its two non-empty halves.
pub fn split_channel(channel: &str) -> Option<(&str, &str)> {
    let (model, action) = channel.split_once(KEY_DELIMITER)?;
    if model.is_empty() || action.is_empty() || action.contains(KEY_DELIMITER) {
        return None;
    }
    Some((model, action))
}

/// Channels (`model:action`) a subscriber wants replayed.
///
/// Fixed for the lifetime of a reconciler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelAllowList {
    channels: BTreeSet<String>,
}

impl ChannelAllowList {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }
}
