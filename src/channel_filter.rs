//! Channel blacklist
//!
//! Trailer searches routinely surface fan-made "concept" trailers from
//! channels that imitate official uploads. Those channels can be listed in
//! the configuration and are matched case-insensitively as substrings of a
//! candidate's channel name or channel id.

/// Decides whether a trailer source channel is permitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    /// Lowercased, trimmed, non-empty blacklist entries
    entries: Vec<String>,
}

impl ChannelFilter {
    /// Creates a filter from configured blacklist entries
    ///
    /// Entries are trimmed and lowercased; blank entries are ignored.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.as_ref().trim().to_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect();
        entries.sort();
        entries.dedup();

        Self { entries }
    }

    /// Returns true if the channel identifier contains any blacklist entry
    pub fn is_blocked(&self, channel_identifier: &str) -> bool {
        self.matching_entry(channel_identifier).is_some()
    }

    /// Returns the first blacklist entry matching the identifier
    pub fn matching_entry(&self, channel_identifier: &str) -> Option<&str> {
        let identifier = channel_identifier.to_lowercase();
        self.entries
            .iter()
            .find(|entry| identifier.contains(entry.as_str()))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
