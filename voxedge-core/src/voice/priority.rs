use serde::{Deserialize, Serialize};

/// Locale prefixes in the order their voices should be listed: Chinese
/// first, then US/UK/other English, then other major languages roughly by
/// number of speakers.
///
/// `ar-EG` can never match because `ar` comes first; it stays in the list
/// so configured orders written against it keep their indices.
const DEFAULT_PRIORITY_ORDER: &[&str] = &[
    "zh", "en-US", "en-GB", "en", "hi", "es", "ar", "fr", "bn", "pt", "ru", "id", "ur", "de", "ja",
    "pcm", "ar-EG", "mr", "vi", "te", "ha", "tr", "pa", "sw", "fil", "ta", "yue", "wuu", "fa", "ko",
    "th", "jv",
];

/// Ordered list of short-name prefixes used to rank voices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityOrder(Vec<String>);

impl Default for PriorityOrder {
    fn default() -> Self {
        Self::new(DEFAULT_PRIORITY_ORDER.iter().map(|p| p.to_string()))
    }
}

impl PriorityOrder {
    pub fn new(prefixes: impl IntoIterator<Item = String>) -> Self {
        Self(prefixes.into_iter().collect())
    }

    pub fn prefixes(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the first prefix of `short_name`, or `len()` when none
    /// matches so unlisted locales sort last.
    pub fn rank(&self, short_name: &str) -> usize {
        self.0
            .iter()
            .position(|prefix| short_name.starts_with(prefix.as_str()))
            .unwrap_or(self.0.len())
    }

    /// Sort key giving a total order: rank, then short name.
    pub fn sort_key<'a>(&self, short_name: &'a str) -> (usize, &'a str) {
        (self.rank(short_name), short_name)
    }
}
