use rand::seq::SliceRandom;
use tracing::warn;

/// Canned replies used whenever generation cannot produce acceptable text.
pub const DEFAULT_FALLBACK_COMMENTS: &[&str] = &[
    "Main-character energy ✨",
    "Love this vibe 😍",
    "Absolute fire 🔥",
    "Gym goals! 💪",
    "Chef's kiss 😘",
    "Instant mood-boost 💯",
];

/// Replies longer than this never leave the pipeline.
pub const MAX_REPLY_CHARS: usize = 80;

/// Treated as the emoji marker. Loose on purpose: any non-ASCII character counts.
pub fn is_decorative(c: char) -> bool {
    !c.is_ascii()
}

pub fn has_decoration(text: &str) -> bool {
    text.chars().any(is_decorative)
}

/// A fixed list of fallback comments, picked uniformly at random.
///
/// Every entry already satisfies the reply guarantees (non-empty, decorated,
/// within `MAX_REPLY_CHARS`), so a fallback is always display-ready.
#[derive(Debug, Clone)]
pub struct FallbackComments {
    comments: Vec<String>,
}

impl FallbackComments {
    /// Keeps only entries that satisfy the reply guarantees; falls back to the
    /// built-in list if none do.
    pub fn new(comments: Vec<String>) -> Self {
        let (valid, rejected): (Vec<String>, Vec<String>) = comments
            .into_iter()
            .map(|c| c.trim().to_string())
            .partition(|c| {
                !c.is_empty() && c.chars().count() <= MAX_REPLY_CHARS && has_decoration(c)
            });

        for comment in &rejected {
            warn!("Ignoring fallback comment that is empty, too long or lacks an emoji: {comment:?}");
        }

        if valid.is_empty() {
            return Self::default();
        }
        Self { comments: valid }
    }

    pub fn pick(&self) -> String {
        self.comments
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_FALLBACK_COMMENTS[0].to_string())
    }

    #[cfg(test)]
    pub fn contains(&self, text: &str) -> bool {
        self.comments.iter().any(|c| c == text)
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[String] {
        &self.comments
    }
}

impl Default for FallbackComments {
    fn default() -> Self {
        Self {
            comments: DEFAULT_FALLBACK_COMMENTS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }
}
