use serde::{Deserialize, Serialize};

/// Post id used when the caller does not supply one.
pub const SYSTEM_POST_ID: &str = "system-generated";

/// A post in the thread: who wrote it and what it says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    #[serde(default = "unknown_username")]
    pub username: String,
    #[serde(default)]
    pub text: String,
}

impl PostRef {
    #[cfg(test)]
    pub fn new(username: &str, text: &str) -> Self {
        Self {
            username: username.to_string(),
            text: text.to_string(),
        }
    }
}

/// Everything the pipeline needs to write one reply.
///
/// `history` is recency-ordered; only the first three entries reach the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub original: PostRef,
    #[serde(default)]
    pub target: PostRef,
    #[serde(default)]
    pub history: Vec<PostRef>,
    #[serde(rename = "postId", default = "system_post_id")]
    pub post_id: String,
}

impl ReplyRequest {
    #[cfg(test)]
    pub fn new(original: PostRef, target: PostRef) -> Self {
        Self {
            original,
            target,
            history: Vec::new(),
            post_id: system_post_id(),
        }
    }

    #[cfg(test)]
    pub fn with_post_id(mut self, post_id: &str) -> Self {
        self.post_id = post_id.to_string();
        self
    }

    #[cfg(test)]
    pub fn with_history(mut self, history: Vec<PostRef>) -> Self {
        self.history = history;
        self
    }

    /// Both the thread text and the target text must carry content before an
    /// upstream call is worth making.
    pub fn has_required_text(&self) -> bool {
        !self.original.text.trim().is_empty() && !self.target.text.trim().is_empty()
    }
}

fn unknown_username() -> String {
    "unknown".to_string()
}

fn system_post_id() -> String {
    SYSTEM_POST_ID.to_string()
}
