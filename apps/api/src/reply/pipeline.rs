//! Reply Pipeline — orchestrates a single reply end to end.
//!
//! Flow: validate → build_prompt → completer (3 attempts, exponential backoff) →
//!       clean_reply → word cap → decoration → de-dup → 80-char cut.
//!
//! `generate_reply` never fails: every branch ends in a generated reply or a
//! fallback comment. `attempt_once` is the single-shot variant used behind the
//! admission queue; it shares the finishing stage so both entry points hand out
//! replies with identical guarantees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::llm_client::{Completer, CompletionOutcome};
use crate::reply::fallback::{has_decoration, is_decorative, FallbackComments, MAX_REPLY_CHARS};
use crate::reply::models::ReplyRequest;
use crate::reply::prompts::build_prompt;
use crate::reply::sanitizer::ReplySanitizer;

pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Replies with more words than this are cut down to `TRUNCATED_REPLY_WORDS`.
const MAX_REPLY_WORDS: usize = 15;
const TRUNCATED_REPLY_WORDS: usize = 12;

/// Appended when a cleaned reply carries no emoji.
pub const DECORATIONS: &[&str] = &["✨", "🔥", "🙌", "👍", "😊", "💯", "🌟", "❤️"];
/// Appended to tell a repeated reply apart from an earlier one.
pub const DEDUP_DECORATIONS: &[&str] = &["✨", "🔥", "🙌"];

/// Why a reply ended up as a fallback comment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplyFailure {
    #[error("original or target text is empty")]
    InputInvalid,

    #[error("no API credential configured")]
    ConfigurationMissing,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("reply was unusable after sanitization")]
    ContentRejected,
}

/// Delay before retry number `retry` (1-based): 2s, 4s, 8s, then capped at 10s.
pub fn backoff_delay(retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Last reply emitted per post id. Never evicted.
#[derive(Debug, Default)]
pub struct PostedReplies {
    by_post: Mutex<HashMap<String, String>>,
}

impl PostedReplies {
    /// Makes `reply` differ from every earlier emission, then records it under
    /// `post_id`. Concurrent writers to one post id: last writer wins.
    fn record_unique(&self, post_id: &str, reply: String) -> String {
        let mut by_post = self.by_post.lock().unwrap_or_else(PoisonError::into_inner);

        let reply = if by_post.values().any(|posted| *posted == reply) {
            debug!("Duplicate reply detected for post {post_id}, adding emoji");
            append_within_limit(&reply, &format!(" {}", random_of(DEDUP_DECORATIONS)))
        } else {
            reply
        };

        by_post.insert(post_id.to_string(), reply.clone());
        reply
    }

    #[cfg(test)]
    pub fn get(&self, post_id: &str) -> Option<String> {
        self.by_post
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(post_id)
            .cloned()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_post
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The reply pipeline. One instance per process, shared through `AppState`.
pub struct ReplyPipeline {
    completer: Arc<dyn Completer>,
    credential: Option<String>,
    sanitizer: ReplySanitizer,
    fallbacks: FallbackComments,
    posted: PostedReplies,
}

impl ReplyPipeline {
    pub fn new(
        completer: Arc<dyn Completer>,
        credential: Option<String>,
        fallbacks: FallbackComments,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            completer,
            credential: credential.filter(|c| !c.trim().is_empty()),
            sanitizer: ReplySanitizer::new()?,
            fallbacks,
            posted: PostedReplies::default(),
        })
    }

    #[cfg(test)]
    pub fn fallbacks(&self) -> &FallbackComments {
        &self.fallbacks
    }

    #[cfg(test)]
    pub fn posted(&self) -> &PostedReplies {
        &self.posted
    }

    /// Generates a reply with up to `MAX_ATTEMPTS` upstream calls.
    ///
    /// Always returns display-ready text (≤80 chars, at least one emoji).
    pub async fn generate_reply(&self, request: &ReplyRequest) -> String {
        debug!("Generating reply for post {}", request.post_id);

        if !request.has_required_text() {
            return self.fall_back(&ReplyFailure::InputInvalid);
        }

        let Some(credential) = self.credential.as_deref() else {
            return self.fall_back(&ReplyFailure::ConfigurationMissing);
        };

        let raw = match self.complete_with_retry(request, credential).await {
            Ok(raw) => raw,
            Err(failure) => return self.fall_back(&failure),
        };

        self.finish(request, &raw)
            .unwrap_or_else(|failure| self.fall_back(&failure))
    }

    /// One upstream call with an explicit credential, for the admission queue.
    ///
    /// Upstream failures are returned instead of retried; every other failure
    /// still resolves to a fallback comment.
    pub async fn attempt_once(
        &self,
        request: &ReplyRequest,
        credential: &str,
    ) -> Result<String, ReplyFailure> {
        if !request.has_required_text() {
            return Ok(self.fall_back(&ReplyFailure::InputInvalid));
        }

        let prompt = build_prompt(request);
        match self
            .completer
            .complete(&prompt.system, &prompt.user, credential)
            .await
        {
            CompletionOutcome::Success { raw_text } => Ok(self
                .finish(request, &raw_text)
                .unwrap_or_else(|failure| self.fall_back(&failure))),
            outcome => Err(ReplyFailure::UpstreamUnavailable(outcome.to_string())),
        }
    }

    async fn complete_with_retry(
        &self,
        request: &ReplyRequest,
        credential: &str,
    ) -> Result<String, ReplyFailure> {
        let mut last_outcome: Option<CompletionOutcome> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = backoff_delay(attempt - 1);
                warn!(
                    "Completion attempt {}/{} failed, retrying after {}ms...",
                    attempt - 1,
                    MAX_ATTEMPTS,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let prompt = build_prompt(request);
            debug!("Prompt built: {} characters", prompt.user.len());

            match self
                .completer
                .complete(&prompt.system, &prompt.user, credential)
                .await
            {
                CompletionOutcome::Success { raw_text } => {
                    debug!("Raw reply received (length: {})", raw_text.len());
                    return Ok(raw_text);
                }
                outcome => {
                    warn!("Completion attempt {attempt}/{MAX_ATTEMPTS}: {outcome}");
                    last_outcome = Some(outcome);
                }
            }
        }

        Err(ReplyFailure::UpstreamUnavailable(
            last_outcome
                .map(|o| o.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        ))
    }

    /// Sanitize → word cap → 80-char cut → decoration → de-dup.
    fn finish(&self, request: &ReplyRequest, raw: &str) -> Result<String, ReplyFailure> {
        let cleaned = self
            .sanitizer
            .clean_reply(raw)
            .ok_or(ReplyFailure::ContentRejected)?;
        debug!("Cleaned reply: {cleaned:?}");

        let capped = cap_words(&cleaned);
        let mut reply = truncate_chars(&capped, MAX_REPLY_CHARS);

        if !has_decoration(&reply) {
            reply = append_within_limit(&reply, &format!(" {}", random_of(DECORATIONS)));
            debug!("Added missing emoji: {reply:?}");
        }

        let reply = self.posted.record_unique(&request.post_id, reply);
        info!("Final reply for post {}: {reply:?}", request.post_id);
        Ok(reply)
    }

    fn fall_back(&self, failure: &ReplyFailure) -> String {
        match failure {
            ReplyFailure::ConfigurationMissing => {
                error!("Missing API credential - falling back");
            }
            other => warn!("{other} - falling back"),
        }
        self.fallbacks.pick()
    }
}

fn random_of(choices: &[&'static str]) -> &'static str {
    choices.choose(&mut rand::thread_rng()).copied().unwrap_or("✨")
}

/// Over-long replies keep their first 12 words plus their first emoji (or ✨).
fn cap_words(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= MAX_REPLY_WORDS {
        return words.join(" ");
    }
    let emoji = text
        .chars()
        .find(|c| is_decorative(*c))
        .map_or_else(|| "✨".to_string(), |c| c.to_string());
    format!("{} {emoji}", words[..TRUNCATED_REPLY_WORDS].join(" "))
}

/// Hard cut at `max` characters, never inside a code point.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Appends `suffix`, shortening `text` first if the result would exceed the limit.
fn append_within_limit(text: &str, suffix: &str) -> String {
    let room = MAX_REPLY_CHARS.saturating_sub(suffix.chars().count());
    let base = truncate_chars(text, room);
    format!("{}{suffix}", base.trim_end())
}
