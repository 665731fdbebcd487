//! Sanitizer — pure text transformations.
//!
//! Two unrelated jobs live here:
//! - redacting credentials from anything that reaches the logs;
//! - scrubbing disclosure language out of generated replies.
//!
//! The reply scrubber is an ordered list of passes. ORDER MATTERS: "the AI" → "it"
//! must run before the standalone "AI" pass strips the word, and the disclosure
//! phrases must run before either so "as an AI" disappears as a whole.

use std::borrow::Cow;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

pub const REDACTION_MARKER: &str = "SK-***REDACTED***";
const AUTHORIZATION_REDACTION: &str = "Bearer SK-***REDACTED***";

/// Replies shorter than this after cleaning are unusable.
pub const MIN_REPLY_CHARS: usize = 5;

/// Replaces every literal occurrence of `secret` with the redaction marker.
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTION_MARKER)
}

/// Redacts every secret from a JSON value before it is logged.
///
/// Walks objects and arrays recursively. Any key equal to `authorization`
/// (case-insensitive) is replaced wholesale, whatever its value.
pub fn sanitize_log_value(value: &Value, secrets: &[String]) -> Value {
    match value {
        Value::String(s) => Value::String(
            secrets
                .iter()
                .fold(s.clone(), |acc, secret| redact_secret(&acc, secret)),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_log_value(item, secrets))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = if key.eq_ignore_ascii_case("authorization") {
                        Value::String(AUTHORIZATION_REDACTION.to_string())
                    } else {
                        sanitize_log_value(v, secrets)
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

// (name, pattern, replacement). Applied top to bottom; all case-insensitive.
const PASSES: &[(&str, &str, &str)] = &[
    // Vendor name, spaced and hyphenated variants.
    ("vendor", r"deep[\s-]*seek(?:['’]s)?", ""),
    // Self-disclosure.
    (
        "as_an_ai",
        r"\bas\s+an?\s+(?:AI\b|language\s+model\b|text-based\b)(?:\s+(?:language\s+model|assistant|model)s?\b)?",
        "",
    ),
    (
        "im_an_ai",
        r"\bI['’]?m\s+an?\s+AI\b(?:\s+(?:language\s+model|assistant|model)s?\b)?",
        "",
    ),
    ("ai_assistant", r"\bAI\s*(?:assistant|model)s?\b", ""),
    ("language_model", r"\blanguage\s*models?\b", ""),
    ("llm", r"\bLLMs?\b", ""),
    ("gpt", r"\b(?:chat\s*)?GPT(?:-?\d+(?:\.\d+)?o?)?", ""),
    ("artificial_intelligence", r"\bartificial\s+intelligence\b", ""),
    // First-person capability denial. The `(?:[^,.!?]*,)?` tail swallows the rest
    // of the clause when it ends in a comma: "I cannot run, but ..." → " but ...".
    ("i_cannot", r"\bI\s+cannot\b(?:[^,.!?]*,)?", ""),
    ("not_able", r"\bI['’]?m\s+not\s+able\s+to\b(?:[^,.!?]*,)?", ""),
    (
        "dont_have",
        r"\bI\s+don['’]?t\s+have\s+(?:personal|physical|access\s+to|the\s+ability)\b(?:[^,.!?]*,)?",
        "",
    ),
    // Role markers, leading and embedded.
    ("leading_role", r"^\s*(?:assistant|user|system|AI)\s*:", ""),
    ("embedded_role", r"\b(?:assistant|user|system|AI)\s*:", " "),
    // Must precede the standalone pass.
    ("the_ai", r"\bthe\s+AI\b", "it"),
    ("standalone_ai", r"\bAIs?\b", ""),
    // Vendor-adjacent jargon.
    ("powered_by", r"\bpowered\s+by\b", "made with"),
    ("technology", r"\btechnology\b", "tech"),
    ("trained_on", r"\btrained\s+on\b", "based on"),
    ("generate_responses", r"\bgenerate\s+responses\b", "create replies"),
    ("chatbot", r"\bchatbot", "app"),
];

struct Pass {
    name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

/// Compiled, ordered disclosure-scrubbing passes.
pub struct ReplySanitizer {
    passes: Vec<Pass>,
    whitespace: Regex,
}

impl ReplySanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        let passes = PASSES
            .iter()
            .map(|&(name, pattern, replacement)| -> Result<Pass, regex::Error> {
                Ok(Pass {
                    name,
                    pattern: Regex::new(&format!("(?i){pattern}"))?,
                    replacement,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            passes,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Scrubs disclosure language from a generated reply.
    ///
    /// Returns `None` when fewer than `MIN_REPLY_CHARS` characters survive; the
    /// caller must fall back rather than retry.
    pub fn clean_reply(&self, text: &str) -> Option<String> {
        let mut cleaned = text.to_string();
        for pass in &self.passes {
            let replaced = match pass.pattern.replace_all(&cleaned, pass.replacement) {
                Cow::Borrowed(_) => continue,
                Cow::Owned(replaced) => replaced,
            };
            trace!("sanitizer pass '{}' matched", pass.name);
            cleaned = replaced;
        }

        let collapsed = self.whitespace.replace_all(&cleaned, " ");
        // Dropping a leading "I" can expose another "I", a quote or a separator.
        let mut trimmed = trim_artifacts(&collapsed);
        loop {
            let next = trim_artifacts(drop_leading_bare_i(trimmed));
            if next == trimmed {
                break;
            }
            trimmed = next;
        }

        if trimmed.chars().count() < MIN_REPLY_CHARS {
            return None;
        }
        Some(trimmed.to_string())
    }
}

/// Trims whitespace, wrapping quotes and separators orphaned at the start by removals.
fn trim_artifacts(text: &str) -> &str {
    text.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
        .trim_start_matches(|c: char| matches!(c, ',' | ';' | ':') || c.is_whitespace())
        .trim()
}

/// "I love this" → "love this"; "I'm", "I'd" and "Ice" are left alone.
fn drop_leading_bare_i(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(['I', 'i']) else {
        return text;
    };
    let after = rest.trim_start();
    if after.len() == rest.len() || after.starts_with(['\'', '’']) {
        return text;
    }
    after
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sanitizer() -> ReplySanitizer {
        ReplySanitizer::new().unwrap()
    }

    fn clean(text: &str) -> Option<String> {
        sanitizer().clean_reply(text)
    }

    const BANNED: &[&str] = &[
        "deepseek",
        "deep seek",
        "as an ai",
        "i'm an ai",
        "ai assistant",
        "language model",
        "i cannot",
        "assistant:",
        "user:",
        "system:",
    ];

    fn assert_clean(text: &str) {
        let lower = text.to_lowercase();
        for banned in BANNED {
            assert!(!lower.contains(banned), "{banned:?} survived in {text:?}");
        }
    }

    #[test]
    fn test_redact_secret_replaces_every_occurrence() {
        assert_eq!(
            redact_secret("key=sk-1 again sk-1", "sk-1"),
            "key=SK-***REDACTED*** again SK-***REDACTED***"
        );
        assert_eq!(redact_secret("nothing here", ""), "nothing here");
    }

    #[test]
    fn test_sanitize_log_value_walks_nested_structures() {
        let value = json!({
            "headers": {"Authorization": "Bearer whatever", "x-trace": "sk-1"},
            "messages": [{"content": "leak sk-1"}, 42, null],
            "ok": true
        });
        let safe = sanitize_log_value(&value, &["sk-1".to_string()]);

        assert_eq!(safe["headers"]["Authorization"], AUTHORIZATION_REDACTION);
        assert_eq!(safe["headers"]["x-trace"], REDACTION_MARKER);
        assert_eq!(safe["messages"][0]["content"], "leak SK-***REDACTED***");
        assert_eq!(safe["messages"][1], 42);
        assert_eq!(safe["ok"], true);
    }

    #[test]
    fn test_disclosure_clause_removed_from_scenario_reply() {
        assert_eq!(
            clean("As an AI I cannot run, but that's impressive! 🏔").as_deref(),
            Some("but that's impressive! 🏔")
        );
    }

    #[test]
    fn test_known_leaky_replies_come_out_clean() {
        let cases = [
            (
                "As a DeepSeek language model, I cannot go hiking with you, but that trail sounds amazing! 🏔",
                "but that trail sounds amazing! 🏔",
            ),
            (
                "DeepSeek thinks you should try the north trail! 🌲",
                "thinks you should try the north trail! 🌲",
            ),
            (
                "I'm an AI assistant but I'd recommend the Sunset Ridge trail! 🌄",
                "but I'd recommend the Sunset Ridge trail! 🌄",
            ),
            (
                "According to DeepSeek's analysis, you'd love the mountain view! 🗻",
                "According to analysis, you'd love the mountain view! 🗻",
            ),
            (
                "As an AI language model I don't hike, but that summit looks breathtaking! 🌅",
                "don't hike, but that summit looks breathtaking! 🌅",
            ),
            (
                "Assistant: The western trail has the best wildlife viewing spots! 🦊",
                "The western trail has the best wildlife viewing spots! 🦊",
            ),
            (
                "User: Which trail is best? Assistant: Definitely try Eagle Ridge! 🦅",
                "Which trail is best? Definitely try Eagle Ridge! 🦅",
            ),
            (
                "I don't have personal experiences with hiking, but sunrise hikes are magical! ☀️",
                "but sunrise hikes are magical! ☀️",
            ),
            (
                "I cannot physically hike, but those views must be worth the climb! 🏞",
                "but those views must be worth the climb! 🏞",
            ),
        ];

        for (input, expected) in cases {
            let cleaned = clean(input).unwrap();
            assert_clean(&cleaned);
            assert_eq!(cleaned, expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_vendor_variants_removed() {
        for input in [
            "Deep Seek says go for it 🔥",
            "deep-seek says go for it 🔥",
            "DEEPSEEK says go for it 🔥",
        ] {
            assert_eq!(clean(input).as_deref(), Some("says go for it 🔥"));
        }
    }

    #[test]
    fn test_the_ai_becomes_it_before_standalone_pass() {
        assert_eq!(
            clean("Honestly the AI nailed that pace 💯").as_deref(),
            Some("Honestly it nailed that pace 💯")
        );
    }

    #[test]
    fn test_standalone_ai_respects_word_boundaries() {
        assert_eq!(
            clean("That AI trail is the main attraction, said Aidan 😊").as_deref(),
            Some("That trail is the main attraction, said Aidan 😊")
        );
    }

    #[test]
    fn test_jargon_is_softened() {
        assert_eq!(
            clean("Powered by technology trained on vibes, this chatbot slaps 🔥").as_deref(),
            Some("made with tech based on vibes, this app slaps 🔥")
        );
    }

    #[test]
    fn test_leading_bare_i_dropped_but_contractions_kept() {
        assert_eq!(
            clean("I love this energy 😍").as_deref(),
            Some("love this energy 😍")
        );
        assert_eq!(
            clean("I'm obsessed with this 😍").as_deref(),
            Some("I'm obsessed with this 😍")
        );
        assert_eq!(clean("Ice cold take 🧊").as_deref(), Some("Ice cold take 🧊"));
    }

    #[test]
    fn test_whitespace_and_quotes_normalized() {
        assert_eq!(
            clean("  \"So   good\n\tright? 🙌\"  ").as_deref(),
            Some("So good right? 🙌")
        );
    }

    #[test]
    fn test_too_short_residue_returns_none() {
        assert_eq!(clean("As an AI language model"), None);
        assert_eq!(clean("AI: ok"), None);
        assert_eq!(clean(""), None);
    }

    #[test]
    fn test_stacked_leading_artifacts_are_all_removed() {
        assert_eq!(clean("I I love this 😍").as_deref(), Some("love this 😍"));
        assert_eq!(clean("I , great stuff 😊").as_deref(), Some("great stuff 😊"));
        assert_eq!(clean("I \"so good right 😊\"").as_deref(), Some("so good right 😊"));
    }

    #[test]
    fn test_clean_reply_is_idempotent_on_survivors() {
        let inputs = [
            "As an AI I cannot run, but that's impressive! 🏔",
            "User: Which trail is best? Assistant: Definitely try Eagle Ridge! 🦅",
            "I love this energy 😍",
            "Powered by technology trained on vibes, this chatbot slaps 🔥",
            "Honestly the AI nailed that pace 💯",
            "Main-character energy ✨",
            "I I love this 😍",
            "I , great stuff 😊",
            "I \"so good right 😊\"",
            "I I I ✨ nice one",
        ];
        for input in inputs {
            let once = clean(input).unwrap();
            assert_eq!(clean(&once).as_deref(), Some(once.as_str()), "input: {input:?}");
        }
    }
}
