// Prompt constants and the prompt builder for reply generation.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{HUMAN_PERSONA_RULE, NO_DISCLOSURE_INSTRUCTION};
use crate::reply::models::ReplyRequest;

/// Only this many history entries reach the prompt.
pub const MAX_HISTORY_ENTRIES: usize = 3;

/// Persona used for every reply.
pub const PERSONA_SYSTEM: &str = "You are Ava, a witty 20-something woman replying on Threads.";

/// Instruction block. Replace `{target_username}` before sending.
pub const REPLY_INSTRUCTIONS_TEMPLATE: &str = "INSTRUCTIONS:\n\
    Write ONE casual reply (≤12 words) that addresses @{target_username}, \
    adds a fresh perspective, and includes exactly ONE emoji.\n";

/// The two messages sent upstream for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds the system and user prompts for a reply request.
///
/// Pure function of the request: rebuilt identically on every retry.
pub fn build_prompt(request: &ReplyRequest) -> Prompt {
    let mut user = format!(
        "THREAD by @{} (ID {}):\n  Text: \"{}\"\n\nTARGET by @{}: \"{}\"\n\n",
        request.original.username,
        request.post_id,
        request.original.text,
        request.target.username,
        request.target.text
    );

    if !request.history.is_empty() {
        user.push_str("OTHER REPLIES:\n");
        for entry in request.history.iter().take(MAX_HISTORY_ENTRIES) {
            user.push_str(&format!("  @{}: \"{}\"\n", entry.username, entry.text));
        }
        user.push('\n');
    }

    user.push_str(
        &REPLY_INSTRUCTIONS_TEMPLATE.replace("{target_username}", &request.target.username),
    );
    user.push_str(NO_DISCLOSURE_INSTRUCTION);

    Prompt {
        system: format!("{PERSONA_SYSTEM} {HUMAN_PERSONA_RULE}"),
        user,
    }
}
