// Shared prompt fragments for completion calls.
// The reply module builds its own prompts in reply/prompts.rs and reuses these.

/// Instruction appended to every generation prompt so the model never outs itself.
pub const NO_DISCLOSURE_INSTRUCTION: &str = "IMPORTANT: Output ONLY the reply text. \
    DO NOT mention being an AI or include any references to AI, language models, or DeepSeek.";

/// Persona fragment: replies must read as written by a person.
pub const HUMAN_PERSONA_RULE: &str = "Never reveal you are an AI or mention AI capabilities.";
