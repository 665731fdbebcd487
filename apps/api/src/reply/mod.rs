// Reply generation: prompt building, sanitization, fallback selection and the
// retrying pipeline that ties them together.
// All completion calls go through llm_client — nothing here talks HTTP directly.

pub mod fallback;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod sanitizer;

pub use fallback::FallbackComments;
pub use models::ReplyRequest;
pub use pipeline::ReplyPipeline;
