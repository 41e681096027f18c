use anyhow::Result;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unknown agent adapter: {0}")]
    UnknownAdapter(String),

    #[error("Agent '{agent}' failed: {message}")]
    Invocation { agent: String, message: String },
}

/// The single integration point the runner delegates to.
///
/// Calls are synchronous and may block for as long as the agent needs;
/// there is no timeout or cancellation. Any input string is accepted,
/// including the empty string.
pub trait AgentAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn invoke(&self, input: &str) -> Result<String>;
}
