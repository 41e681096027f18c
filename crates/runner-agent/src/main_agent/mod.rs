use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::client_trait::AgentAdapter;

pub const ECHO_PREFIX: &str = "Echo from MainAgent: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub response: String,
}

/// Placeholder agent that echoes its input.
///
/// Stands where a real pipeline (planner, workers, evaluator) would go.
#[derive(Debug, Clone, Default)]
pub struct MainAgent;

impl MainAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn handle_message(&self, user_input: &str) -> AgentReply {
        AgentReply {
            response: format!("{}{}", ECHO_PREFIX, user_input),
        }
    }
}

impl AgentAdapter for MainAgent {
    fn name(&self) -> &str {
        "main_agent"
    }

    fn invoke(&self, input: &str) -> Result<String> {
        trace!("MainAgent handling {} bytes", input.len());
        Ok(self.handle_message(input).response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echoes_with_prefix() {
        let agent = MainAgent::new();
        assert_eq!(agent.invoke("hello").unwrap(), "Echo from MainAgent: hello");
    }

    #[test]
    fn test_empty_input() {
        let agent = MainAgent::new();
        assert_eq!(agent.invoke("").unwrap(), ECHO_PREFIX);
    }
}
