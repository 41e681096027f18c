use anyhow::Result;

use crate::client_trait::{AgentAdapter, AgentError};

// Agent that always fails, for exercising the error path
#[derive(Debug, Clone)]
pub struct FailingAgent {
    pub message: String,
}

impl FailingAgent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl AgentAdapter for FailingAgent {
    fn name(&self) -> &str {
        "failing_agent"
    }

    fn invoke(&self, _input: &str) -> Result<String> {
        Err(AgentError::Invocation {
            agent: self.name().to_string(),
            message: self.message.clone(),
        }
        .into())
    }
}
