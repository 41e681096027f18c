pub mod client_trait;
pub mod main_agent;
pub mod mock;
pub mod registry;

pub use client_trait::{AgentAdapter, AgentError};
pub use main_agent::{AgentReply, MainAgent};
pub use mock::FailingAgent;
pub use registry::{AgentCapability, AgentRegistry};
