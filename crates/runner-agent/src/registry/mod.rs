use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::client_trait::{AgentAdapter, AgentError};
use crate::main_agent::MainAgent;

type AgentFactory = Box<dyn Fn() -> Arc<dyn AgentAdapter> + Send + Sync>;

/// Whether an agent could be resolved at startup. Computed once and handed
/// to the controller, which never retries resolution.
#[derive(Clone)]
pub enum AgentCapability {
    Available(Arc<dyn AgentAdapter>),
    Unavailable { requested: String, reason: String },
}

impl AgentCapability {
    pub fn available(agent: impl AgentAdapter + 'static) -> Self {
        AgentCapability::Available(Arc::new(agent))
    }

    pub fn unavailable(requested: &str, reason: impl Into<String>) -> Self {
        AgentCapability::Unavailable {
            requested: requested.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AgentCapability::Available(_))
    }

    /// Name of the resolved adapter, or the name that failed to resolve
    pub fn adapter_name(&self) -> &str {
        match self {
            AgentCapability::Available(agent) => agent.name(),
            AgentCapability::Unavailable { requested, .. } => requested,
        }
    }
}

impl fmt::Debug for AgentCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentCapability::Available(agent) => {
                f.debug_tuple("Available").field(&agent.name()).finish()
            }
            AgentCapability::Unavailable { requested, reason } => f
                .debug_struct("Unavailable")
                .field("requested", requested)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Named agent constructors
pub struct AgentRegistry {
    factories: BTreeMap<String, AgentFactory>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the agents that ship with the runner
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("main_agent", || Arc::new(MainAgent::new()));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn AgentAdapter> + Send + Sync + 'static,
    {
        debug!("Registering agent adapter '{}'", name);
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn AgentAdapter>, AgentError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| AgentError::UnknownAdapter(name.to_string()))
    }

    /// Resolve `name` into a capability; an unknown name becomes `Unavailable`
    pub fn resolve(&self, name: &str) -> AgentCapability {
        match self.get(name) {
            Ok(agent) => {
                debug!("Resolved agent adapter '{}'", name);
                AgentCapability::Available(agent)
            }
            Err(e) => {
                error!("Failed to resolve agent adapter: {}", e);
                AgentCapability::unavailable(
                    name,
                    format!("{} (registered: {})", e, self.names().join(", ")),
                )
            }
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
