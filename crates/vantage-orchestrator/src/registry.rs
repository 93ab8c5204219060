//! Agent registry.
//!
//! Maps agent identifiers to implementations. Adding an agent means
//! registering it here; nothing else in the subsystem changes.

use crate::Agent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Metadata about a registered agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMetadata {
    /// The agent's unique ID.
    pub id: String,
    /// The agent's description.
    pub description: String,
}

/// Registry for managing agents.
pub struct AgentRegistry {
    /// Map of agent ID to agent instance.
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agent_count", &self.agents.try_read().map(|a| a.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl AgentRegistry {
    /// Creates a new empty agent registry.
    #[must_use]
    pub fn new() -> Self {
        Self { agents: RwLock::new(HashMap::new()) }
    }

    /// Registers an agent.
    ///
    /// # Returns
    /// `true` if the agent was newly registered, `false` if it replaced an
    /// existing agent with the same ID.
    pub async fn register(&self, agent: Arc<dyn Agent>) -> bool {
        let id = agent.id().to_string();

        debug!(agent_id = %id, "Registering agent");

        let mut agents = self.agents.write().await;
        let was_new = !agents.contains_key(&id);
        agents.insert(id.clone(), agent);

        if !was_new {
            warn!(agent_id = %id, "Agent replaced in registry");
        }

        was_new
    }

    /// Retrieves an agent by ID.
    pub async fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        let agents = self.agents.read().await;
        agents.get(id).cloned()
    }

    /// Lists all registered agents with their metadata, sorted by ID.
    pub async fn list(&self) -> Vec<AgentMetadata> {
        let agents = self.agents.read().await;
        let mut metadata: Vec<AgentMetadata> = agents
            .values()
            .map(|agent| AgentMetadata {
                id: agent.id().to_string(),
                description: agent.description().to_string(),
            })
            .collect();
        metadata.sort_by(|a, b| a.id.cmp(&b.id));
        metadata
    }

    /// Checks if an agent is registered.
    pub async fn contains(&self, id: &str) -> bool {
        let agents = self.agents.read().await;
        agents.contains_key(id)
    }

    /// Returns the number of registered agents.
    pub async fn count(&self) -> usize {
        let agents = self.agents.read().await;
        agents.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
