//! Agent plugin interface and registry.
//!
//! Any component implementing [`Agent`] can register: the engine depends
//! only on the "propose given context" capability, never on a pod's
//! internals. Registration is an explicit insertion-ordered table keyed
//! by agent id — registration order is the deterministic tie-break used
//! downstream.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::error::{EngineError, Result};
use crate::domain::{AgentProposal, ContextVector};

/// Declared agent specialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentKind {
    /// Proposes what to offer.
    Offer,
    /// Proposes when to act.
    Timing,
    /// Proposes which channel to act through.
    Channel,
    /// Proposes risk mitigations.
    Risk,
    /// A business-pod-specific specialization.
    Custom(String),
}

/// Error returned by a misbehaving agent. Absorbed by the collector and
/// never propagated to the caller.
#[derive(Debug, thiserror::Error)]
#[error("agent failed: {0}")]
pub struct AgentError(pub String);

/// The single capability the engine requires of a proposal source.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent identifier.
    fn id(&self) -> &str;

    /// Declared specialization.
    fn kind(&self) -> AgentKind;

    /// Produce zero or more proposals for the given context.
    ///
    /// Must complete within the collector's deadline; an agent that
    /// neither responds nor errors in time contributes nothing for the
    /// cycle.
    async fn propose(
        &self,
        context: &ContextVector,
    ) -> std::result::Result<Vec<AgentProposal>, AgentError>;
}

/// Insertion-ordered table of registered agents.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Fails with [`EngineError::DuplicateAgent`] when
    /// the id is already present.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        if self.agents.iter().any(|a| a.id() == agent.id()) {
            return Err(EngineError::DuplicateAgent {
                agent_id: agent.id().to_string(),
            });
        }
        self.agents.push(agent);
        Ok(())
    }

    /// Registered agents in registration order.
    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAgent {
        id: String,
    }

    #[async_trait]
    impl Agent for NullAgent {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> AgentKind {
            AgentKind::Offer
        }

        async fn propose(
            &self,
            _context: &ContextVector,
        ) -> std::result::Result<Vec<AgentProposal>, AgentError> {
            Ok(vec![])
        }
    }

    #[test]
    fn register_preserves_order() {
        let mut registry = AgentRegistry::new();
        for id in ["a", "b", "c"] {
            registry
                .register(Arc::new(NullAgent { id: id.to_string() }))
                .unwrap();
        }
        let ids: Vec<&str> = registry.agents().iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut registry = AgentRegistry::new();
        registry
            .register(Arc::new(NullAgent {
                id: "a".to_string(),
            }))
            .unwrap();
        let err = registry
            .register(Arc::new(NullAgent {
                id: "a".to_string(),
            }))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateAgent { .. }));
    }
}
