//! Candidate action proposals produced by agents.

use serde::{Deserialize, Serialize};

use qsai_state::{canonical_digest, ContentDigest};

use crate::domain::error::Result;

/// A candidate action with an estimated value, confidence, and cost,
/// produced by one agent in response to one context snapshot.
///
/// Proposals are immutable and live for a single decision cycle; after
/// that they survive only inside the audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProposal {
    /// Agent that produced this proposal.
    pub agent_id: String,
    /// Candidate action identifier.
    pub action_id: String,
    /// Opaque structured data interpreted by the action executor.
    pub payload: serde_json::Value,
    /// Expected value of taking this action (business units).
    pub expected_value: f64,
    /// Confidence in [0, 1]; clamped at construction.
    pub confidence: f64,
    /// Estimated cost (compute or business cost, same scale as value).
    pub cost: f64,
    /// Exclusivity slot. Proposals sharing a slot are mutually exclusive;
    /// `None` means the action id is its own slot.
    pub slot: Option<String>,
}

impl AgentProposal {
    pub fn new(
        agent_id: impl Into<String>,
        action_id: impl Into<String>,
        expected_value: f64,
        confidence: f64,
        cost: f64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            action_id: action_id.into(),
            payload: serde_json::Value::Null,
            expected_value,
            confidence: confidence.clamp(0.0, 1.0),
            cost,
            slot: None,
        }
    }

    /// Attach an executor payload (builder pattern).
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Place this proposal in an exclusivity slot (builder pattern).
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// The exclusivity key: the declared slot, or the action id itself.
    pub fn slot_key(&self) -> &str {
        self.slot.as_deref().unwrap_or(&self.action_id)
    }

    /// Canonical content digest of this proposal.
    pub fn digest(&self) -> Result<ContentDigest> {
        Ok(canonical_digest(&serde_json::to_value(self)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(AgentProposal::new("a", "act", 1.0, 1.7, 0.0).confidence, 1.0);
        assert_eq!(
            AgentProposal::new("a", "act", 1.0, -0.3, 0.0).confidence,
            0.0
        );
    }

    #[test]
    fn slot_key_falls_back_to_action_id() {
        let bare = AgentProposal::new("a", "offer-basic", 1.0, 0.5, 0.0);
        assert_eq!(bare.slot_key(), "offer-basic");

        let slotted = bare.clone().with_slot("offer");
        assert_eq!(slotted.slot_key(), "offer");
    }

    #[test]
    fn digest_differs_by_content() {
        let p1 = AgentProposal::new("a", "act", 5.0, 0.8, 1.0);
        let p2 = AgentProposal::new("a", "act", 3.0, 0.8, 1.0);
        assert_ne!(p1.digest().unwrap(), p2.digest().unwrap());
    }
}
