//! Safety arbiter: deterministic, policy-driven proposal filtering.
//!
//! Evaluates [`AgentProposal`]s against a [`SafetyPolicy`] before any
//! optimization occurs. This stage has the final word on safety and is
//! never overridden by the optimizer. It is pure and synchronous: no
//! I/O, no randomness, fully reproducible given identical inputs and
//! policy version.

use serde::{Deserialize, Serialize};

use crate::domain::{AgentProposal, ContextVector};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// A single safety rule that can exclude a proposal.
///
/// Rules are evaluated in the policy's declared order; a proposal is
/// rejected on the first rule it violates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SafetyRule {
    /// The named numeric signal must not exceed `max`.
    ///
    /// A signal absent from the context is not a violation — thresholds
    /// gate on evidence, not on missing data.
    MaxSignal {
        rule_id: String,
        signal: String,
        max: f64,
    },
    /// The named numeric signal must not fall below `min`.
    MinSignal {
        rule_id: String,
        signal: String,
        min: f64,
    },
    /// The action id is forbidden while all `when_flags` are active.
    /// Empty `when_flags` forbids the action unconditionally.
    ForbidAction {
        rule_id: String,
        action_id: String,
        #[serde(default)]
        when_flags: Vec<String>,
    },
}

impl SafetyRule {
    /// Identifier recorded against rejections for traceability.
    pub fn rule_id(&self) -> &str {
        match self {
            SafetyRule::MaxSignal { rule_id, .. } => rule_id,
            SafetyRule::MinSignal { rule_id, .. } => rule_id,
            SafetyRule::ForbidAction { rule_id, .. } => rule_id,
        }
    }
}

/// A named, versioned set of safety rules.
///
/// Loaded at startup/config time; the version id is recorded in every
/// audit entry so a cycle can always be replayed against the policy it
/// actually ran under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub version: String,
    pub rules: Vec<SafetyRule>,
}

impl SafetyPolicy {
    /// A policy with no rules — everything passes.
    pub fn permissive(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule (builder pattern).
    pub fn with_rule(mut self, rule: SafetyRule) -> Self {
        self.rules.push(rule);
        self
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// A proposal excluded by the arbiter, with the first violated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Index of the proposal in the collected list.
    pub proposal_index: usize,
    /// Action id the proposal carried.
    pub action_id: String,
    /// Identifier of the violated rule.
    pub rule_id: String,
    /// Human-readable explanation.
    pub reason: String,
}

/// The outcome of filtering one cycle's proposals.
///
/// Rejections are never silently dropped: every one is carried into the
/// cycle's audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbiterVerdict {
    /// Proposals with no rule violation, in their original order.
    pub passed: Vec<AgentProposal>,
    /// Excluded proposals with the rule that excluded them.
    pub rejections: Vec<Rejection>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Filter proposals against the active policy.
///
/// For each proposal, rules are evaluated in declared order and the
/// first violation short-circuits with that rule's identifier.
pub fn filter(
    proposals: Vec<AgentProposal>,
    context: &ContextVector,
    policy: &SafetyPolicy,
) -> ArbiterVerdict {
    let mut passed = Vec::with_capacity(proposals.len());
    let mut rejections = Vec::new();

    for (index, proposal) in proposals.into_iter().enumerate() {
        match first_violation(&proposal, context, policy) {
            Some((rule_id, reason)) => {
                rejections.push(Rejection {
                    proposal_index: index,
                    action_id: proposal.action_id.clone(),
                    rule_id,
                    reason,
                });
            }
            None => passed.push(proposal),
        }
    }

    ArbiterVerdict { passed, rejections }
}

fn first_violation(
    proposal: &AgentProposal,
    context: &ContextVector,
    policy: &SafetyPolicy,
) -> Option<(String, String)> {
    for rule in &policy.rules {
        if let Some(reason) = check_rule(rule, proposal, context) {
            return Some((rule.rule_id().to_string(), reason));
        }
    }
    None
}

fn check_rule(
    rule: &SafetyRule,
    proposal: &AgentProposal,
    context: &ContextVector,
) -> Option<String> {
    match rule {
        SafetyRule::MaxSignal { signal, max, .. } => {
            let value = context.numeric_signal(signal)?;
            if value > *max {
                Some(format!("signal '{signal}' = {value} exceeds max {max}"))
            } else {
                None
            }
        }
        SafetyRule::MinSignal { signal, min, .. } => {
            let value = context.numeric_signal(signal)?;
            if value < *min {
                Some(format!("signal '{signal}' = {value} below min {min}"))
            } else {
                None
            }
        }
        SafetyRule::ForbidAction {
            action_id,
            when_flags,
            ..
        } => {
            if proposal.action_id != *action_id {
                return None;
            }
            if when_flags.iter().all(|f| context.has_flag(f)) {
                if when_flags.is_empty() {
                    Some(format!("action '{action_id}' is forbidden"))
                } else {
                    Some(format!(
                        "action '{action_id}' is forbidden while flags [{}] are active",
                        when_flags.join(", ")
                    ))
                }
            } else {
                None
            }
        }
    }
}
