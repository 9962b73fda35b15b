//! Situational context snapshots.
//!
//! A [`ContextVector`] is one immutable snapshot of everything the engine
//! knows about a subject at a point in time: named signal groups
//! (telemetry, business attributes, market signals, embeddings), active
//! safety flags, and the subject's consent level. A newer snapshot
//! supersedes the prior one for the same subject; nothing mutates a
//! captured vector.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use qsai_state::{canonical_digest, ContentDigest};

use crate::domain::error::Result;

/// A single signal value inside a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Number(f64),
    Text(String),
}

impl SignalValue {
    /// The numeric form, if this signal is numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) => Some(*n),
            SignalValue::Text(_) => None,
        }
    }
}

/// A named group of signals ("telemetry", "market", ...).
pub type SignalGroup = BTreeMap<String, SignalValue>;

/// The subject's privacy/consent level at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentLevel {
    /// Full consent: all signal groups usable.
    Full,
    /// Restricted consent: sensitive groups should be absent upstream.
    Restricted,
    /// No consent: context carries only operational signals.
    None,
}

/// One immutable snapshot of situational signals for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextVector {
    /// Subject this snapshot describes.
    pub subject: String,
    /// Capture timestamp; the store enforces strict per-subject ordering.
    pub captured_at: DateTime<Utc>,
    /// Named signal groups mapping signal names to values.
    pub signals: BTreeMap<String, SignalGroup>,
    /// Active safety flags (e.g. "vulnerable-customer", "market-halt").
    pub safety_flags: BTreeSet<String>,
    /// Consent level at capture time.
    pub consent: ConsentLevel,
}

impl ContextVector {
    /// Create a snapshot captured now.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            captured_at: Utc::now(),
            signals: BTreeMap::new(),
            safety_flags: BTreeSet::new(),
            consent: ConsentLevel::Full,
        }
    }

    /// Add a numeric signal (builder pattern).
    pub fn with_signal(mut self, group: &str, name: &str, value: f64) -> Self {
        self.signals
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string(), SignalValue::Number(value));
        self
    }

    /// Add a safety flag (builder pattern).
    pub fn with_flag(mut self, flag: &str) -> Self {
        self.safety_flags.insert(flag.to_string());
        self
    }

    /// Look up a numeric signal.
    ///
    /// Accepts a dotted `"group.name"` path, or a bare name which is
    /// searched across all groups (first group in key order wins).
    pub fn numeric_signal(&self, name: &str) -> Option<f64> {
        if let Some((group, signal)) = name.split_once('.') {
            return self
                .signals
                .get(group)
                .and_then(|g| g.get(signal))
                .and_then(SignalValue::as_number);
        }
        self.signals
            .values()
            .find_map(|g| g.get(name).and_then(SignalValue::as_number))
    }

    /// Whether the given safety flag is active.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.safety_flags.contains(flag)
    }

    /// Canonical content digest of the full snapshot.
    pub fn digest(&self) -> Result<ContentDigest> {
        Ok(canonical_digest(&serde_json::to_value(self)?)?)
    }
}
