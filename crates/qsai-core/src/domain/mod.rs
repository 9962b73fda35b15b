//! Domain types for the QSAI decision engine.

pub mod context;
pub mod decision;
pub mod error;
pub mod proposal;

pub use context::{ConsentLevel, ContextVector, SignalGroup, SignalValue};
pub use decision::{Decision, SolverPath, NO_ACTION};
pub use error::{EngineError, Result};
pub use proposal::AgentProposal;
