//! Decision Engine — ranked induction lists with explainable reasoning

mod decision;
mod fingerprint;

pub use decision::{DecisionEngine, DecisionError};
pub use fingerprint::inputs_hash;
