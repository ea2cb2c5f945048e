// =============================================================================
// Signals Module
// =============================================================================
//
// Turns per-symbol series into alert candidates:
// - Stage classification (breakout / accumulation / overheat)
// - Strength scoring (1..=5)
// - Tiering and AGGRESSIVE -> SAFE confirmation lookup
// - Dedup / cooldown gate

pub mod dedup;
pub mod evaluator;
pub mod stage;
pub mod strength;
pub mod tiering;

pub use dedup::{AlertKey, DedupGate, GateVerdict};
pub use evaluator::{evaluate_symbol, StageObservation};
pub use tiering::confirmation_age;
