// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free numeric helpers shared by the classifiers.  Every
// function returns `Option` (or an empty series) on insufficient data so that
// callers can fail soft.

pub mod ema;
pub mod range;
pub mod roc;
pub mod volume;
