//! Simultaneous-perturbation tuning of engine parameters from match results.
//!
//! This crate implements the optimization loop that drives the whole tuner:
//! SPSA (Simultaneous Perturbation Stochastic Approximation). No gradient of
//! the underlying objective ("engine strength") is observable; the only
//! feedback is the win/loss/draw outcome of a paired match between two
//! configurations of the same engine.
//!
//! # How an iteration works
//!
//! 1. **Gains**: compute the decaying gains for the 1-indexed iteration
//!    `k`: perturbation gain `c_k = c / (k + A)^gamma` and update gain
//!    `a_k = a / (k + A)^alpha`. Both shrink monotonically, which is what
//!    lets the walk settle despite single-sample noise.
//! 2. **Direction**: one fair ±1 Bernoulli draw per parameter.
//! 3. **Candidates**: offset every parameter by `±c_k * direction * step`,
//!    clamping each side into its bounds independently.
//! 4. **Match**: play the two candidates against each other through the
//!    external match runner. This is the defining economy of SPSA: one
//!    two-sided comparison per iteration serves every parameter at once,
//!    instead of one comparison per parameter.
//! 5. **Update**: reduce the outcome to a normalized score difference and
//!    move every parameter by `a_k * (score_diff / (2 c_k direction)) *
//!    step * scale`, clamped back into bounds.
//! 6. **Advance**: the global counter increments whether or not an update
//!    was applied; a match that produced nothing usable is a skipped
//!    iteration, never a retry loop against a flaky tool.
//!
//! The optimizer owns its parameter set and counter for the duration of a
//! run. Persistence sees snapshots only, and a resumed run continues the
//! counter exactly where it stopped, keeping the gain decay continuous
//! across process boundaries.

pub use self::{gains::*, optimizer::*};

pub mod gains;
pub mod optimizer;
