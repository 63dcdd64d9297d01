//! Match evaluation against an external match runner.
//!
//! The tuner never plays games itself. Each iteration hands two candidate
//! configurations of the same engine to a cutechess-cli / fastchess style
//! match runner and reduces the runner's textual output to a
//! [`MatchOutcome`]. The runner's output format is not a stable contract, so
//! the reduction recognizes both the per-game result lines and the aggregate
//! score line, and it treats "nothing parseable" as an empty outcome rather
//! than an error: a flaky external tool must never abort a whole tuning run.
//!
//! [`MatchEvaluator`] is the seam the optimizer sees; [`MatchRunner`] is the
//! production implementation that actually spawns the runner process.

pub use self::{evaluator::*, outcome::*, parse::*, runner::*};

pub mod evaluator;
pub mod outcome;
pub mod parse;
pub mod runner;
