use std::{io, path::PathBuf, time::Duration};

use tunefish_params::ParameterSet;

use crate::{outcome::MatchOutcome, parse::RatingSummary};

/// Everything one paired match produced, from theta-plus's perspective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    /// The runner's own rating line when it printed one. Diagnostics only;
    /// the parameter update never consumes it.
    pub rating: Option<RatingSummary>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EvaluateError {
    #[display("failed to launch match runner {}", runner.display())]
    Spawn { runner: PathBuf, source: io::Error },
    #[display("failed to collect match runner output")]
    Io { source: io::Error },
    #[display("match runner still running after {}s, killed", timeout.as_secs())]
    Timeout { timeout: Duration },
}

/// The seam between the optimizer and the match plumbing.
///
/// Given the two candidate configurations of one iteration, play `games`
/// paired games (an even count, so colors can alternate round by round) and
/// reduce the runner's output to a report. Every error this returns is
/// recoverable at the optimizer boundary: the iteration is skipped and the
/// run continues.
pub trait MatchEvaluator {
    fn evaluate(
        &self,
        theta_plus: &ParameterSet,
        theta_minus: &ParameterSet,
        games: u32,
    ) -> Result<MatchReport, EvaluateError>;
}
