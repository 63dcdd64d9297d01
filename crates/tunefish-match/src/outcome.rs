use serde::{Deserialize, Serialize};

/// Win/loss/draw tally of one paired match, from theta-plus's perspective.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("W{wins}-L{losses}-D{draws}")]
pub struct MatchOutcome {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl MatchOutcome {
    #[must_use]
    pub fn new(wins: u32, losses: u32, draws: u32) -> Self {
        Self {
            wins,
            losses,
            draws,
        }
    }

    #[must_use]
    pub fn total_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// True when no games were played or parsed. The optimizer skips the
    /// iteration in that case instead of updating on nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_games() == 0
    }

    /// Normalized score difference `(wins - losses) / total` in `[-1, 1]`.
    ///
    /// Draws widen the denominator but move neither side. `None` when the
    /// total is zero; the division is never attempted.
    #[must_use]
    pub fn score_diff(&self) -> Option<f64> {
        let total = self.total_games();
        (total > 0).then(|| {
            (f64::from(self.wins) - f64::from(self.losses)) / f64::from(total)
        })
    }

    /// Points fraction `(wins + draws/2) / total` in `[0, 1]`, the quantity
    /// Elo estimates are computed from. `None` when the total is zero.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        let total = self.total_games();
        (total > 0).then(|| {
            (f64::from(self.wins) + 0.5 * f64::from(self.draws)) / f64::from(total)
        })
    }
}

/// Converts a points fraction into an Elo difference estimate.
///
/// Degenerate scores (all losses, all wins) clamp to ∓1000 instead of
/// producing infinities.
#[must_use]
pub fn score_to_elo(score: f64) -> f64 {
    if score <= 0.0 {
        return -1000.0;
    }
    if score >= 1.0 {
        return 1000.0;
    }
    -400.0 * (1.0 / score - 1.0).log10()
}
