use std::collections::BTreeMap;

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;

use tunefish_match::{EvaluateError, MatchEvaluator, MatchOutcome, RatingSummary};
use tunefish_params::{ManifestError, ParameterManifest, ParameterSet, TuningState};

use crate::gains::GainSchedule;

/// Immutable configuration of a tuning run, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpsaConfig {
    pub gains: GainSchedule,
    /// Update amplification. A single paired match is a very noisy
    /// one-sample gradient estimate, and without amplification the decaying
    /// update gain barely moves integer-scale parameters. This constant
    /// trades convergence speed against stability; values around 10-20 have
    /// worked in practice, and it is configuration on purpose rather than a
    /// literal buried in the update rule.
    pub scale: f64,
    /// Paired games per iteration. Must be even so every round plays both
    /// colors.
    pub games_per_iteration: u32,
    /// Total iteration budget, global across all resumed chunks.
    pub max_iterations: u64,
}

impl Default for SpsaConfig {
    fn default() -> Self {
        Self {
            gains: GainSchedule::default(),
            scale: 10.0,
            games_per_iteration: 20,
            max_iterations: 100,
        }
    }
}

impl SpsaConfig {
    /// Rejects configurations that would break the gain-decay contract or
    /// the round pairing before any iteration runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("a", self.gains.step),
            ("c", self.gains.perturbation),
            ("alpha", self.gains.alpha),
            ("gamma", self.gains.gamma),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveGain { name, value });
            }
        }
        if !self.gains.stability.is_finite() || self.gains.stability < 0.0 {
            return Err(ConfigError::NegativeStability {
                value: self.gains.stability,
            });
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::NonPositiveScale { value: self.scale });
        }
        if self.games_per_iteration == 0 || self.games_per_iteration % 2 != 0 {
            return Err(ConfigError::InvalidGamesCount {
                games: self.games_per_iteration,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::EmptyBudget);
        }
        Ok(())
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("gain constant {name} must be positive, got {value}")]
    NonPositiveGain { name: &'static str, value: f64 },
    #[display("stability constant A must be non-negative, got {value}")]
    NegativeStability { value: f64 },
    #[display("update scale must be positive, got {value}")]
    NonPositiveScale { value: f64 },
    #[display("games per iteration must be a positive even number, got {games}")]
    InvalidGamesCount { games: u32 },
    #[display("iteration budget must be positive")]
    EmptyBudget,
}

/// Fatal construction-time failures. Everything here aborts the run before
/// the first iteration; per-iteration failures never surface through this
/// type.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum OptimizerError {
    #[display("{_0}")]
    Config(#[error(source)] ConfigError),
    #[display("{_0}")]
    Manifest(#[error(source)] ManifestError),
}

/// What one iteration did, for the caller to narrate, checkpoint, and test.
#[derive(Debug)]
pub struct IterationReport {
    /// 1-indexed global iteration number that just completed.
    pub iteration: u64,
    /// Update gain `a_k` used this iteration.
    pub step_gain: f64,
    /// Perturbation gain `c_k` used this iteration.
    pub perturbation_gain: f64,
    pub result: IterationResult,
}

#[derive(Debug)]
pub enum IterationResult {
    /// The match produced games; the parameter vector moved.
    Updated {
        outcome: MatchOutcome,
        rating: Option<RatingSummary>,
        score_diff: f64,
    },
    /// No usable signal this iteration. Values untouched, counter advanced.
    Skipped { reason: SkipReason },
}

#[derive(Debug, derive_more::Display)]
pub enum SkipReason {
    #[display("no games could be parsed from the runner output")]
    EmptyMatch,
    #[display("{_0}")]
    Evaluation(EvaluateError),
}

/// The SPSA loop.
///
/// Owns the live parameter set and the global iteration counter for the
/// duration of a run; persistence only ever sees [`Self::state`] snapshots.
/// One iteration costs exactly one match-runner invocation no matter how
/// many parameters are being tuned.
#[derive(Debug)]
pub struct SpsaOptimizer<E> {
    config: SpsaConfig,
    evaluator: E,
    parameters: ParameterSet,
    iteration: u64,
    rng: Pcg32,
}

impl<E> SpsaOptimizer<E>
where
    E: MatchEvaluator,
{
    /// Builds an optimizer for a fresh or resumed run.
    ///
    /// The counter continues from `state.iteration` and never resets;
    /// restarting it would rewind the gain decay and destabilize parameters
    /// that had already settled.
    pub fn from_state(
        config: SpsaConfig,
        evaluator: E,
        manifest: &ParameterManifest,
        state: &TuningState,
        seed: u64,
    ) -> Result<Self, OptimizerError> {
        config.validate()?;
        manifest.validate()?;
        let parameters = manifest.parameter_set_with_values(&state.parameters)?;
        Ok(Self {
            config,
            evaluator,
            parameters,
            iteration: state.iteration,
            rng: Pcg32::seed_from_u64(seed),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SpsaConfig {
        &self.config
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Completed-iteration counter, global across resumed chunks.
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// True once the total iteration budget is spent.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.iteration >= self.config.max_iterations
    }

    /// Snapshot of the live state for checkpointing.
    #[must_use]
    pub fn state(&self) -> TuningState {
        TuningState {
            iteration: self.iteration,
            parameters: self.parameters.values(),
        }
    }

    /// Runs one full iteration and advances the counter.
    ///
    /// The counter advances even when the iteration is skipped: retrying a
    /// flaky external tool at the same index forever would stall the gain
    /// decay, so a failed match costs one iteration and nothing else.
    pub fn step(&mut self) -> IterationReport {
        let k = self.iteration + 1;
        let step_gain = self.config.gains.step_gain(k);
        let perturbation_gain = self.config.gains.perturbation_gain(k);

        let direction = self.draw_direction();
        let (theta_plus, theta_minus) = self.perturbed_pair(&direction, perturbation_gain);

        let result = match self.evaluator.evaluate(
            &theta_plus,
            &theta_minus,
            self.config.games_per_iteration,
        ) {
            Ok(report) => match report.outcome.score_diff() {
                Some(score_diff) => {
                    self.apply_update(&direction, score_diff, step_gain, perturbation_gain);
                    IterationResult::Updated {
                        outcome: report.outcome,
                        rating: report.rating,
                        score_diff,
                    }
                }
                None => IterationResult::Skipped {
                    reason: SkipReason::EmptyMatch,
                },
            },
            Err(error) => IterationResult::Skipped {
                reason: SkipReason::Evaluation(error),
            },
        };

        self.iteration = k;
        IterationReport {
            iteration: k,
            step_gain,
            perturbation_gain,
            result,
        }
    }

    /// One fair Bernoulli draw per parameter, independent across parameters
    /// and iterations. The symmetric ±1 distribution is what makes the
    /// two-sided difference an unbiased direction estimate.
    fn draw_direction(&mut self) -> BTreeMap<String, f64> {
        let names: Vec<String> = self
            .parameters
            .iter()
            .map(|(name, _)| name.to_owned())
            .collect();
        names
            .into_iter()
            .map(|name| {
                let sign = if self.rng.random() { 1.0 } else { -1.0 };
                (name, sign)
            })
            .collect()
    }

    /// Builds the candidate pair along `direction`, each side clamped into
    /// bounds independently. Near a bound the pair loses mirror symmetry;
    /// that asymmetry is an accepted approximation.
    fn perturbed_pair(
        &self,
        direction: &BTreeMap<String, f64>,
        perturbation_gain: f64,
    ) -> (ParameterSet, ParameterSet) {
        let mut plus = BTreeMap::new();
        let mut minus = BTreeMap::new();
        for (name, p) in self.parameters.iter() {
            let offset = perturbation_gain * direction[name] * p.step;
            plus.insert(name.to_owned(), p.clamp(p.value + offset));
            minus.insert(name.to_owned(), p.clamp(p.value - offset));
        }
        (
            self.parameters.with_values(&plus),
            self.parameters.with_values(&minus),
        )
    }

    /// Applies the SPSA update to every parameter and clamps.
    fn apply_update(
        &mut self,
        direction: &BTreeMap<String, f64>,
        score_diff: f64,
        step_gain: f64,
        perturbation_gain: f64,
    ) {
        let mut next = BTreeMap::new();
        for (name, p) in self.parameters.iter() {
            let gradient = score_diff / (2.0 * perturbation_gain * direction[name]);
            let value = p.value + step_gain * gradient * p.step * self.config.scale;
            next.insert(name.to_owned(), value);
        }
        self.parameters.apply_values(&next);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tunefish_match::MatchReport;
    use tunefish_params::{ParameterKind, ParameterSpec};

    use super::*;

    /// Evaluator stub returning a fixed outcome, or a timeout when `None`.
    #[derive(Debug)]
    struct StubEvaluator {
        outcome: Option<MatchOutcome>,
    }

    impl MatchEvaluator for StubEvaluator {
        fn evaluate(
            &self,
            _theta_plus: &ParameterSet,
            _theta_minus: &ParameterSet,
            _games: u32,
        ) -> Result<MatchReport, EvaluateError> {
            match self.outcome {
                Some(outcome) => Ok(MatchReport {
                    outcome,
                    rating: None,
                }),
                None => Err(EvaluateError::Timeout {
                    timeout: Duration::from_secs(1),
                }),
            }
        }
    }

    fn spec(default: f64) -> ParameterSpec {
        ParameterSpec {
            default,
            min: 0.0,
            max: 10.0,
            step: 1.0,
            kind: ParameterKind::Float,
        }
    }

    fn three_param_manifest() -> ParameterManifest {
        ParameterManifest {
            parameters: BTreeMap::from([
                ("p1".to_owned(), spec(5.0)),
                ("p2".to_owned(), spec(5.0)),
                ("p3".to_owned(), spec(5.0)),
            ]),
        }
    }

    fn optimizer(
        outcome: Option<MatchOutcome>,
        state: &TuningState,
    ) -> SpsaOptimizer<StubEvaluator> {
        SpsaOptimizer::from_state(
            SpsaConfig::default(),
            StubEvaluator { outcome },
            &three_param_manifest(),
            state,
            7,
        )
        .unwrap()
    }

    #[test]
    fn test_perturbed_pair_matches_hand_computation() {
        let opt = optimizer(Some(MatchOutcome::new(1, 0, 1)), &TuningState::default());
        let direction = BTreeMap::from([
            ("p1".to_owned(), 1.0),
            ("p2".to_owned(), 1.0),
            ("p3".to_owned(), -1.0),
        ]);
        let (plus, minus) = opt.perturbed_pair(&direction, 0.5);

        assert_eq!(plus.get("p1").unwrap().value, 5.5);
        assert_eq!(plus.get("p2").unwrap().value, 5.5);
        assert_eq!(plus.get("p3").unwrap().value, 4.5);
        assert_eq!(minus.get("p1").unwrap().value, 4.5);
        assert_eq!(minus.get("p2").unwrap().value, 4.5);
        assert_eq!(minus.get("p3").unwrap().value, 5.5);
    }

    #[test]
    fn test_perturbed_pair_clamps_each_side_independently() {
        let manifest = three_param_manifest();
        let state = TuningState {
            iteration: 0,
            parameters: BTreeMap::from([("p1".to_owned(), 9.8)]),
        };
        let opt = SpsaOptimizer::from_state(
            SpsaConfig::default(),
            StubEvaluator { outcome: None },
            &manifest,
            &state,
            7,
        )
        .unwrap();

        let direction = BTreeMap::from([
            ("p1".to_owned(), 1.0),
            ("p2".to_owned(), 1.0),
            ("p3".to_owned(), 1.0),
        ]);
        let (plus, minus) = opt.perturbed_pair(&direction, 0.5);
        // the plus side hits the upper bound; the minus side does not mirror it
        assert_eq!(plus.get("p1").unwrap().value, 10.0);
        assert_eq!(minus.get("p1").unwrap().value, 9.3);
    }

    #[test]
    fn test_update_matches_hand_computation() {
        let mut opt = optimizer(Some(MatchOutcome::new(12, 4, 4)), &TuningState::default());
        let direction = BTreeMap::from([
            ("p1".to_owned(), 1.0),
            ("p2".to_owned(), -1.0),
            ("p3".to_owned(), 1.0),
        ]);
        // score_diff 0.4, c_k 0.5 => gradient ±0.4; a_k 0.1, step 1, default scale 10
        opt.apply_update(&direction, 0.4, 0.1, 0.5);

        assert!((opt.parameters().get("p1").unwrap().value - 5.4).abs() < 1e-12);
        assert!((opt.parameters().get("p2").unwrap().value - 4.6).abs() < 1e-12);
        assert!((opt.parameters().get("p3").unwrap().value - 5.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_match_skips_update_but_advances_counter() {
        let mut opt = optimizer(Some(MatchOutcome::default()), &TuningState::default());
        let before = opt.parameters().values();

        let report = opt.step();

        assert_eq!(report.iteration, 1);
        assert_eq!(opt.iteration(), 1);
        assert!(matches!(
            report.result,
            IterationResult::Skipped {
                reason: SkipReason::EmptyMatch
            }
        ));
        assert_eq!(opt.parameters().values(), before);
    }

    #[test]
    fn test_evaluation_failure_skips_update_but_advances_counter() {
        let mut opt = optimizer(None, &TuningState::default());
        let before = opt.parameters().values();

        let report = opt.step();

        assert_eq!(opt.iteration(), 1);
        assert!(matches!(
            report.result,
            IterationResult::Skipped {
                reason: SkipReason::Evaluation(EvaluateError::Timeout { .. })
            }
        ));
        assert_eq!(opt.parameters().values(), before);
    }

    #[test]
    fn test_values_stay_in_bounds_over_many_iterations() {
        // all-wins outcomes push hard in one direction every iteration
        let mut opt = optimizer(Some(MatchOutcome::new(20, 0, 0)), &TuningState::default());
        for _ in 0..200 {
            opt.step();
        }
        for (_, p) in opt.parameters().iter() {
            assert!(p.value >= p.min && p.value <= p.max);
        }
    }

    #[test]
    fn test_resumed_counter_continues_gain_schedule() {
        let outcome = Some(MatchOutcome::new(1, 0, 1));

        let mut uninterrupted = optimizer(outcome, &TuningState::default());
        let mut last = None;
        for _ in 0..5 {
            last = Some(uninterrupted.step());
        }
        let last = last.unwrap();

        // resume a second optimizer from the state after 4 iterations
        let resumed_state = TuningState {
            iteration: 4,
            ..TuningState::default()
        };
        let mut resumed = optimizer(outcome, &resumed_state);
        let report = resumed.step();

        assert_eq!(report.iteration, last.iteration);
        assert_eq!(report.step_gain, last.step_gain);
        assert_eq!(report.perturbation_gain, last.perturbation_gain);
    }

    #[test]
    fn test_same_seed_reproduces_the_same_walk() {
        let outcome = Some(MatchOutcome::new(12, 4, 4));
        let mut a = optimizer(outcome, &TuningState::default());
        let mut b = optimizer(outcome, &TuningState::default());
        for _ in 0..20 {
            a.step();
            b.step();
        }
        assert_eq!(a.parameters().values(), b.parameters().values());
        // the walk actually moved somewhere
        assert_ne!(
            a.parameters().values(),
            three_param_manifest().parameter_set().values()
        );
    }

    #[test]
    fn test_state_snapshot_reflects_live_values() {
        let mut opt = optimizer(Some(MatchOutcome::new(12, 4, 4)), &TuningState::default());
        opt.step();
        let state = opt.state();
        assert_eq!(state.iteration, 1);
        assert_eq!(state.parameters, opt.parameters().values());
    }

    #[test]
    fn test_budget_exhausted_after_max_iterations() {
        let state = TuningState {
            iteration: 99,
            ..TuningState::default()
        };
        let mut opt = optimizer(Some(MatchOutcome::new(1, 1, 0)), &state);
        assert!(!opt.budget_exhausted());
        opt.step();
        assert!(opt.budget_exhausted());
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let config = SpsaConfig {
            games_per_iteration: 7,
            ..SpsaConfig::default()
        };
        let err = SpsaOptimizer::from_state(
            config,
            StubEvaluator { outcome: None },
            &three_param_manifest(),
            &TuningState::default(),
            7,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::Config(ConfigError::InvalidGamesCount { games: 7 })
        ));
    }

    #[test]
    fn test_odd_and_zero_games_are_invalid() {
        for games in [0, 3, 7] {
            let config = SpsaConfig {
                games_per_iteration: games,
                ..SpsaConfig::default()
            };
            assert!(config.validate().is_err(), "games={games} should be invalid");
        }
        assert!(SpsaConfig::default().validate().is_ok());
    }
}
