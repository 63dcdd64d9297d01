use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use rand::Rng as _;

use tunefish_match::{MatchRunner, RunnerConfig, score_to_elo};
use tunefish_params::{ParameterSet, StateStore, TuningState};
use tunefish_spsa::{GainSchedule, IterationReport, IterationResult, SpsaConfig, SpsaOptimizer};

use crate::util;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TuneArg {
    /// Parameter manifest path
    #[arg(long)]
    manifest: PathBuf,
    /// Tuning state file; created on first run, resumed afterwards
    #[arg(long, default_value = "tuning_state.json")]
    state: PathBuf,
    /// Iterations to run in this invocation
    #[arg(long, default_value_t = 15)]
    iterations: u64,
    /// Total iteration budget across all invocations
    #[arg(long, default_value_t = 100)]
    max_iterations: u64,
    /// Paired games per iteration (must be even)
    #[arg(long, default_value_t = 20)]
    games: u32,
    /// Update-gain numerator (SPSA `a`)
    #[arg(long, default_value_t = 2.0)]
    step_gain: f64,
    /// Perturbation-gain numerator (SPSA `c`)
    #[arg(long, default_value_t = 4.0)]
    perturbation_gain: f64,
    /// Stability constant (SPSA `A`), about the expected iteration budget
    #[arg(long, default_value_t = 100.0)]
    stability: f64,
    /// Update-gain decay exponent
    #[arg(long, default_value_t = GainSchedule::CANONICAL_ALPHA)]
    alpha: f64,
    /// Perturbation-gain decay exponent
    #[arg(long, default_value_t = GainSchedule::CANONICAL_GAMMA)]
    gamma: f64,
    /// Update amplification on top of the decaying gain
    #[arg(long, default_value_t = 10.0)]
    update_scale: f64,
    /// Match runner binary
    #[arg(long, default_value = "./cutechess-cli")]
    runner: PathBuf,
    /// Engine binary under tuning
    #[arg(long, default_value = "./nextfish")]
    engine: PathBuf,
    /// Time control for both sides
    #[arg(long, default_value = "1+0.02")]
    tc: String,
    /// Concurrency hint forwarded to the runner
    #[arg(long, default_value_t = 2)]
    concurrency: u32,
    /// Fixed option applied to both sides, NAME=VALUE; repeatable
    #[arg(long = "each-option", value_name = "NAME=VALUE",
          default_values_t = [String::from("Hash=8"), String::from("Threads=1")])]
    each_option: Vec<String>,
    /// Opening book (PGN), played in random order when given
    #[arg(long)]
    book: Option<PathBuf>,
    /// Dump played games as PGN
    #[arg(long)]
    pgn_out: Option<PathBuf>,
    /// Kill a runner invocation after this many seconds
    #[arg(long, default_value_t = 2400)]
    timeout_secs: u64,
    /// Seed for the perturbation-direction draws; random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

pub(crate) fn run(arg: &TuneArg) -> anyhow::Result<()> {
    let manifest = util::read_manifest_file(&arg.manifest)?;

    let store = StateStore::new(&arg.state);
    let state = match store.load()? {
        Some(state) => {
            eprintln!(
                "Resuming from {} at iteration {}",
                store.path().display(),
                state.iteration
            );
            state
        }
        None => {
            eprintln!(
                "No state at {}, starting from manifest defaults",
                store.path().display()
            );
            TuningState {
                iteration: 0,
                parameters: manifest.parameter_set().values(),
            }
        }
    };

    let fixed_options = arg
        .each_option
        .iter()
        .map(|option| {
            option
                .split_once('=')
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .with_context(|| format!("invalid --each-option '{option}', expected NAME=VALUE"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let evaluator = MatchRunner::new(RunnerConfig {
        runner: arg.runner.clone(),
        engine: arg.engine.clone(),
        time_control: arg.tc.clone(),
        concurrency: arg.concurrency,
        fixed_options,
        opening_book: arg.book.clone(),
        pgn_out: arg.pgn_out.clone(),
        timeout: Duration::from_secs(arg.timeout_secs),
    });

    let config = SpsaConfig {
        gains: GainSchedule {
            step: arg.step_gain,
            perturbation: arg.perturbation_gain,
            stability: arg.stability,
            alpha: arg.alpha,
            gamma: arg.gamma,
        },
        scale: arg.update_scale,
        games_per_iteration: arg.games,
        max_iterations: arg.max_iterations,
    };

    let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
    let mut optimizer = SpsaOptimizer::from_state(config, evaluator, &manifest, &state, seed)?;

    if optimizer.budget_exhausted() {
        eprintln!(
            "Iteration budget ({}) already reached; nothing to do",
            arg.max_iterations
        );
        return Ok(());
    }

    let chunk = arg
        .iterations
        .min(arg.max_iterations - optimizer.iteration());
    eprintln!(
        "Tuning {} parameter(s) for {chunk} iteration(s) of {} games each, continuing at iteration {}",
        optimizer.parameters().len(),
        arg.games,
        optimizer.iteration() + 1,
    );

    for _ in 0..chunk {
        let report = optimizer.step();
        narrate(&report, optimizer.parameters());
        // an uncheckpointed iteration must never look completed
        store.save(&optimizer.state()).with_context(|| {
            format!(
                "checkpoint failed at iteration {}; stopping to keep the run resumable",
                report.iteration
            )
        })?;
    }

    eprintln!();
    if optimizer.budget_exhausted() {
        eprintln!("Iteration budget ({}) complete.", arg.max_iterations);
        eprintln!("Final values:");
    } else {
        eprintln!(
            "Chunk complete at iteration {} of {}.",
            optimizer.iteration(),
            arg.max_iterations
        );
        eprintln!("Current values:");
    }
    for (name, p) in optimizer.parameters().iter() {
        eprintln!("  {name}: {}", p.render(p.value));
    }
    eprintln!("State saved to {}", store.path().display());

    Ok(())
}

fn narrate(report: &IterationReport, parameters: &ParameterSet) {
    match &report.result {
        IterationResult::Updated {
            outcome,
            rating,
            score_diff,
        } => {
            let elo = rating
                .as_ref()
                .filter(|r| r.elo.is_finite() && r.error_margin.is_finite())
                .map(|r| format!("{:+.1} +/- {:.1} Elo", r.elo, r.error_margin))
                .or_else(|| {
                    outcome
                        .score()
                        .map(|s| format!("{:+.1} Elo (from score)", score_to_elo(s)))
                })
                .unwrap_or_default();
            eprintln!(
                "Iteration #{}: {outcome} score_diff={score_diff:+.4} {elo}",
                report.iteration
            );
            for (name, p) in parameters.iter() {
                eprintln!("  {name}: {:.3}", p.value);
            }
        }
        IterationResult::Skipped { reason } => {
            eprintln!(
                "Iteration #{}: skipped ({reason}); values unchanged",
                report.iteration
            );
        }
    }
}
