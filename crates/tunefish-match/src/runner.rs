use std::{
    io::Read as _,
    path::PathBuf,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use tunefish_params::ParameterSet;

use crate::{
    evaluator::{EvaluateError, MatchEvaluator, MatchReport},
    parse::{parse_match_output, parse_rating_summary},
};

/// Engine label for the theta-plus side of every match.
pub const PLUS_ENGINE: &str = "Plus";
/// Engine label for the theta-minus side of every match.
pub const MINUS_ENGINE: &str = "Minus";

/// How often a running match is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration of the external match runner invocation.
///
/// Both sides run the same engine binary; only the `option.Name=value`
/// overrides differ. Time control, fixed options, and the opening policy are
/// held constant across the whole run to keep match noise down.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Match runner binary (cutechess-cli / fastchess style CLI).
    pub runner: PathBuf,
    /// Engine binary under tuning.
    pub engine: PathBuf,
    /// Time control for both sides, e.g. `1+0.02`.
    pub time_control: String,
    /// Concurrency hint forwarded to the runner; game-level parallelism is
    /// the runner's own business.
    pub concurrency: u32,
    /// Options applied identically to both sides, e.g. `Hash=8`, `Threads=1`.
    pub fixed_options: Vec<(String, String)>,
    /// Opening book, played `format=pgn order=random` when present.
    pub opening_book: Option<PathBuf>,
    /// Where the runner should dump game PGNs, if anywhere.
    pub pgn_out: Option<PathBuf>,
    /// Wall-clock budget for one invocation. On expiry the runner is killed
    /// and the iteration is skipped.
    pub timeout: Duration,
}

/// Production [`MatchEvaluator`]: spawns the configured runner once per
/// iteration and reduces its combined stdout/stderr.
#[derive(Debug)]
pub struct MatchRunner {
    config: RunnerConfig,
}

impl MatchRunner {
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Builds the full runner invocation for one candidate pair.
    fn command(&self, theta_plus: &ParameterSet, theta_minus: &ParameterSet, games: u32) -> Command {
        let engine = self.config.engine.display().to_string();
        let mut cmd = Command::new(&self.config.runner);

        cmd.arg("-engine")
            .arg(format!("name={PLUS_ENGINE}"))
            .arg(format!("cmd={engine}"))
            .arg("proto=uci")
            .args(theta_plus.engine_options());
        cmd.arg("-engine")
            .arg(format!("name={MINUS_ENGINE}"))
            .arg(format!("cmd={engine}"))
            .arg("proto=uci")
            .args(theta_minus.engine_options());

        cmd.arg("-each")
            .arg(format!("tc={}", self.config.time_control));
        for (name, value) in &self.config.fixed_options {
            cmd.arg(format!("option.{name}={value}"));
        }

        // two games per round with swapped colors; `games` is even
        cmd.args(["-games", "2", "-rounds"])
            .arg((games / 2).max(1).to_string())
            .arg("-repeat");
        cmd.arg("-concurrency")
            .arg(self.config.concurrency.to_string());

        if let Some(book) = &self.config.opening_book {
            cmd.arg("-openings")
                .arg(format!("file={}", book.display()))
                .arg("format=pgn")
                .arg("order=random");
        }
        if let Some(pgn) = &self.config.pgn_out {
            cmd.arg("-pgnout").arg(pgn);
        }
        cmd
    }

    /// Runs the command to completion or the configured deadline, whichever
    /// comes first, and returns combined stdout + stderr.
    fn run_to_deadline(&self, mut cmd: Command) -> Result<String, EvaluateError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| EvaluateError::Spawn {
            runner: self.config.runner.clone(),
            source,
        })?;
        let mut stdout = child.stdout.take().expect("stdout is piped");
        let mut stderr = child.stderr.take().expect("stderr is piped");

        thread::scope(|scope| {
            let out_reader = scope.spawn(move || {
                let mut buf = String::new();
                stdout.read_to_string(&mut buf).map(|_| buf)
            });
            let err_reader = scope.spawn(move || {
                let mut buf = String::new();
                stderr.read_to_string(&mut buf).map(|_| buf)
            });

            let deadline = Instant::now() + self.config.timeout;
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) => {
                        if Instant::now() >= deadline {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(EvaluateError::Timeout {
                                timeout: self.config.timeout,
                            });
                        }
                        thread::sleep(POLL_INTERVAL);
                    }
                    Err(source) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(EvaluateError::Io { source });
                    }
                }
            }

            let mut output = out_reader
                .join()
                .expect("stdout reader does not panic")
                .map_err(|source| EvaluateError::Io { source })?;
            let errors = err_reader
                .join()
                .expect("stderr reader does not panic")
                .map_err(|source| EvaluateError::Io { source })?;
            output.push('\n');
            output.push_str(&errors);
            Ok(output)
        })
    }
}

impl MatchEvaluator for MatchRunner {
    fn evaluate(
        &self,
        theta_plus: &ParameterSet,
        theta_minus: &ParameterSet,
        games: u32,
    ) -> Result<MatchReport, EvaluateError> {
        let output = self.run_to_deadline(self.command(theta_plus, theta_minus, games))?;
        Ok(MatchReport {
            outcome: parse_match_output(&output, PLUS_ENGINE, MINUS_ENGINE),
            rating: parse_rating_summary(&output),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tunefish_params::{Parameter, ParameterKind};

    use super::*;

    fn config() -> RunnerConfig {
        RunnerConfig {
            runner: PathBuf::from("./cutechess-cli"),
            engine: PathBuf::from("./nextfish"),
            time_control: "1+0.02".to_owned(),
            concurrency: 2,
            fixed_options: vec![
                ("Hash".to_owned(), "8".to_owned()),
                ("Threads".to_owned(), "1".to_owned()),
            ],
            opening_book: None,
            pgn_out: None,
            timeout: Duration::from_secs(2400),
        }
    }

    fn candidates() -> (ParameterSet, ParameterSet) {
        let base = ParameterSet::new(BTreeMap::from([(
            "WhiteOptimism".to_owned(),
            Parameter {
                value: 20.0,
                min: 0.0,
                max: 40.0,
                step: 2.0,
                kind: ParameterKind::Int,
            },
        )]));
        let plus = base.with_values(&BTreeMap::from([("WhiteOptimism".to_owned(), 22.0)]));
        let minus = base.with_values(&BTreeMap::from([("WhiteOptimism".to_owned(), 18.0)]));
        (plus, minus)
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_carries_both_candidates_as_overrides() {
        let (plus, minus) = candidates();
        let runner = MatchRunner::new(config());
        let args = args_of(&runner.command(&plus, &minus, 20));

        assert!(args.contains(&"name=Plus".to_owned()));
        assert!(args.contains(&"name=Minus".to_owned()));
        assert!(args.contains(&"option.WhiteOptimism=22".to_owned()));
        assert!(args.contains(&"option.WhiteOptimism=18".to_owned()));
    }

    #[test]
    fn test_command_requests_paired_rounds() {
        let (plus, minus) = candidates();
        let runner = MatchRunner::new(config());
        let args = args_of(&runner.command(&plus, &minus, 20));

        let rounds_at = args.iter().position(|a| a == "-rounds").unwrap();
        assert_eq!(args[rounds_at + 1], "10");
        assert!(args.contains(&"-repeat".to_owned()));
        assert!(args.contains(&"tc=1+0.02".to_owned()));
        assert!(args.contains(&"option.Hash=8".to_owned()));
        assert!(args.contains(&"option.Threads=1".to_owned()));
    }

    #[test]
    fn test_command_passes_opening_book_policy() {
        let (plus, minus) = candidates();
        let mut config = config();
        config.opening_book = Some(PathBuf::from("book.pgn"));
        config.pgn_out = Some(PathBuf::from("games.pgn"));
        let runner = MatchRunner::new(config);
        let args = args_of(&runner.command(&plus, &minus, 8));

        assert!(args.contains(&"file=book.pgn".to_owned()));
        assert!(args.contains(&"format=pgn".to_owned()));
        assert!(args.contains(&"order=random".to_owned()));
        assert!(args.contains(&"-pgnout".to_owned()));
    }

    #[test]
    fn test_spawn_failure_is_reported_not_panicked() {
        let (plus, minus) = candidates();
        let mut config = config();
        config.runner = PathBuf::from("./definitely-not-a-runner");
        let runner = MatchRunner::new(config);

        let err = runner.evaluate(&plus, &minus, 2).unwrap_err();
        assert!(matches!(err, EvaluateError::Spawn { .. }));
    }
}
