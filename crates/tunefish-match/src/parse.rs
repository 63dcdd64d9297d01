//! Result-line protocol: reducing match runner output to a tally.
//!
//! Two line shapes are recognized, because the runner's output format varies
//! across tools and versions:
//!
//! - per-game lines, `... (<A> vs <B>): <score> ...` with a score of `1-0`,
//!   `0-1`, or `1/2-1/2`
//! - the aggregate tally, `Score of <A> vs <B>: <w> - <l> - <d> [...] ...`
//!
//! When an aggregate line is present its last occurrence wins, since it is
//! the runner's own final tally; per-game counting is the fallback. Output
//! with no recognizable line at all reduces to the empty outcome.

use crate::outcome::MatchOutcome;

/// The runner's own rating estimate, from its
/// `Elo difference: <elo> +/- <margin>, LOS: <p> %, DrawRatio: <r> %` line.
///
/// Diagnostics only; the parameter update never consumes it. Fields may be
/// non-finite when the runner printed `inf`/`nan` (one-sided short matches).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub elo: f64,
    pub error_margin: f64,
    pub los: f64,
    pub draw_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    PlusFirst,
    MinusFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameResult {
    PlusWin,
    MinusWin,
    Draw,
}

/// Reduces raw runner output to a [`MatchOutcome`] from the perspective of
/// the engine named `plus`.
///
/// Total function: unrecognized output reduces to `{0, 0, 0}` rather than an
/// error, so a flaky runner costs one skipped iteration and nothing more.
#[must_use]
pub fn parse_match_output(output: &str, plus: &str, minus: &str) -> MatchOutcome {
    let mut aggregate = None;
    let mut tally = MatchOutcome::default();
    for line in output.lines() {
        if let Some(outcome) = parse_aggregate_line(line, plus, minus) {
            aggregate = Some(outcome);
        } else if let Some(game) = parse_game_line(line, plus, minus) {
            match game {
                GameResult::PlusWin => tally.wins += 1,
                GameResult::MinusWin => tally.losses += 1,
                GameResult::Draw => tally.draws += 1,
            }
        }
    }
    aggregate.unwrap_or(tally)
}

/// Extracts the last complete rating line from runner output, if any.
#[must_use]
pub fn parse_rating_summary(output: &str) -> Option<RatingSummary> {
    output.lines().rev().find_map(parse_rating_line)
}

fn parse_orientation(pair: &str, plus: &str, minus: &str) -> Option<Orientation> {
    let (left, right) = pair.split_once(" vs ")?;
    let (left, right) = (left.trim(), right.trim());
    if left == plus && right == minus {
        Some(Orientation::PlusFirst)
    } else if left == minus && right == plus {
        Some(Orientation::MinusFirst)
    } else {
        None
    }
}

/// `Score of <A> vs <B>: <first> - <second> - <draws> [...]`
fn parse_aggregate_line(line: &str, plus: &str, minus: &str) -> Option<MatchOutcome> {
    let rest = line.trim().strip_prefix("Score of ")?;
    let (pair, tail) = rest.split_once(':')?;
    let orientation = parse_orientation(pair, plus, minus)?;

    let mut fields = tail.split_whitespace();
    let first: u32 = fields.next()?.parse().ok()?;
    if fields.next()? != "-" {
        return None;
    }
    let second: u32 = fields.next()?.parse().ok()?;
    if fields.next()? != "-" {
        return None;
    }
    let draws: u32 = fields.next()?.parse().ok()?;

    let (wins, losses) = match orientation {
        Orientation::PlusFirst => (first, second),
        Orientation::MinusFirst => (second, first),
    };
    Some(MatchOutcome {
        wins,
        losses,
        draws,
    })
}

/// `... (<A> vs <B>): <score> ...`
fn parse_game_line(line: &str, plus: &str, minus: &str) -> Option<GameResult> {
    let open = line.find('(')?;
    let close = line[open + 1..].find(')')? + open + 1;
    let orientation = parse_orientation(&line[open + 1..close], plus, minus)?;

    let tail = line[close + 1..].trim_start().strip_prefix(':')?;
    let score = tail.split_whitespace().next()?;
    let result = match (score, orientation) {
        ("1-0", Orientation::PlusFirst) | ("0-1", Orientation::MinusFirst) => GameResult::PlusWin,
        ("0-1", Orientation::PlusFirst) | ("1-0", Orientation::MinusFirst) => GameResult::MinusWin,
        ("1/2-1/2", _) => GameResult::Draw,
        _ => return None,
    };
    Some(result)
}

/// `Elo difference: <elo> +/- <margin>, LOS: <p> %, DrawRatio: <r> %`
fn parse_rating_line(line: &str) -> Option<RatingSummary> {
    let rest = line.trim().strip_prefix("Elo difference:")?;
    let mut parts = rest.split(',');

    let (elo, margin) = parts.next()?.split_once("+/-")?;
    let elo: f64 = elo.trim().parse().ok()?;
    let error_margin: f64 = margin.trim().parse().ok()?;

    let mut los = None;
    let mut draw_ratio = None;
    for part in parts {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_end_matches('%').trim();
        match key.trim() {
            "LOS" => los = value.parse().ok(),
            "DrawRatio" => draw_ratio = value.parse().ok(),
            _ => {}
        }
    }
    Some(RatingSummary {
        elo,
        error_margin,
        los: los?,
        draw_ratio: draw_ratio?,
    })
}
