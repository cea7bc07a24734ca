//! In-game feedback: was the round that just ended a high score?
//!
//! [`record_session`] stores a finished round and reports the best
//! [`Achievement`] it earned. The bests it compares against are read in the
//! same transaction as the insert, so the verdict always refers to the
//! records that existed right before this one.
//!
//! Showing the message is up to the host.

use std::fmt;

use tracing::debug;

use crate::reader::RecordFilter;
use crate::store::{today, StatsStore};
use crate::types::{Record, StatSource};
use crate::Result;

/// What a finished round achieved, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Achievement {
    /// Beat every record ever stored.
    AllTimeBest,
    /// Beat the player's own previous best.
    PersonalBest,
    /// Beat every record stored today.
    DailyBest,
}

impl Achievement {
    /// Short heading for a congratulation prompt.
    pub fn title(self) -> &'static str {
        match self {
            Achievement::AllTimeBest => "HIGH SCORE!!!",
            Achievement::PersonalBest => "Personal high score",
            Achievement::DailyBest => "Best score of the day!",
        }
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Achievement::AllTimeBest => "Congratulations! You got the highest score ever!",
            Achievement::PersonalBest => "This is your best score yet!",
            Achievement::DailyBest => "Congratulations! This is the top score so far today!",
        };
        f.write_str(message)
    }
}

/// Best values of the stat of interest before the new round was stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PreviousBests {
    pub all_time: Option<f64>,
    pub personal: Option<f64>,
    pub today: Option<f64>,
}

/// Decides which achievement `value` earns against `previous`.
///
/// An empty table counts as an all-time best of 0, so the very first round
/// is congratulated only if it scored above zero. A player with no earlier
/// rounds, or a day with no earlier rounds, has no best to beat and earns
/// nothing at that level.
pub fn evaluate(value: f64, previous: &PreviousBests) -> Option<Achievement> {
    if value > previous.all_time.unwrap_or(0.0) {
        return Some(Achievement::AllTimeBest);
    }
    if previous.personal.is_some_and(|best| value > best) {
        return Some(Achievement::PersonalBest);
    }
    if previous.today.is_some_and(|best| value > best) {
        return Some(Achievement::DailyBest);
    }
    None
}

/// Stores the host's current values for `username` and reports what the
/// round achieved in `stat`.
///
/// # Errors
///
/// - `Error::UnknownField` / `Error::NotNumeric` if `stat` can't be ranked
/// - anything [`StatsStore::append`] can return
///
/// On error nothing is stored.
pub fn record_session(
    store: &StatsStore,
    username: &str,
    source: &impl StatSource,
    stat: &str,
) -> Result<Option<Achievement>> {
    store.fields().resolve_numeric(stat)?;
    let snapshot = source.snapshot();
    let date = today();

    let previous = store.batch(|b| {
        let best = |filter: RecordFilter| -> Result<Option<f64>> {
            Ok(best_value(&b.top(&filter, stat, 1)?, stat))
        };
        let previous = PreviousBests {
            all_time: best(RecordFilter::any())?,
            personal: best(RecordFilter::any().user(username))?,
            today: best(RecordFilter::any().date(date))?,
        };
        b.append_dated(username, date, &snapshot)?;
        Ok(previous)
    })?;

    let achievement = snapshot
        .get(stat)
        .and_then(|v| v.as_f64())
        .and_then(|value| evaluate(value, &previous));
    debug!(username, stat, ?achievement, "recorded session");
    Ok(achievement)
}

fn best_value(top: &[Record], stat: &str) -> Option<f64> {
    top.first()
        .and_then(|record| record.get(stat))
        .and_then(|value| value.as_f64())
}
