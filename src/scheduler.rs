//! Spaced-repetition scheduling (binary SM-2 variant).
//!
//! Intervals grow with a per-item ease factor on correct answers and reset
//! on misses. Only missed items are actively resurfaced; mastered items
//! lapse passively.

use chrono::{DateTime, Duration, Utc};

use crate::types::ItemHistory;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

const EASE_REWARD: f64 = 0.1;
const EASE_PENALTY: f64 = 0.2;
const SECOND_INTERVAL_DAYS: u32 = 6;

/// History entry for a first attempt.
pub fn first_attempt(correct: bool, now: DateTime<Utc>) -> ItemHistory {
    ItemHistory {
        attempts: 1,
        correct_count: correct as u32,
        last_attempted: now,
        last_result: correct,
        ease_factor: if correct { DEFAULT_EASE_FACTOR } else { MIN_EASE_FACTOR },
        interval_days: 1,
        next_review: now + Duration::days(1),
    }
}

/// Apply one answer to an existing entry. The interval is computed from the
/// current ease factor, then the ease factor moves.
pub fn update(history: &mut ItemHistory, correct: bool, now: DateTime<Utc>) {
    history.attempts += 1;
    if correct {
        history.correct_count += 1;
    }
    history.last_attempted = now;
    history.last_result = correct;

    if correct {
        history.interval_days = match history.attempts {
            1 => 1,
            2 => SECOND_INTERVAL_DAYS,
            _ => (history.interval_days as f64 * history.ease_factor).round() as u32,
        };
        history.ease_factor = (history.ease_factor + EASE_REWARD).max(MIN_EASE_FACTOR);
    } else {
        history.interval_days = 1;
        history.ease_factor = (history.ease_factor - EASE_PENALTY).max(MIN_EASE_FACTOR);
    }

    history.next_review = now + Duration::days(history.interval_days as i64);
}

/// Due iff the scheduled review date has passed and the last answer was a
/// miss.
pub fn is_due(history: &ItemHistory, now: DateTime<Utc>) -> bool {
    !history.last_result && now >= history.next_review
}
