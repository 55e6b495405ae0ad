//! Rolling-window difficulty adjustment.

use std::collections::VecDeque;

use crate::config::DifficultyParams;
use crate::types::Difficulty;

/// Accuracy over a correctness window. Empty windows read as zero.
pub fn window_accuracy(results: &VecDeque<bool>) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let correct = results.iter().filter(|r| **r).count();
    correct as f64 / results.len() as f64
}

/// Step the difficulty one level at most, based on recent accuracy.
/// A no-op until the window holds `min_results` entries.
pub fn adjust(
    results: &VecDeque<bool>,
    current: Difficulty,
    params: &DifficultyParams,
) -> Difficulty {
    if results.len() < params.min_results {
        return current;
    }

    let accuracy = window_accuracy(results);
    if accuracy >= params.step_up_accuracy {
        current.harder()
    } else if accuracy <= params.step_down_accuracy {
        current.easier()
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(results: &[bool]) -> VecDeque<bool> {
        results.iter().copied().collect()
    }

    #[test]
    fn test_no_adjustment_below_minimum_window() {
        let params = DifficultyParams::default();
        for n in 0..5 {
            let results = window(&vec![true; n]);
            assert_eq!(
                adjust(&results, Difficulty::Medium, &params),
                Difficulty::Medium,
                "window of {n} results must be a no-op"
            );
        }
    }

    #[test]
    fn test_high_accuracy_steps_up_one_level() {
        let params = DifficultyParams::default();
        let results = window(&[true, true, true, true, true, false]);
        assert_eq!(adjust(&results, Difficulty::Easy, &params), Difficulty::Medium);
        assert_eq!(adjust(&results, Difficulty::Medium, &params), Difficulty::Hard);
        assert_eq!(adjust(&results, Difficulty::Hard, &params), Difficulty::Hard);
    }

    #[test]
    fn test_low_accuracy_steps_down_one_level() {
        let params = DifficultyParams::default();
        let results = window(&[true, false, false, false, true, false]);
        assert_eq!(adjust(&results, Difficulty::Hard, &params), Difficulty::Medium);
        assert_eq!(adjust(&results, Difficulty::Medium, &params), Difficulty::Easy);
        assert_eq!(adjust(&results, Difficulty::Easy, &params), Difficulty::Easy);
    }

    #[test]
    fn test_middle_band_leaves_difficulty_unchanged() {
        let params = DifficultyParams::default();
        // 7/10 correct sits between both thresholds.
        let results = window(&[
            true, true, true, true, true, true, true, false, false, false,
        ]);
        for level in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(adjust(&results, level, &params), level);
        }
    }
}
