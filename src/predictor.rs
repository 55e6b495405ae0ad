//! Score prediction.
//!
//! Raw accuracy maps onto the scaled score through a piecewise-linear curve
//! pinned at the passing anchor, blended with mock-exam history and nudged
//! by the recent trend. The confidence interval narrows with sample size
//! and with lower inter-topic variance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, ScoringParams};
use crate::types::{EngineState, TopicId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
    NotReady,
    AtRisk,
    Borderline,
    Likely,
    Confident,
}

impl Readiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not-ready",
            Self::AtRisk => "at-risk",
            Self::Borderline => "borderline",
            Self::Likely => "likely",
            Self::Confident => "confident",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPrediction {
    pub predicted_score: f64,
    pub accuracy: f64,
    pub needs_work: bool,
}

/// Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePrediction {
    pub predicted_score: f64,
    pub confidence_interval: ConfidenceInterval,
    pub pass_probability: f64,
    pub readiness: Readiness,
    pub trend: Trend,
    pub sample_size: u32,
    pub per_topic: BTreeMap<TopicId, TopicPrediction>,
    pub recommendations: Vec<String>,
}

/// Map raw accuracy onto the scaled-score range. Piecewise linear around
/// the passing anchor, so `scaled_score(passing_accuracy)` is exactly the
/// passing score and the mapping is continuous and monotonic.
pub fn scaled_score(accuracy: f64, params: &ScoringParams) -> f64 {
    let a = accuracy.clamp(0.0, 1.0);
    let p = params.passing_accuracy;
    if a <= p {
        params.min_score + (a / p) * (params.passing_score - params.min_score)
    } else {
        params.passing_score
            + ((a - p) / (1.0 - p)) * (params.max_score - params.passing_score)
    }
}

/// Exam-weighted all-time accuracy over the topics with any attempts.
pub fn weighted_accuracy(state: &EngineState, config: &EngineConfig) -> f64 {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for perf in state.topics.values() {
        if perf.attempted > 0 {
            let weight = config.weight(perf.topic);
            weighted += perf.accuracy() * weight;
            total_weight += weight;
        }
    }
    if total_weight > 0.0 {
        weighted / total_weight
    } else {
        0.0
    }
}

fn classify_trend(state: &EngineState, baseline: f64, band: f64) -> Trend {
    if state.recent_results.len() < 5 {
        return Trend::Stable;
    }
    let recent = state.recent_accuracy();
    if recent > baseline + band {
        Trend::Improving
    } else if recent < baseline - band {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Standard deviation of per-topic accuracies, in percentage points.
/// Defaults pessimistic when no topic has data yet.
fn topic_accuracy_spread(state: &EngineState) -> f64 {
    let values: Vec<f64> = state
        .topics
        .values()
        .filter(|t| t.attempted > 0)
        .map(|t| t.accuracy() * 100.0)
        .collect();
    if values.is_empty() {
        return 20.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub fn predict(state: &EngineState, config: &EngineConfig) -> ScorePrediction {
    let params = &config.prediction;
    let scoring = &config.scoring;

    let base = weighted_accuracy(state, config);

    // Mock exams are the more realistic signal, so they dominate the blend
    // when any exist.
    let blended = if state.exam_history.is_empty() {
        base
    } else {
        let mock_avg = state
            .exam_history
            .iter()
            .map(|r| r.raw_score / 100.0)
            .sum::<f64>()
            / state.exam_history.len() as f64;
        base * (1.0 - params.mock_exam_weight) + mock_avg * params.mock_exam_weight
    };

    let trend = classify_trend(state, base, params.trend_band);
    let adjusted = match trend {
        Trend::Improving => blended + params.trend_nudge,
        Trend::Declining => blended - params.trend_nudge,
        Trend::Stable => blended,
    }
    .clamp(0.0, 1.0);

    let predicted = scaled_score(adjusted, scoring);

    let n = state.total_answered;
    let precision = (n as f64 / params.full_precision_samples as f64).min(1.0);
    let spread_factor = (1.0 - topic_accuracy_spread(state) / 20.0).max(0.5);
    let margin = 50.0 * (1.0 - precision * 0.7) * spread_factor;
    let interval = ConfidenceInterval {
        low: (predicted - margin).max(scoring.min_score),
        high: (predicted + margin).min(scoring.max_score),
    };

    let standard_error = ((interval.high - interval.low) / 4.0).max(1e-6);
    let mut pass_probability =
        50.0 * (1.0 + (0.5 * (predicted - scoring.passing_score) / standard_error).tanh());
    if n < params.low_sample_threshold {
        pass_probability *= params.low_sample_penalty;
    }
    let pass_probability = pass_probability.clamp(1.0, 99.0);

    let readiness = if n < params.min_sample_for_readiness {
        Readiness::NotReady
    } else if pass_probability >= 85.0 {
        Readiness::Confident
    } else if pass_probability >= 70.0 {
        Readiness::Likely
    } else if pass_probability >= 50.0 {
        Readiness::Borderline
    } else if pass_probability >= 30.0 {
        Readiness::AtRisk
    } else {
        Readiness::NotReady
    };

    let per_topic = state
        .topics
        .values()
        .map(|t| {
            (
                t.topic,
                TopicPrediction {
                    predicted_score: scaled_score(t.accuracy(), scoring),
                    accuracy: t.accuracy(),
                    needs_work: t.needs_work,
                },
            )
        })
        .collect();

    let recommendations = build_recommendations(state, config);

    ScorePrediction {
        predicted_score: predicted,
        confidence_interval: interval,
        pass_probability,
        readiness,
        trend,
        sample_size: n,
        per_topic,
        recommendations,
    }
}

fn build_recommendations(state: &EngineState, config: &EngineConfig) -> Vec<String> {
    let mut recommendations = Vec::new();

    if state.total_answered < 300 {
        recommendations
            .push("Complete more practice questions to build a stronger foundation.".to_string());
    }
    if state.exam_history.len() < 2 {
        recommendations.push(format!(
            "Take at least 2 full {}-question timed mock exams before your exam date.",
            config.exam.question_count
        ));
    }

    // Weak domains with high exam weight first.
    let mut focus: Vec<(TopicId, f64)> = state
        .topics
        .values()
        .filter(|t| t.accuracy() < config.scoring.passing_accuracy || t.attempted < 30)
        .map(|t| (t.topic, config.weight(t.topic) * (1.0 - t.accuracy())))
        .collect();
    focus.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (topic, _) in focus.into_iter().take(3) {
        let perf = state.topic(topic);
        recommendations.push(format!(
            "Focus on {} ({:.0}% of the exam, currently {:.0}% accuracy).",
            topic.name(),
            config.weight(topic),
            perf.accuracy() * 100.0
        ));
    }

    recommendations.truncate(5);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoring() -> ScoringParams {
        ScoringParams::default()
    }

    fn state_with_accuracy(correct_per_topic: u32, attempted_per_topic: u32) -> EngineState {
        let mut state = EngineState::new();
        for topic in TopicId::ALL {
            let perf = state.topic_mut(topic);
            perf.attempted = attempted_per_topic;
            perf.correct = correct_per_topic;
        }
        state.total_answered = attempted_per_topic * TopicId::ALL.len() as u32;
        state
    }

    #[test]
    fn test_scaled_score_pins_passing_anchor() {
        let params = scoring();
        assert!((scaled_score(0.65, &params) - 450.0).abs() < 1e-9);
        assert!((scaled_score(0.0, &params) - 200.0).abs() < 1e-9);
        assert!((scaled_score(1.0, &params) - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_score_is_monotonic() {
        let params = scoring();
        let mut prev = f64::NEG_INFINITY;
        for step in 0..=1000 {
            let score = scaled_score(step as f64 / 1000.0, &params);
            assert!(score >= prev, "mapping decreased at accuracy {}", step);
            prev = score;
        }
    }

    #[test]
    fn test_pass_probability_bounds_and_monotonicity() {
        let config = EngineConfig::default();
        let mut prev = 0.0;
        for correct in 0..=100u32 {
            let state = state_with_accuracy(correct, 100);
            let prediction = predict(&state, &config);
            assert!((1.0..=99.0).contains(&prediction.pass_probability));
            assert!(
                prediction.pass_probability >= prev - 1e-9,
                "pass probability decreased at {correct}/100 per topic"
            );
            prev = prediction.pass_probability;
        }
    }

    #[test]
    fn test_low_sample_penalty_applies_below_threshold() {
        let config = EngineConfig::default();
        // Same accuracy, different volume: 30/30 per topic (n=150) vs
        // 100/100 per topic (n=500).
        let small = predict(&state_with_accuracy(30, 30), &config);
        let large = predict(&state_with_accuracy(100, 100), &config);
        assert!(small.pass_probability < large.pass_probability);
    }

    #[test]
    fn test_readiness_forced_not_ready_below_min_sample() {
        let config = EngineConfig::default();
        // Near-perfect but only 19 answers per topic (n = 95 < 100).
        let state = state_with_accuracy(19, 19);
        let prediction = predict(&state, &config);
        assert_eq!(prediction.readiness, Readiness::NotReady);
    }

    #[test]
    fn test_confidence_interval_narrows_with_sample_size() {
        let config = EngineConfig::default();
        let small = predict(&state_with_accuracy(14, 20), &config);
        let large = predict(&state_with_accuracy(350, 500), &config);
        let small_width = small.confidence_interval.high - small.confidence_interval.low;
        let large_width = large.confidence_interval.high - large.confidence_interval.low;
        assert!(large_width < small_width);
    }

    #[test]
    fn test_trend_nudge_moves_prediction() {
        let config = EngineConfig::default();

        let mut improving = state_with_accuracy(140, 200);
        for _ in 0..10 {
            improving.push_recent(true, config.windows.recent_results);
        }
        let mut declining = state_with_accuracy(140, 200);
        for _ in 0..10 {
            declining.push_recent(false, config.windows.recent_results);
        }

        let up = predict(&improving, &config);
        let down = predict(&declining, &config);
        assert_eq!(up.trend, Trend::Improving);
        assert_eq!(down.trend, Trend::Declining);
        assert!(up.predicted_score > down.predicted_score);
    }

    #[test]
    fn test_mock_exam_average_dominates_blend() {
        let config = EngineConfig::default();
        let mut state = state_with_accuracy(100, 200); // 50% practice accuracy
        let baseline = predict(&state, &config).predicted_score;

        // A strong mock exam pulls the blend up with weight 0.6.
        let result = crate::exam::ExamResult {
            id: uuid::Uuid::new_v4(),
            completed_at: chrono::Utc::now(),
            duration_secs: 0,
            question_count: 150,
            answered: 150,
            raw_score: 90.0,
            scaled_score: 700.0,
            passed: true,
            topic_breakdown: BTreeMap::new(),
            weak_topics: vec![],
            strong_topics: vec![],
        };
        state.exam_history.push_back(result);

        let blended = predict(&state, &config).predicted_score;
        assert!(blended > baseline);
    }

    #[test]
    fn test_recommendations_name_heaviest_weak_topic_first() {
        let config = EngineConfig::default();
        let mut state = EngineState::new();
        for topic in TopicId::ALL {
            let perf = state.topic_mut(topic);
            perf.attempted = 50;
            perf.correct = if topic == TopicId::AssetProtection { 20 } else { 45 };
        }
        state.total_answered = 250;

        let prediction = predict(&state, &config);
        let focus = prediction
            .recommendations
            .iter()
            .find(|r| r.starts_with("Focus on"))
            .expect("focus recommendation missing");
        assert!(focus.contains(TopicId::AssetProtection.name()));
    }
}
