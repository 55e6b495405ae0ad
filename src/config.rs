use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::TopicId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowParams {
    /// Rolling correctness window used for recent accuracy and difficulty.
    pub recent_results: usize,
    /// Anti-repetition window of recently seen item ids.
    pub recently_seen: usize,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            recent_results: 10,
            recently_seen: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyParams {
    /// Window accuracy at or above this steps difficulty up one level.
    pub step_up_accuracy: f64,
    /// Window accuracy at or below this steps difficulty down one level.
    pub step_down_accuracy: f64,
    /// Minimum window entries before any adjustment happens.
    pub min_results: usize,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self {
            step_up_accuracy: 0.85,
            step_down_accuracy: 0.60,
            min_results: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Share of a request filled from review-due items.
    pub review_cap_ratio: f64,
    /// Share of a request filled from weak-topic items.
    pub weak_cap_ratio: f64,
    /// Items taken per weak topic in one selection pass.
    pub per_topic_weak_cap: usize,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            review_cap_ratio: 0.2,
            weak_cap_ratio: 0.4,
            per_topic_weak_cap: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamParams {
    pub question_count: usize,
    pub time_limit_minutes: u32,
    /// Per-topic percentage counted as a pass in the breakdown.
    pub topic_pass_pct: f64,
    /// Per-topic percentage counted as strong in the breakdown.
    pub topic_strong_pct: f64,
    /// Completed results retained in history.
    pub history_cap: usize,
}

impl Default for ExamParams {
    fn default() -> Self {
        Self {
            question_count: 150,
            time_limit_minutes: 240,
            topic_pass_pct: 60.0,
            topic_strong_pct: 75.0,
            history_cap: 10,
        }
    }
}

/// Scaled-score mapping anchors. The piecewise-linear map pins
/// `passing_accuracy` exactly onto `passing_score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringParams {
    pub passing_accuracy: f64,
    pub passing_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            passing_accuracy: 0.65,
            passing_score: 450.0,
            min_score: 200.0,
            max_score: 800.0,
        }
    }
}

/// Heuristic constants of the predictor. The tuning rationale of the
/// original values is undocumented, so all of them are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionParams {
    /// Weight of the mock-exam average when blending with practice accuracy.
    pub mock_exam_weight: f64,
    /// Accuracy nudge applied for an improving/declining trend.
    pub trend_nudge: f64,
    /// Recent-vs-overall accuracy gap that counts as a trend.
    pub trend_band: f64,
    /// Pass-probability multiplier below `low_sample_threshold` answers.
    pub low_sample_penalty: f64,
    pub low_sample_threshold: u32,
    /// Below this many answers the readiness level is forced to not-ready.
    pub min_sample_for_readiness: u32,
    /// Answers at which the confidence interval reaches full precision.
    pub full_precision_samples: u32,
}

impl Default for PredictionParams {
    fn default() -> Self {
        Self {
            mock_exam_weight: 0.6,
            trend_nudge: 0.03,
            trend_band: 0.05,
            low_sample_penalty: 0.8,
            low_sample_threshold: 200,
            min_sample_for_readiness: 100,
            full_precision_samples: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryParams {
    /// Accuracy threshold above which a topic counts as strong.
    pub strong_threshold: f64,
    /// Minimum attempts before a topic can be labeled strong.
    pub min_strong_attempts: u32,
    /// Total answers that count as full coverage in the readiness score.
    pub coverage_target: u32,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            strong_threshold: 0.80,
            min_strong_attempts: 50,
            coverage_target: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleParams {
    /// Days reserved before the exam for final review.
    pub review_buffer_days: u32,
    /// Practice pace used to turn availability hours into daily targets.
    pub questions_per_hour: f64,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            review_buffer_days: 7,
            questions_per_hour: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Exam weight per topic, in percent of the total question count.
    pub topic_weights: BTreeMap<TopicId, f64>,
    /// All-time accuracy below this flags a topic as needing work.
    pub weakness_threshold: f64,
    pub windows: WindowParams,
    pub difficulty: DifficultyParams,
    pub selection: SelectionParams,
    pub exam: ExamParams,
    pub scoring: ScoringParams,
    pub prediction: PredictionParams,
    pub summary: SummaryParams,
    pub schedule: ScheduleParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let topic_weights = BTreeMap::from([
            (TopicId::AuditProcess, 18.0),
            (TopicId::Governance, 18.0),
            (TopicId::SystemsImplementation, 12.0),
            (TopicId::Operations, 26.0),
            (TopicId::AssetProtection, 26.0),
        ]);

        Self {
            topic_weights,
            weakness_threshold: 0.70,
            windows: WindowParams::default(),
            difficulty: DifficultyParams::default(),
            selection: SelectionParams::default(),
            exam: ExamParams::default(),
            scoring: ScoringParams::default(),
            prediction: PredictionParams::default(),
            summary: SummaryParams::default(),
            schedule: ScheduleParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn weight(&self, topic: TopicId) -> f64 {
        self.topic_weights.get(&topic).copied().unwrap_or(0.0)
    }

    pub fn total_weight(&self) -> f64 {
        self.topic_weights.values().sum()
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for topic in TopicId::ALL {
            match self.topic_weights.get(&topic) {
                Some(w) if *w > 0.0 => {}
                Some(_) => {
                    return Err(EngineError::InvalidConfig(format!(
                        "topic weight for {} must be positive",
                        topic.as_str()
                    )))
                }
                None => {
                    return Err(EngineError::InvalidConfig(format!(
                        "missing topic weight for {}",
                        topic.as_str()
                    )))
                }
            }
        }

        if self.exam.question_count == 0 {
            return Err(EngineError::InvalidConfig(
                "exam question count must be positive".into(),
            ));
        }
        if self.exam.time_limit_minutes == 0 {
            return Err(EngineError::InvalidConfig(
                "exam time limit must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.selection.review_cap_ratio)
            || !(0.0..=1.0).contains(&self.selection.weak_cap_ratio)
        {
            return Err(EngineError::InvalidConfig(
                "selection cap ratios must lie in [0, 1]".into(),
            ));
        }
        if self.windows.recent_results == 0 || self.windows.recently_seen == 0 {
            return Err(EngineError::InvalidConfig(
                "window sizes must be positive".into(),
            ));
        }

        let s = &self.scoring;
        if !(s.min_score < s.passing_score && s.passing_score < s.max_score) {
            return Err(EngineError::InvalidConfig(
                "scoring anchors must satisfy min < passing < max".into(),
            ));
        }
        if !(0.0 < s.passing_accuracy && s.passing_accuracy < 1.0) {
            return Err(EngineError::InvalidConfig(
                "passing accuracy must lie in (0, 1)".into(),
            ));
        }

        Ok(())
    }
}
