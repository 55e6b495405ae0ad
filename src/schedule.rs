//! Calendar study-plan generation.
//!
//! Pure function of today, the target date, the weekly availability
//! template, and the current prediction. The days before a final-review
//! buffer are partitioned across topics proportionally to exam weight,
//! weakest topic first.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::predictor::ScorePrediction;
use crate::types::TopicId;

/// Study hours per weekday, Monday first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub hours: [f64; 7],
}

impl WeeklyAvailability {
    pub fn uniform(hours_per_day: f64) -> Self {
        Self {
            hours: [hours_per_day; 7],
        }
    }

    pub fn total_hours(&self) -> f64 {
        self.hours.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneKind {
    TopicComplete(TopicId),
    ReviewStart,
    ExamDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub kind: MilestoneKind,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicBlock {
    pub topic: TopicId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub generated_on: NaiveDate,
    pub exam_date: NaiveDate,
    pub study_days: u32,
    pub review_days: u32,
    pub blocks: Vec<TopicBlock>,
    pub milestones: Vec<Milestone>,
    /// Question targets per weekday, Monday first.
    pub daily_question_targets: [u32; 7],
}

pub fn generate(
    today: NaiveDate,
    target_date: NaiveDate,
    availability: &WeeklyAvailability,
    config: &EngineConfig,
    prediction: &ScorePrediction,
) -> Result<StudyPlan, EngineError> {
    if target_date <= today {
        return Err(EngineError::InvalidSchedule(
            "target date must be after today".into(),
        ));
    }
    if availability.total_hours() <= 0.0 {
        return Err(EngineError::InvalidSchedule(
            "weekly availability has no study hours".into(),
        ));
    }

    let remaining = (target_date - today).num_days() as u32;
    let review_days = config.schedule.review_buffer_days.min(remaining);
    let study_days = remaining - review_days;

    let topics = topics_weakest_first(prediction);
    let allocation = allocate_days(study_days, &topics, config);

    let mut blocks = Vec::new();
    let mut milestones = Vec::new();
    let mut cursor = today;
    for (topic, days) in topics.iter().zip(allocation) {
        if days == 0 {
            continue;
        }
        let start = cursor;
        let end = start + Duration::days(days as i64 - 1);
        blocks.push(TopicBlock {
            topic: *topic,
            start,
            end,
            days,
        });
        milestones.push(Milestone {
            kind: MilestoneKind::TopicComplete(*topic),
            date: end,
        });
        cursor = end + Duration::days(1);
    }

    if review_days > 0 {
        milestones.push(Milestone {
            kind: MilestoneKind::ReviewStart,
            date: today + Duration::days(study_days as i64),
        });
    }
    milestones.push(Milestone {
        kind: MilestoneKind::ExamDay,
        date: target_date,
    });

    let mut daily_question_targets = [0u32; 7];
    for (target, hours) in daily_question_targets.iter_mut().zip(availability.hours) {
        *target = (hours * config.schedule.questions_per_hour).round() as u32;
    }

    Ok(StudyPlan {
        generated_on: today,
        exam_date: target_date,
        study_days,
        review_days,
        blocks,
        milestones,
        daily_question_targets,
    })
}

/// Topics ordered by predicted topic score, lowest first. Ties fall back
/// to exam weight, heaviest first.
fn topics_weakest_first(prediction: &ScorePrediction) -> Vec<TopicId> {
    let mut topics: Vec<TopicId> = TopicId::ALL.to_vec();
    topics.sort_by(|a, b| {
        let score_a = prediction
            .per_topic
            .get(a)
            .map(|p| p.predicted_score)
            .unwrap_or(0.0);
        let score_b = prediction
            .per_topic
            .get(b)
            .map(|p| p.predicted_score)
            .unwrap_or(0.0);
        score_a.total_cmp(&score_b)
    });
    topics
}

/// Largest-remainder split of the study days proportional to exam weight;
/// the pieces always sum exactly to `study_days`.
fn allocate_days(study_days: u32, topics: &[TopicId], config: &EngineConfig) -> Vec<u32> {
    let total_weight = config.total_weight();
    if study_days == 0 || total_weight <= 0.0 {
        return vec![0; topics.len()];
    }

    let shares: Vec<f64> = topics
        .iter()
        .map(|t| study_days as f64 * config.weight(*t) / total_weight)
        .collect();
    let mut allocation: Vec<u32> = shares.iter().map(|s| s.floor() as u32).collect();
    let mut leftover = study_days - allocation.iter().sum::<u32>();

    let mut by_remainder: Vec<usize> = (0..topics.len()).collect();
    by_remainder.sort_by(|a, b| {
        let ra = shares[*a] - shares[*a].floor();
        let rb = shares[*b] - shares[*b].floor();
        rb.total_cmp(&ra)
    });
    for idx in by_remainder {
        if leftover == 0 {
            break;
        }
        allocation[idx] += 1;
        leftover -= 1;
    }

    allocation
}
