//! Timed exam simulation.
//!
//! A session samples questions per topic in proportion to the exam weights,
//! then runs an explicit state machine: `in-progress → {paused, completed,
//! abandoned}`, `paused → {in-progress, abandoned}`. Completed and
//! abandoned are terminal. Time is driven externally through `tick`; the
//! session holds no timer of its own.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::predictor;
use crate::types::{Item, TopicId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExamStatus {
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAnswer {
    pub selected: Option<usize>,
    pub time_spent_secs: u32,
    pub flagged: bool,
}

/// Summary handed back when a session starts.
#[derive(Debug, Clone)]
pub struct ExamStart {
    pub session_id: Uuid,
    pub question_count: usize,
    /// Questions missing versus the configured total because the pool ran
    /// short.
    pub shortfall: usize,
    pub time_remaining_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicScore {
    pub total: u32,
    pub correct: u32,
    pub percentage: f64,
    pub passed: bool,
    pub avg_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: u32,
    pub question_count: u32,
    pub answered: u32,
    pub raw_score: f64,
    pub scaled_score: f64,
    pub passed: bool,
    pub topic_breakdown: BTreeMap<TopicId, TopicScore>,
    pub weak_topics: Vec<TopicId>,
    pub strong_topics: Vec<TopicId>,
}

#[derive(Debug, Clone)]
pub struct ExamSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ExamStatus,
    pub items: Vec<Item>,
    pub answers: HashMap<String, ExamAnswer>,
    pub current_index: usize,
    pub time_remaining_secs: u32,
}

impl ExamSession {
    /// Sample a session from the pool. Each topic quota is rounded
    /// independently; a rounding or pool shortfall is filled from the
    /// remaining pool, and whatever still cannot be filled is reported in
    /// the returned count.
    pub fn start(
        pool: &[Item],
        config: &EngineConfig,
        now: DateTime<Utc>,
        rng: &mut dyn RngCore,
    ) -> (Self, usize) {
        let target = config.exam.question_count;
        let total_weight = config.total_weight();
        let mut selected: Vec<&Item> = Vec::with_capacity(target);
        let mut used: HashSet<&str> = HashSet::new();

        for (topic, weight) in &config.topic_weights {
            let quota = (target as f64 * weight / total_weight).round() as usize;
            let mut topic_items: Vec<&Item> =
                pool.iter().filter(|i| i.topic == *topic).collect();
            topic_items.shuffle(rng);
            for item in topic_items.into_iter().take(quota) {
                if used.insert(&item.id) {
                    selected.push(item);
                }
            }
        }

        if selected.len() < target {
            let mut rest: Vec<&Item> = pool
                .iter()
                .filter(|i| !used.contains(i.id.as_str()))
                .collect();
            rest.shuffle(rng);
            for item in rest.into_iter().take(target - selected.len()) {
                used.insert(&item.id);
                selected.push(item);
            }
        }

        selected.shuffle(rng);
        selected.truncate(target);
        let shortfall = target.saturating_sub(selected.len());
        if shortfall > 0 {
            debug!(requested = target, delivered = selected.len(), "exam pool shortfall");
        }

        let items: Vec<Item> = selected.into_iter().cloned().collect();
        let answers = items
            .iter()
            .map(|i| (i.id.clone(), ExamAnswer::default()))
            .collect();

        let session = Self {
            id: Uuid::new_v4(),
            started_at: now,
            ended_at: None,
            status: ExamStatus::InProgress,
            items,
            answers,
            current_index: 0,
            time_remaining_secs: config.exam.time_limit_minutes * 60,
        };
        (session, shortfall)
    }

    fn guard(&self, op: &'static str, expected: ExamStatus) -> Result<(), EngineError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidStateTransition {
                op,
                state: self.status.as_str(),
            })
        }
    }

    /// Record an answer. Repeated calls for the same item overwrite the
    /// selection and accumulate time spent.
    pub fn answer(
        &mut self,
        item_id: &str,
        selection: Option<usize>,
        elapsed_secs: u32,
    ) -> Result<(), EngineError> {
        self.guard("answer", ExamStatus::InProgress)?;

        let index = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| EngineError::UnknownExamItem(item_id.to_string()))?;

        let answer = self
            .answers
            .get_mut(item_id)
            .ok_or_else(|| EngineError::UnknownExamItem(item_id.to_string()))?;
        answer.selected = selection;
        answer.time_spent_secs += elapsed_secs;
        self.current_index = index;
        Ok(())
    }

    pub fn toggle_flag(&mut self, item_id: &str) -> Result<bool, EngineError> {
        self.guard("flag", ExamStatus::InProgress)?;
        let answer = self
            .answers
            .get_mut(item_id)
            .ok_or_else(|| EngineError::UnknownExamItem(item_id.to_string()))?;
        answer.flagged = !answer.flagged;
        Ok(answer.flagged)
    }

    /// Accept an externally driven countdown value. The countdown is kept
    /// monotonic: values above the current remaining time are ignored and
    /// negatives clamp to zero. Returns `true` when time has expired and
    /// the caller must submit.
    pub fn tick(&mut self, remaining_secs: i64) -> Result<bool, EngineError> {
        self.guard("tick", ExamStatus::InProgress)?;
        let clamped = remaining_secs.clamp(0, self.time_remaining_secs as i64) as u32;
        self.time_remaining_secs = clamped;
        Ok(clamped == 0)
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.guard("pause", ExamStatus::InProgress)?;
        self.status = ExamStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.guard("resume", ExamStatus::Paused)?;
        self.status = ExamStatus::InProgress;
        Ok(())
    }

    pub fn abandon(&mut self) -> Result<(), EngineError> {
        match self.status {
            ExamStatus::InProgress | ExamStatus::Paused => {
                self.status = ExamStatus::Abandoned;
                Ok(())
            }
            _ => Err(EngineError::InvalidStateTransition {
                op: "abandon",
                state: self.status.as_str(),
            }),
        }
    }

    /// Score the session and transition to completed.
    pub fn submit(
        &mut self,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<ExamResult, EngineError> {
        self.guard("submit", ExamStatus::InProgress)?;
        self.status = ExamStatus::Completed;
        self.ended_at = Some(now);

        let mut tallies: BTreeMap<TopicId, (u32, u32, u32)> = BTreeMap::new();
        let mut answered = 0u32;
        for item in &self.items {
            let answer = self.answers.get(&item.id).cloned().unwrap_or_default();
            let entry = tallies.entry(item.topic).or_insert((0, 0, 0));
            entry.0 += 1;
            if answer.selected == Some(item.answer) {
                entry.1 += 1;
            }
            entry.2 += answer.time_spent_secs;
            if answer.selected.is_some() {
                answered += 1;
            }
        }

        let mut topic_breakdown = BTreeMap::new();
        let mut weak_topics = Vec::new();
        let mut strong_topics = Vec::new();
        let mut total = 0u32;
        let mut correct = 0u32;

        for (topic, (t, c, secs)) in tallies {
            total += t;
            correct += c;
            let percentage = if t > 0 { c as f64 / t as f64 * 100.0 } else { 0.0 };
            if percentage < config.exam.topic_pass_pct {
                weak_topics.push(topic);
            } else if percentage >= config.exam.topic_strong_pct {
                strong_topics.push(topic);
            }
            topic_breakdown.insert(
                topic,
                TopicScore {
                    total: t,
                    correct: c,
                    percentage,
                    passed: percentage >= config.exam.topic_pass_pct,
                    avg_seconds: if t > 0 { secs as f64 / t as f64 } else { 0.0 },
                },
            );
        }

        let raw_score = if total > 0 {
            correct as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let scaled_score = predictor::scaled_score(raw_score / 100.0, &config.scoring);
        let passed = scaled_score >= config.scoring.passing_score;

        debug!(
            session = %self.id,
            raw = raw_score,
            scaled = scaled_score,
            passed,
            "exam submitted"
        );

        Ok(ExamResult {
            id: self.id,
            completed_at: now,
            duration_secs: config.exam.time_limit_minutes * 60 - self.time_remaining_secs,
            question_count: total,
            answered,
            raw_score,
            scaled_score,
            passed,
            topic_breakdown,
            weak_topics,
            strong_topics,
        })
    }
}
