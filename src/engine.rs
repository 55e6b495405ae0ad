//! Engine facade.
//!
//! Owns one learner's state and exposes the call-level event API. State is
//! loaded once at construction and persisted after every mutating call, so
//! each logical operation is atomic with respect to storage. At most one
//! exam session is active at a time; it lives in memory only and is
//! discarded once terminal.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::difficulty;
use crate::error::EngineError;
use crate::exam::{ExamResult, ExamSession, ExamStart};
use crate::persistence::{StatePort, StateSnapshot};
use crate::predictor::{self, ScorePrediction};
use crate::schedule::{self, StudyPlan, WeeklyAvailability};
use crate::scheduler;
use crate::selector::{self, Selection, SelectionCriteria};
use crate::types::{Difficulty, EngineState, Item, TopicId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicBreakdown {
    pub topic: TopicId,
    pub accuracy_pct: u32,
    pub attempted: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_answered: u32,
    pub overall_accuracy_pct: u32,
    pub current_difficulty: Difficulty,
    /// 60% recent accuracy, 40% coverage toward the configured question
    /// target.
    pub readiness_score: u32,
    pub topic_breakdown: Vec<TopicBreakdown>,
    pub weak_topics: Vec<TopicId>,
    pub strong_topics: Vec<TopicId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub minutes: i64,
    pub questions_answered: u32,
    pub recent_accuracy: f64,
}

pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    store: Box<dyn StatePort>,
    clock: Box<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
    active_exam: Option<ExamSession>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Box<dyn StatePort>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, EngineError> {
        Self::with_rng(config, store, clock, Box::new(StdRng::from_os_rng()))
    }

    /// Construct with an explicit RNG so selection and sampling order are
    /// reproducible.
    pub fn with_rng(
        config: EngineConfig,
        store: Box<dyn StatePort>,
        clock: Box<dyn Clock>,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let state = store
            .load()
            .and_then(StateSnapshot::restore)
            .unwrap_or_else(|| {
                debug!("no usable saved state, starting fresh");
                EngineState::new()
            });

        Ok(Self {
            config,
            state,
            store,
            clock,
            rng,
            active_exam: None,
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn exam_session(&self) -> Option<&ExamSession> {
        self.active_exam.as_ref()
    }

    fn persist(&mut self) -> Result<(), EngineError> {
        let snapshot = StateSnapshot::capture(&self.state, self.clock.now());
        self.store.save(&snapshot)
    }

    /// Record one practice answer. Updates, in order: the rolling result
    /// window, the item's spaced-repetition history, the topic's
    /// performance entry, the difficulty level, the anti-repetition window,
    /// and the total counter.
    pub fn record_answer(
        &mut self,
        item_id: &str,
        topic: TopicId,
        correct: bool,
        difficulty: Difficulty,
        concepts: &[String],
    ) -> Result<(), EngineError> {
        let now = self.clock.now();

        self.state.push_recent(correct, self.config.windows.recent_results);

        match self.state.items.get_mut(item_id) {
            Some(history) => scheduler::update(history, correct, now),
            None => {
                self.state
                    .items
                    .insert(item_id.to_string(), scheduler::first_attempt(correct, now));
            }
        }

        let recent = self.state.recent_accuracy();
        let weakness = self.config.weakness_threshold;
        let perf = self.state.topic_mut(topic);
        perf.attempted += 1;
        if correct {
            perf.correct += 1;
        }
        perf.recent_accuracy = recent;
        perf.needs_work = perf.accuracy() < weakness;
        perf.last_practiced = Some(now);
        perf.record_concepts(concepts, correct);

        self.state.current_difficulty = difficulty::adjust(
            &self.state.recent_results,
            self.state.current_difficulty,
            &self.config.difficulty,
        );
        self.state.mark_seen(item_id, self.config.windows.recently_seen);
        self.state.total_answered += 1;

        debug!(
            item_id,
            topic = topic.as_str(),
            correct,
            difficulty = difficulty.as_str(),
            "practice answer recorded"
        );
        self.persist()
    }

    pub fn get_selection(&mut self, pool: &[Item], criteria: &SelectionCriteria) -> Selection {
        let now = self.clock.now();
        selector::select(pool, &self.state, &self.config, criteria, now, &mut *self.rng)
    }

    pub fn start_exam(&mut self, pool: &[Item]) -> Result<ExamStart, EngineError> {
        if let Some(session) = &self.active_exam {
            return Err(EngineError::InvalidStateTransition {
                op: "start",
                state: session.status.as_str(),
            });
        }

        let now = self.clock.now();
        let (session, shortfall) = ExamSession::start(pool, &self.config, now, &mut *self.rng);
        let start = ExamStart {
            session_id: session.id,
            question_count: session.items.len(),
            shortfall,
            time_remaining_secs: session.time_remaining_secs,
        };
        debug!(session = %session.id, questions = start.question_count, "exam started");
        self.active_exam = Some(session);
        Ok(start)
    }

    fn active_exam_mut(&mut self, op: &'static str) -> Result<&mut ExamSession, EngineError> {
        self.active_exam
            .as_mut()
            .ok_or(EngineError::InvalidStateTransition { op, state: "none" })
    }

    pub fn exam_answer(
        &mut self,
        item_id: &str,
        selection: Option<usize>,
        elapsed_secs: u32,
    ) -> Result<(), EngineError> {
        self.active_exam_mut("answer")?
            .answer(item_id, selection, elapsed_secs)
    }

    pub fn exam_flag(&mut self, item_id: &str) -> Result<bool, EngineError> {
        self.active_exam_mut("flag")?.toggle_flag(item_id)
    }

    pub fn exam_pause(&mut self) -> Result<(), EngineError> {
        self.active_exam_mut("pause")?.pause()
    }

    pub fn exam_resume(&mut self) -> Result<(), EngineError> {
        self.active_exam_mut("resume")?.resume()
    }

    /// Push the externally driven countdown into the session. Expiry
    /// submits automatically and returns the result.
    pub fn exam_tick(&mut self, remaining_secs: i64) -> Result<Option<ExamResult>, EngineError> {
        let expired = self.active_exam_mut("tick")?.tick(remaining_secs)?;
        if expired {
            return self.exam_submit().map(Some);
        }
        Ok(None)
    }

    pub fn exam_submit(&mut self) -> Result<ExamResult, EngineError> {
        let now = self.clock.now();
        let session = self
            .active_exam
            .as_mut()
            .ok_or(EngineError::InvalidStateTransition {
                op: "submit",
                state: "none",
            })?;
        let result = session.submit(&self.config, now)?;
        // The session object is discarded; only the immutable result
        // survives, in the bounded history.
        self.active_exam = None;
        self.apply_exam_result(&result);
        self.persist()?;
        Ok(result)
    }

    pub fn exam_abandon(&mut self) -> Result<(), EngineError> {
        self.active_exam_mut("abandon")?.abandon()?;
        self.active_exam = None;
        Ok(())
    }

    /// Fold a completed exam into per-topic performance and history, the
    /// same aggregates practice answers feed.
    fn apply_exam_result(&mut self, result: &ExamResult) {
        let now = result.completed_at;
        let weakness = self.config.weakness_threshold;

        for (topic, score) in &result.topic_breakdown {
            let perf = self.state.topic_mut(*topic);
            perf.attempted += score.total;
            perf.correct += score.correct;
            perf.needs_work = perf.accuracy() < weakness;
            perf.last_practiced = Some(now);
        }
        self.state.total_answered += result.question_count;

        self.state.exam_history.push_back(result.clone());
        while self.state.exam_history.len() > self.config.exam.history_cap {
            self.state.exam_history.pop_front();
        }
    }

    pub fn get_prediction(&self) -> ScorePrediction {
        predictor::predict(&self.state, &self.config)
    }

    pub fn get_schedule(
        &self,
        target_date: NaiveDate,
        availability: &WeeklyAvailability,
    ) -> Result<StudyPlan, EngineError> {
        let prediction = predictor::predict(&self.state, &self.config);
        schedule::generate(
            self.clock.now().date_naive(),
            target_date,
            availability,
            &self.config,
            &prediction,
        )
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        let recent_pct = self.state.recent_accuracy() * 100.0;
        let coverage = (self.state.total_answered as f64
            / self.config.summary.coverage_target as f64
            * 100.0)
            .min(100.0);
        let readiness_score = (recent_pct * 0.6 + coverage * 0.4).round() as u32;

        let topic_breakdown = self
            .state
            .topics
            .values()
            .map(|t| TopicBreakdown {
                topic: t.topic,
                accuracy_pct: (t.accuracy() * 100.0).round() as u32,
                attempted: t.attempted,
            })
            .collect();

        let strong_topics = self
            .state
            .topics
            .values()
            .filter(|t| {
                t.accuracy() >= self.config.summary.strong_threshold
                    && t.attempted >= self.config.summary.min_strong_attempts
            })
            .map(|t| t.topic)
            .collect();

        PerformanceSummary {
            total_answered: self.state.total_answered,
            overall_accuracy_pct: recent_pct.round() as u32,
            current_difficulty: self.state.current_difficulty,
            readiness_score,
            topic_breakdown,
            weak_topics: self.state.weak_topics(&self.config),
            strong_topics,
        }
    }

    pub fn start_session(&mut self) -> Result<(), EngineError> {
        self.state.session_started = Some(self.clock.now());
        self.state.session_start_answered = self.state.total_answered;
        self.persist()
    }

    pub fn end_session(&mut self) -> Result<SessionSummary, EngineError> {
        let now = self.clock.now();
        let minutes = self
            .state
            .session_started
            .map(|start| (now - start).num_minutes())
            .unwrap_or(0);
        let summary = SessionSummary {
            minutes,
            questions_answered: self
                .state
                .total_answered
                .saturating_sub(self.state.session_start_answered),
            recent_accuracy: self.state.recent_accuracy(),
        };
        self.state.session_started = None;
        self.persist()?;
        Ok(summary)
    }
}
