use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::exam::ExamResult;

/// The five exam domains. Persisted as kebab-case strings; unknown values
/// are rejected at the persistence boundary instead of being cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicId {
    AuditProcess,
    Governance,
    SystemsImplementation,
    Operations,
    AssetProtection,
}

impl TopicId {
    pub const ALL: [TopicId; 5] = [
        Self::AuditProcess,
        Self::Governance,
        Self::SystemsImplementation,
        Self::Operations,
        Self::AssetProtection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuditProcess => "audit-process",
            Self::Governance => "governance",
            Self::SystemsImplementation => "systems-implementation",
            Self::Operations => "operations",
            Self::AssetProtection => "asset-protection",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "audit-process" => Some(Self::AuditProcess),
            "governance" => Some(Self::Governance),
            "systems-implementation" => Some(Self::SystemsImplementation),
            "operations" => Some(Self::Operations),
            "asset-protection" => Some(Self::AssetProtection),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AuditProcess => "Information Systems Auditing Process",
            Self::Governance => "Governance and Management of IT",
            Self::SystemsImplementation => "Systems Acquisition, Development, and Implementation",
            Self::Operations => "Operations and Business Resilience",
            Self::AssetProtection => "Protection of Information Assets",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }

    pub fn harder(&self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn easier(&self) -> Self {
        match self {
            Self::Hard => Self::Medium,
            _ => Self::Easy,
        }
    }
}

/// One pool entry. The presentation payload (prompt, option texts,
/// explanation) stays with the caller, keyed by `id`; the engine only sees
/// what selection and scoring need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub topic: TopicId,
    pub difficulty: Difficulty,
    /// Index of the correct option, used to score exam answers.
    pub answer: usize,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// Per-item attempt history driving spaced repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemHistory {
    pub attempts: u32,
    pub correct_count: u32,
    pub last_attempted: DateTime<Utc>,
    pub last_result: bool,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub next_review: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPerformance {
    pub topic: TopicId,
    pub attempted: u32,
    pub correct: u32,
    /// Accuracy over the engine-wide recent-results window at the time of
    /// the last update.
    pub recent_accuracy: f64,
    pub needs_work: bool,
    pub last_practiced: Option<DateTime<Utc>>,
    pub mastered_concepts: BTreeSet<String>,
    pub struggle_concepts: BTreeSet<String>,
}

impl TopicPerformance {
    pub fn new(topic: TopicId) -> Self {
        Self {
            topic,
            attempted: 0,
            correct: 0,
            recent_accuracy: 0.0,
            needs_work: true,
            last_practiced: None,
            mastered_concepts: BTreeSet::new(),
            struggle_concepts: BTreeSet::new(),
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempted as f64
        }
    }

    /// Moves concepts between the struggle and mastered sets so the two
    /// stay disjoint after every answer.
    pub fn record_concepts(&mut self, concepts: &[String], correct: bool) {
        for concept in concepts {
            if correct {
                self.struggle_concepts.remove(concept);
                self.mastered_concepts.insert(concept.clone());
            } else {
                self.mastered_concepts.remove(concept);
                self.struggle_concepts.insert(concept.clone());
            }
        }
    }
}

/// Aggregate root for one learner. Loaded at startup, persisted after every
/// mutating call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub current_difficulty: Difficulty,
    pub recent_results: VecDeque<bool>,
    pub topics: BTreeMap<TopicId, TopicPerformance>,
    pub items: HashMap<String, ItemHistory>,
    pub recently_seen: VecDeque<String>,
    pub total_answered: u32,
    pub session_started: Option<DateTime<Utc>>,
    pub session_start_answered: u32,
    pub exam_history: VecDeque<ExamResult>,
}

impl EngineState {
    pub fn new() -> Self {
        let topics = TopicId::ALL
            .into_iter()
            .map(|topic| (topic, TopicPerformance::new(topic)))
            .collect();

        Self {
            current_difficulty: Difficulty::Medium,
            recent_results: VecDeque::new(),
            topics,
            items: HashMap::new(),
            recently_seen: VecDeque::new(),
            total_answered: 0,
            session_started: None,
            session_start_answered: 0,
            exam_history: VecDeque::new(),
        }
    }

    pub fn topic(&self, topic: TopicId) -> &TopicPerformance {
        // `new` seeds every topic and deserialization backfills, so the
        // entry always exists.
        &self.topics[&topic]
    }

    pub fn topic_mut(&mut self, topic: TopicId) -> &mut TopicPerformance {
        self.topics
            .entry(topic)
            .or_insert_with(|| TopicPerformance::new(topic))
    }

    /// Accuracy over the rolling recent-results window.
    pub fn recent_accuracy(&self) -> f64 {
        if self.recent_results.is_empty() {
            return 0.0;
        }
        let correct = self.recent_results.iter().filter(|r| **r).count();
        correct as f64 / self.recent_results.len() as f64
    }

    pub fn push_recent(&mut self, correct: bool, cap: usize) {
        self.recent_results.push_back(correct);
        while self.recent_results.len() > cap {
            self.recent_results.pop_front();
        }
    }

    pub fn mark_seen(&mut self, item_id: &str, cap: usize) {
        self.recently_seen.push_back(item_id.to_string());
        while self.recently_seen.len() > cap {
            self.recently_seen.pop_front();
        }
    }

    pub fn recently_seen_contains(&self, item_id: &str) -> bool {
        self.recently_seen.iter().any(|id| id == item_id)
    }

    /// Weak topics ordered by `weight × (1 − accuracy)`, highest first.
    pub fn weak_topics(&self, config: &EngineConfig) -> Vec<TopicId> {
        let mut weak: Vec<(TopicId, f64)> = self
            .topics
            .values()
            .filter(|t| t.needs_work || t.accuracy() < config.weakness_threshold)
            .map(|t| (t.topic, config.weight(t.topic) * (1.0 - t.accuracy())))
            .collect();
        weak.sort_by(|a, b| b.1.total_cmp(&a.1));
        weak.into_iter().map(|(topic, _)| topic).collect()
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}
