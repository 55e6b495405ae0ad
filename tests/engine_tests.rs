//! End-to-end tests over the engine facade: practice recording, adaptive
//! selection, the exam state machine, prediction, scheduling, and
//! persistence across engine instances.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use vora_engine::{
    Difficulty, Engine, EngineConfig, EngineError, Item, JsonFileStore, ManualClock, MemoryStore,
    SelectionCriteria, TopicId, WeeklyAvailability,
};

const SEED: u64 = 7;

fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    ))
}

fn engine_with(store: Box<dyn vora_engine::StatePort>) -> Engine {
    Engine::with_rng(
        EngineConfig::default(),
        store,
        Box::new(fixed_clock()),
        Box::new(StdRng::seed_from_u64(SEED)),
    )
    .unwrap()
}

fn test_engine() -> Engine {
    engine_with(Box::new(MemoryStore::new()))
}

fn item(topic: TopicId, i: usize) -> Item {
    Item {
        id: format!("{}-{i:03}", topic.as_str()),
        topic,
        difficulty: Difficulty::Medium,
        answer: 0,
        concepts: vec![format!("{}-concept-{}", topic.as_str(), i % 4)],
    }
}

fn pool_per_topic(per_topic: usize) -> Vec<Item> {
    let mut pool = Vec::new();
    for topic in TopicId::ALL {
        for i in 0..per_topic {
            pool.push(item(topic, i));
        }
    }
    pool
}

#[test]
fn practice_loop_updates_mastery_and_difficulty() {
    let mut engine = test_engine();

    // Six correct answers in every topic.
    for topic in TopicId::ALL {
        for i in 0..6 {
            let entry = item(topic, i);
            engine
                .record_answer(&entry.id, entry.topic, true, entry.difficulty, &entry.concepts)
                .unwrap();
        }
    }

    let state = engine.state();
    assert_eq!(state.total_answered, 30);
    assert_eq!(state.current_difficulty, Difficulty::Hard);
    for topic in TopicId::ALL {
        let perf = state.topic(topic);
        assert!(perf.attempted > 0);
        assert!(!perf.needs_work);
        assert!(!perf.mastered_concepts.is_empty());
        assert!(perf.struggle_concepts.is_empty());
    }
}

#[test]
fn selection_respects_count_and_reports_shortfall() {
    let mut engine = test_engine();
    let pool = pool_per_topic(4); // 20 items total

    let selection = engine.get_selection(
        &pool,
        &SelectionCriteria {
            count: 10,
            ..Default::default()
        },
    );
    assert_eq!(selection.items.len(), 10);
    assert_eq!(selection.shortfall, 0);

    let starved = engine.get_selection(
        &pool,
        &SelectionCriteria {
            count: 50,
            ..Default::default()
        },
    );
    assert_eq!(starved.items.len(), 20);
    assert_eq!(starved.shortfall, 30);
}

#[test]
fn review_due_items_resurface_after_a_miss() {
    let clock = fixed_clock();
    let mut engine = Engine::with_rng(
        EngineConfig::default(),
        Box::new(MemoryStore::new()),
        Box::new(clock.clone()),
        Box::new(StdRng::seed_from_u64(SEED)),
    )
    .unwrap();
    let pool = pool_per_topic(10);

    let missed = &pool[0];
    engine
        .record_answer(&missed.id, missed.topic, false, missed.difficulty, &[])
        .unwrap();

    clock.advance(chrono::Duration::days(2));
    let selection = engine.get_selection(
        &pool,
        &SelectionCriteria {
            count: 5,
            include_review_due: true,
            ..Default::default()
        },
    );
    assert!(
        selection.items.iter().any(|i| i.id == missed.id),
        "missed item should come back once its review date has passed"
    );
}

#[test]
fn exam_with_exact_quota_pool_matches_topic_weights() {
    let mut engine = test_engine();
    let quotas = [
        (TopicId::AuditProcess, 27usize),
        (TopicId::Governance, 27),
        (TopicId::SystemsImplementation, 18),
        (TopicId::Operations, 39),
        (TopicId::AssetProtection, 39),
    ];
    let mut pool = Vec::new();
    for (topic, quota) in quotas {
        for i in 0..quota {
            pool.push(item(topic, i));
        }
    }

    let start = engine.start_exam(&pool).unwrap();
    assert_eq!(start.question_count, 150);
    assert_eq!(start.shortfall, 0);
    assert_eq!(start.time_remaining_secs, 240 * 60);

    let session = engine.exam_session().unwrap();
    for (topic, quota) in quotas {
        let count = session.items.iter().filter(|i| i.topic == topic).count();
        assert_eq!(count, quota, "{} quota", topic.as_str());
    }
}

#[test]
fn exam_lifecycle_pause_resume_submit() {
    let mut engine = test_engine();
    engine.start_exam(&pool_per_topic(60)).unwrap();

    let ids: Vec<String> = engine
        .exam_session()
        .unwrap()
        .items
        .iter()
        .map(|i| i.id.clone())
        .collect();

    // Answer the first half correctly, flag one, pace the countdown.
    for id in ids.iter().take(75) {
        engine.exam_answer(id, Some(0), 45).unwrap();
    }
    assert!(engine.exam_flag(&ids[0]).unwrap());
    engine.exam_tick(200 * 60).unwrap();

    engine.exam_pause().unwrap();
    assert!(matches!(
        engine.exam_answer(&ids[80], Some(0), 5),
        Err(EngineError::InvalidStateTransition { .. })
    ));
    engine.exam_resume().unwrap();

    let result = engine.exam_submit().unwrap();
    assert_eq!(result.question_count, 150);
    assert_eq!(result.answered, 75);
    assert!((result.raw_score - 50.0).abs() < 1e-9);
    assert!(!result.passed);
    assert!(!result.weak_topics.is_empty());

    // The session is discarded, so a second submit has nothing to act on.
    assert!(matches!(
        engine.exam_submit(),
        Err(EngineError::InvalidStateTransition { state: "none", .. })
    ));
}

#[test]
fn tick_zero_completes_with_result() {
    let mut engine = test_engine();
    engine.start_exam(&pool_per_topic(60)).unwrap();

    let result = engine.exam_tick(0).unwrap();
    let result = result.expect("expiry must produce a result");
    assert_eq!(result.answered, 0);
    assert!(engine.exam_session().is_none());
    assert_eq!(engine.state().exam_history.len(), 1);
}

#[test]
fn negative_tick_is_clamped_and_completes() {
    let mut engine = test_engine();
    engine.start_exam(&pool_per_topic(60)).unwrap();
    let result = engine.exam_tick(-30).unwrap();
    assert!(result.is_some());
}

#[test]
fn prediction_reflects_accuracy_and_volume() {
    let mut engine = test_engine();

    // 250 answers at 80% accuracy across all topics.
    let pool = pool_per_topic(50);
    for (i, entry) in pool.iter().enumerate() {
        engine
            .record_answer(&entry.id, entry.topic, i % 5 != 0, entry.difficulty, &[])
            .unwrap();
    }

    let prediction = engine.get_prediction();
    assert!(prediction.predicted_score > engine.config().scoring.passing_score);
    assert!((1.0..=99.0).contains(&prediction.pass_probability));
    assert!(prediction.sample_size >= 250);
    assert!(prediction.confidence_interval.low <= prediction.predicted_score);
    assert!(prediction.confidence_interval.high >= prediction.predicted_score);
    assert!(!prediction.recommendations.is_empty());
}

#[test]
fn schedule_builds_blocks_and_milestones() {
    let mut engine = test_engine();
    let pool = pool_per_topic(50);
    for entry in &pool {
        engine
            .record_answer(&entry.id, entry.topic, true, entry.difficulty, &[])
            .unwrap();
    }

    let target = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
    let plan = engine
        .get_schedule(target, &WeeklyAvailability::uniform(2.0))
        .unwrap();

    assert_eq!(plan.exam_date, target);
    assert_eq!(plan.study_days + plan.review_days, 61);
    assert_eq!(
        plan.blocks.iter().map(|b| b.days).sum::<u32>(),
        plan.study_days
    );
    assert!(plan.milestones.len() >= plan.blocks.len() + 2);
}

#[test]
fn state_survives_engine_restart_via_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let mut engine = engine_with(Box::new(JsonFileStore::new(path.clone())));
        for i in 0..12 {
            engine
                .record_answer(
                    &format!("gov-{i}"),
                    TopicId::Governance,
                    i % 3 != 0,
                    Difficulty::Medium,
                    &[],
                )
                .unwrap();
        }
    }

    let engine = engine_with(Box::new(JsonFileStore::new(path)));
    assert_eq!(engine.state().total_answered, 12);
    assert_eq!(engine.state().topic(TopicId::Governance).attempted, 12);
}

#[test]
fn corrupt_state_file_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "]]]] definitely not json").unwrap();

    let engine = engine_with(Box::new(JsonFileStore::new(path)));
    assert_eq!(engine.state().total_answered, 0);
}
