use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{op} is not valid while the exam is {state}")]
    InvalidStateTransition {
        op: &'static str,
        state: &'static str,
    },

    #[error("item {0} is not part of the active exam")]
    UnknownExamItem(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid schedule request: {0}")]
    InvalidSchedule(String),

    #[error("failed to persist engine state: {0}")]
    Persistence(String),
}
