//! Evaluation engines, one per `EvaluationMode`.

pub mod basic;
pub mod judge;

pub use basic::{BasicEvaluator, SCORE_SCALE};
pub use judge::LlmJudge;
