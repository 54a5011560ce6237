//! # Promptsmith Core
//!
//! Domain types, traits, and error definitions for the Promptsmith prompt
//! refinement engine. This crate has **no framework dependencies**: it defines
//! the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every swappable role is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod iteration;
pub mod knowledge;
pub mod capability;
pub mod diagnosis;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, KnowledgeError, ProviderError, Result, ValidationError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use session::{
    BackendKind, EnhancerKind, EvaluationMode, ProviderSelection, RefinementConfig,
    RefinementRequest, Session,
    SessionFilter, SessionId, SessionStatus, SessionSummary, StopReason,
};
pub use iteration::{Evaluation, IterationRecord, prompt_fingerprint};
pub use knowledge::KnowledgeBase;
pub use capability::{
    Decision, Deployer, Enhancement, EnhancementContext, EvaluationEngine, FlawAnalyzer,
    FlawReport, LearningModule, PromptEnhancer, PromptReviser,
};
pub use diagnosis::{Diagnoser, FailureContext, RecoveryStrategy, SystemDiagnosis};
pub use event::{DomainEvent, EventBus};
