pub mod config;
pub mod detector;
pub mod error;
pub mod html;
pub mod logging;
pub mod message;
pub mod unsubscribe;

pub use config::ScanConfig;
pub use detector::{
    ConfidenceScorer, DetectionSummary, EmailObservation, SubscriptionDetector,
    SubscriptionRecord, SubscriptionStatus,
};
pub use error::ConfigError;
pub use message::MessageContext;
pub use unsubscribe::{
    ConflictResolver, MemoryStateStore, MessageAnalysis, MethodClassifier, MethodDescriptor,
    MethodState, MethodStateStore, SafetyAssessment, SafetyValidator, SubscriptionKey,
    UnsubscribeProcessor, UpdateOutcome,
};
