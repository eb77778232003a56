use crate::unsubscribe::types::{MessageAnalysis, MethodState, SubscriptionKey};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;

/// Keyed store for per-subscription unsubscribe state. The resolver
/// only needs read-current and upsert; the storage format behind the
/// trait is the caller's business.
pub trait MethodStateStore {
    fn contains(&self, key: &SubscriptionKey) -> bool;
    fn method_state(&self, key: &SubscriptionKey) -> Option<MethodState>;
    fn upsert(&mut self, key: &SubscriptionKey, state: MethodState);
}

/// Why an update was skipped. None of these are errors; a skipped
/// message never aborts processing of the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The subscription key is not registered in the store.
    SubscriptionNotFound,
    /// The message carried no unsubscribe candidates at all.
    NoMethodsFound,
    /// Candidates existed but none was both classified and safe.
    UnsafeOrInvalid,
    /// The stored state comes from a message at least as recent; under
    /// "most recent message wins" the incoming one loses. Equal send
    /// times are decided by within-message priority, stored state
    /// winning priority ties, so replaying a message is a no-op.
    StaleTimestamp,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::SubscriptionNotFound => "subscription_not_found",
            SkipReason::NoMethodsFound => "no_unsubscribe_methods_found",
            SkipReason::UnsafeOrInvalid => "unsafe_or_invalid_method",
            SkipReason::StaleTimestamp => "stale_timestamp",
        }
    }
}

/// Result of applying one message's analysis to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated {
        method: &'static str,
        link: Option<String>,
    },
    Skipped(SkipReason),
}

/// Merges per-message analyses into persistent per-subscription state
/// under the "most recent message wins" rule: the method from the
/// message with the later send time overwrites stored state regardless
/// of relative priority, because senders rotate unsubscribe
/// infrastructure and the newest evidence is authoritative.
///
/// The comparison against the stored timestamp makes application
/// idempotent under replay and safe under out-of-order delivery;
/// callers still must serialize concurrent updates to the same key.
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        ConflictResolver
    }

    pub fn apply(
        &self,
        store: &mut dyn MethodStateStore,
        key: &SubscriptionKey,
        analysis: &MessageAnalysis,
        sent_at: DateTime<Utc>,
    ) -> UpdateOutcome {
        if !store.contains(key) {
            return UpdateOutcome::Skipped(SkipReason::SubscriptionNotFound);
        }

        if !analysis.has_candidates() {
            return UpdateOutcome::Skipped(SkipReason::NoMethodsFound);
        }

        let primary = match &analysis.primary {
            Some(primary) => primary,
            None => return UpdateOutcome::Skipped(SkipReason::UnsafeOrInvalid),
        };

        if let Some(stored) = store.method_state(key) {
            if sent_at < stored.last_updated_at {
                debug!(
                    "skipping stale update for {}/{}: {} < {}",
                    key.account, key.sender, sent_at, stored.last_updated_at
                );
                return UpdateOutcome::Skipped(SkipReason::StaleTimestamp);
            }
            if sent_at == stored.last_updated_at
                && primary.descriptor.priority() <= stored.descriptor.priority()
            {
                return UpdateOutcome::Skipped(SkipReason::StaleTimestamp);
            }
        }

        let method = primary.descriptor.method_name();
        let link = primary.descriptor.target().map(|t| t.to_string());
        store.upsert(
            key,
            MethodState {
                descriptor: primary.descriptor.clone(),
                link: link.clone(),
                last_updated_at: sent_at,
                complexity: primary.descriptor.complexity_note(),
            },
        );
        info!(
            "updated unsubscribe method for {}/{}: {}",
            key.account, key.sender, method
        );

        UpdateOutcome::Updated { method, link }
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory store used by tests and the binary. Keys must be
/// registered before updates land, mirroring the "subscription exists
/// before its method does" lifecycle of a real backend.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: HashMap<SubscriptionKey, Option<MethodState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        MemoryStateStore::default()
    }

    pub fn register(&mut self, key: SubscriptionKey) {
        self.states.entry(key).or_insert(None);
    }
}

impl MethodStateStore for MemoryStateStore {
    fn contains(&self, key: &SubscriptionKey) -> bool {
        self.states.contains_key(key)
    }

    fn method_state(&self, key: &SubscriptionKey) -> Option<MethodState> {
        self.states.get(key).and_then(|state| state.clone())
    }

    fn upsert(&mut self, key: &SubscriptionKey, state: MethodState) {
        self.states.insert(key.clone(), Some(state));
    }
}
