use crate::config::ScanConfig;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One email as seen by the detector: who sent it, when, and whether
/// it carried any unsubscribe signal (header or body keyword).
#[derive(Debug, Clone)]
pub struct EmailObservation {
    pub sender: String,
    pub sender_name: Option<String>,
    pub subject: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub has_unsubscribe: bool,
}

/// Where a subscription is in its lifecycle. Confidence is recomputed
/// only while `Active`; every other state freezes the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Unsubscribed,
    Failed,
    Unknown,
}

/// Aggregated per-sender state maintained across detection passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRecord {
    pub sender: String,
    pub sender_name: Option<String>,
    pub sender_domain: String,
    pub email_count: usize,
    pub confidence: u8,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: SubscriptionStatus,
}

/// Counts from one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Deterministic 0-100 estimate that a sender is bulk/marketing mail.
///
/// Base score by email count (1: 15, 2-3: 35, 4-5: 55, 6-10: 75,
/// 11+: 85), +15 when any email carries an unsubscribe signal, +10 when
/// the combined subject corpus reads like marketing, capped at 100.
/// A single weak keyword ("newsletter" alone) is not enough for the
/// marketing bonus; ordinary correspondence mentions those words too.
pub struct ConfidenceScorer {
    strong_marketing: Vec<Regex>,
    weak_marketing: Vec<Regex>,
}

impl ConfidenceScorer {
    pub fn new(config: &ScanConfig) -> Self {
        ConfidenceScorer {
            strong_marketing: whole_word_patterns(&config.strong_marketing_keywords),
            weak_marketing: whole_word_patterns(&config.weak_marketing_keywords),
        }
    }

    pub fn score(&self, count: usize, has_unsubscribe: bool, subjects: &[String]) -> u8 {
        let base: u8 = match count {
            0 | 1 => 15,
            2..=3 => 35,
            4..=5 => 55,
            6..=10 => 75,
            _ => 85,
        };

        let mut bonus: u8 = 0;
        if has_unsubscribe {
            bonus += 15;
        }
        if self.has_marketing_language(subjects) {
            bonus += 10;
        }

        (base + bonus).min(100)
    }

    /// Any strong keyword as a whole word, or at least two distinct
    /// weak keywords, across the combined subject corpus.
    fn has_marketing_language(&self, subjects: &[String]) -> bool {
        if subjects.is_empty() {
            return false;
        }
        let combined = subjects.join(" ").to_lowercase();

        if self
            .strong_marketing
            .iter()
            .any(|re| re.is_match(&combined))
        {
            return true;
        }

        let weak_hits = self
            .weak_marketing
            .iter()
            .filter(|re| re.is_match(&combined))
            .count();
        weak_hits >= 2
    }
}

fn whole_word_patterns(keywords: &[String]) -> Vec<Regex> {
    keywords
        .iter()
        .map(|k| {
            Regex::new(&format!(r"\b{}\b", regex::escape(&k.to_lowercase())))
                .unwrap_or_else(|_| Regex::new(r"\bunmatchable\b").unwrap())
        })
        .collect()
}

/// Groups a batch of observations by sender and creates or refreshes
/// `SubscriptionRecord`s. The batch is expected to be the sender's full
/// aggregated email set; counts and date ranges are recomputed from it
/// rather than incremented.
pub struct SubscriptionDetector {
    scorer: ConfidenceScorer,
    sender_re: Regex,
}

impl SubscriptionDetector {
    pub fn new(config: &ScanConfig) -> Self {
        SubscriptionDetector {
            scorer: ConfidenceScorer::new(config),
            sender_re: Regex::new(r"^[^@]+@[^@]+\.[^@]+$").unwrap(),
        }
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    pub fn detect_subscriptions(
        &self,
        observations: &[EmailObservation],
        records: &mut HashMap<String, SubscriptionRecord>,
    ) -> DetectionSummary {
        let mut summary = DetectionSummary::default();

        // BTreeMap keeps sender processing order deterministic.
        let mut by_sender: BTreeMap<&str, Vec<(&EmailObservation, DateTime<Utc>)>> =
            BTreeMap::new();
        for observation in observations {
            let sent_at = match self.validate_observation(observation) {
                Some(sent_at) => sent_at,
                None => {
                    warn!(
                        "skipping observation from {:?}: insufficient data",
                        observation.sender
                    );
                    summary.skipped += 1;
                    continue;
                }
            };
            by_sender
                .entry(observation.sender.as_str())
                .or_default()
                .push((observation, sent_at));
        }

        for (sender, emails) in by_sender {
            let aggregate = match Aggregate::of(&emails) {
                Some(aggregate) => aggregate,
                None => continue,
            };
            match records.get_mut(sender) {
                Some(record) => {
                    self.update_record(record, &aggregate);
                    summary.updated += 1;
                }
                None => {
                    records.insert(sender.to_string(), self.create_record(sender, &aggregate));
                    summary.created += 1;
                }
            }
        }

        debug!(
            "detection pass: {} created, {} updated, {} skipped",
            summary.created, summary.updated, summary.skipped
        );
        summary
    }

    /// A usable observation names a plausible sender address and has a
    /// send time; the time is handed back so aggregation never deals
    /// with absent values.
    fn validate_observation(&self, observation: &EmailObservation) -> Option<DateTime<Utc>> {
        let sender = observation.sender.trim();
        if sender.is_empty() || !self.sender_re.is_match(sender) {
            return None;
        }
        observation.sent_at
    }

    fn create_record(&self, sender: &str, aggregate: &Aggregate) -> SubscriptionRecord {
        SubscriptionRecord {
            sender: sender.to_string(),
            sender_name: aggregate.latest_name.clone(),
            sender_domain: sender_domain(sender),
            email_count: aggregate.count,
            confidence: self.scorer.score(
                aggregate.count,
                aggregate.has_unsubscribe,
                &aggregate.subjects,
            ),
            first_seen: aggregate.earliest,
            last_seen: aggregate.latest,
            status: SubscriptionStatus::Active,
        }
    }

    fn update_record(&self, record: &mut SubscriptionRecord, aggregate: &Aggregate) {
        record.email_count = aggregate.count;
        record.last_seen = record.last_seen.max(aggregate.latest);
        record.first_seen = record.first_seen.min(aggregate.earliest);

        if record.sender_name.is_none() {
            record.sender_name = aggregate.latest_name.clone();
        }

        // Score is frozen once the subscription leaves the active state.
        if record.status == SubscriptionStatus::Active {
            record.confidence = self.scorer.score(
                record.email_count,
                aggregate.has_unsubscribe,
                &aggregate.subjects,
            );
        }
    }
}

/// Everything the scorer and record maintenance need from one sender's
/// validated emails.
struct Aggregate {
    count: usize,
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
    latest_name: Option<String>,
    subjects: Vec<String>,
    has_unsubscribe: bool,
}

impl Aggregate {
    /// `None` only for an empty slice; grouped senders always have at
    /// least one validated email.
    fn of(emails: &[(&EmailObservation, DateTime<Utc>)]) -> Option<Self> {
        let mut sorted: Vec<&(&EmailObservation, DateTime<Utc>)> = emails.iter().collect();
        sorted.sort_by_key(|(_, sent_at)| *sent_at);

        let (_, earliest) = **sorted.first()?;
        let (_, latest) = **sorted.last()?;

        let latest_name = sorted
            .iter()
            .rev()
            .find_map(|(e, _)| e.sender_name.as_ref().filter(|n| !n.is_empty()).cloned());

        Some(Aggregate {
            count: sorted.len(),
            earliest,
            latest,
            latest_name,
            subjects: emails.iter().map(|(e, _)| e.subject.clone()).collect(),
            has_unsubscribe: emails.iter().any(|(e, _)| e.has_unsubscribe),
        })
    }
}

fn sender_domain(sender: &str) -> String {
    sender
        .split_once('@')
        .map(|(_, domain)| domain.to_string())
        .unwrap_or_default()
}
