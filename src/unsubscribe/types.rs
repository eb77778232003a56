use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// RFC 2369 header advertising unsubscribe URIs.
pub const LIST_UNSUBSCRIBE_HEADER: &str = "List-Unsubscribe";

/// RFC 8058 companion header; its value must equal [`ONE_CLICK_MARKER`]
/// for the advertised URI to qualify as one-click.
pub const LIST_UNSUBSCRIBE_POST_HEADER: &str = "List-Unsubscribe-Post";

/// RFC 8058 marker literal. Matched verbatim.
pub const ONE_CLICK_MARKER: &str = "List-Unsubscribe=One-Click";

/// Where a candidate URI was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Header,
    HtmlAnchor,
    HtmlText,
    PlainText,
    FormAction,
}

/// A raw URI string plus where it came from. Ephemeral; recomputed on
/// every scan pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeCandidate {
    pub uri: String,
    pub source: CandidateSource,
}

impl UnsubscribeCandidate {
    pub fn new(uri: impl Into<String>, source: CandidateSource) -> Self {
        UnsubscribeCandidate {
            uri: uri.into(),
            source,
        }
    }
}

/// Why a form cannot be auto-submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityReason {
    Checkboxes,
    RadioButtons,
    MultipleChoiceDropdowns,
    UserChoiceRequired,
}

impl ComplexityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityReason::Checkboxes => "checkboxes",
            ComplexityReason::RadioButtons => "radio_buttons",
            ComplexityReason::MultipleChoiceDropdowns => "multiple_choice_dropdowns",
            ComplexityReason::UserChoiceRequired => "user_choice_required",
        }
    }
}

/// The classified unsubscribe mechanism for one candidate. Exactly one
/// variant per candidate; only the first three are auto-actionable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodDescriptor {
    OneClick {
        url: String,
        marker: String,
    },
    HttpPost {
        action_url: String,
        /// Named inputs with their default values, document order.
        form_fields: Vec<(String, String)>,
        /// Query parameters already present on the action URI.
        url_params: BTreeMap<String, String>,
    },
    HttpGet {
        url: String,
        params: BTreeMap<String, String>,
    },
    EmailReply {
        address: String,
        subject: Option<String>,
        body: Option<String>,
    },
    ManualIntervention {
        url: String,
        reasons: Vec<ComplexityReason>,
    },
    Invalid {
        raw: String,
        reason: String,
    },
}

impl MethodDescriptor {
    /// Within-message selection priority, highest first.
    pub fn priority(&self) -> u8 {
        match self {
            MethodDescriptor::OneClick { .. } => 4,
            MethodDescriptor::HttpPost { .. } => 3,
            MethodDescriptor::HttpGet { .. } => 2,
            MethodDescriptor::EmailReply { .. } => 1,
            MethodDescriptor::ManualIntervention { .. } => 0,
            MethodDescriptor::Invalid { .. } => 0,
        }
    }

    /// Whether the method can be executed without a human in the loop.
    pub fn is_auto_actionable(&self) -> bool {
        matches!(
            self,
            MethodDescriptor::OneClick { .. }
                | MethodDescriptor::HttpPost { .. }
                | MethodDescriptor::HttpGet { .. }
        )
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            MethodDescriptor::OneClick { .. } => "one_click",
            MethodDescriptor::HttpPost { .. } => "http_post",
            MethodDescriptor::HttpGet { .. } => "http_get",
            MethodDescriptor::EmailReply { .. } => "email_reply",
            MethodDescriptor::ManualIntervention { .. } => "manual_intervention",
            MethodDescriptor::Invalid { .. } => "invalid",
        }
    }

    /// The URI (or address) this method would act on. `Invalid` has no
    /// actionable target.
    pub fn target(&self) -> Option<&str> {
        match self {
            MethodDescriptor::OneClick { url, .. } => Some(url),
            MethodDescriptor::HttpPost { action_url, .. } => Some(action_url),
            MethodDescriptor::HttpGet { url, .. } => Some(url),
            MethodDescriptor::EmailReply { address, .. } => Some(address),
            MethodDescriptor::ManualIntervention { url, .. } => Some(url),
            MethodDescriptor::Invalid { .. } => None,
        }
    }

    /// Joined complexity reasons, present only for `ManualIntervention`.
    pub fn complexity_note(&self) -> Option<String> {
        match self {
            MethodDescriptor::ManualIntervention { reasons, .. } => Some(
                reasons
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        }
    }
}

/// Risk verdict for one URI. `is_safe` is false exactly when warnings
/// exist; the constructors keep that coupled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyAssessment {
    is_safe: bool,
    warnings: Vec<String>,
}

impl SafetyAssessment {
    pub fn safe() -> Self {
        SafetyAssessment {
            is_safe: true,
            warnings: Vec::new(),
        }
    }

    pub fn from_warnings(warnings: Vec<String>) -> Self {
        SafetyAssessment {
            is_safe: warnings.is_empty(),
            warnings,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.is_safe
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// One candidate after classification and safety review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedMethod {
    pub descriptor: MethodDescriptor,
    pub safety: SafetyAssessment,
    pub source: CandidateSource,
}

/// Everything the pipeline learned from one message: every classified
/// candidate in extraction order, plus the selected primary (the
/// highest-priority safe method), if any.
#[derive(Debug, Clone, Serialize)]
pub struct MessageAnalysis {
    pub methods: Vec<ClassifiedMethod>,
    pub primary: Option<ClassifiedMethod>,
}

impl MessageAnalysis {
    pub fn has_candidates(&self) -> bool {
        !self.methods.is_empty()
    }
}

/// Identifies one tracked subscription: which mailbox saw it and who
/// sends it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub account: String,
    pub sender: String,
}

impl SubscriptionKey {
    pub fn new(account: impl Into<String>, sender: impl Into<String>) -> Self {
        SubscriptionKey {
            account: account.into(),
            sender: sender.into(),
        }
    }
}

/// The persisted unsubscribe method for one subscription. Written only
/// by the conflict resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodState {
    pub descriptor: MethodDescriptor,
    pub link: Option<String>,
    /// Send time of the message that produced this state, not wall
    /// clock. Newer messages overwrite older ones.
    pub last_updated_at: DateTime<Utc>,
    /// Joined complexity reasons when the method needs a human.
    pub complexity: Option<String>,
}
