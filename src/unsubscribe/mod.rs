pub mod classifier;
pub mod extractor;
pub mod processor;
pub mod resolver;
pub mod types;
pub mod validator;

pub use classifier::MethodClassifier;
pub use extractor::LinkExtractor;
pub use processor::UnsubscribeProcessor;
pub use resolver::{
    ConflictResolver, MemoryStateStore, MethodStateStore, SkipReason, UpdateOutcome,
};
pub use types::{
    CandidateSource, ClassifiedMethod, ComplexityReason, MessageAnalysis, MethodDescriptor,
    MethodState, SafetyAssessment, SubscriptionKey, UnsubscribeCandidate,
};
pub use validator::SafetyValidator;

use url::Url;

/// Query-string portion of a URI, tolerating URIs the strict parser
/// rejects (scheme-less strings still get their `?`-suffix inspected).
pub(crate) fn query_of(uri: &str) -> Option<String> {
    if let Ok(url) = Url::parse(uri) {
        return url.query().map(|q| q.to_string());
    }
    uri.split_once('?').map(|(_, q)| q.to_string())
}

/// Everything after a `mailto:` prefix, scheme matched without case.
pub(crate) fn mailto_rest(uri: &str) -> Option<&str> {
    let head = uri.get(..7)?;
    if head.eq_ignore_ascii_case("mailto:") {
        uri.get(7..)
    } else {
        None
    }
}

pub(crate) fn has_http_scheme(uri: &str) -> bool {
    uri.get(..7)
        .map_or(false, |p| p.eq_ignore_ascii_case("http://"))
        || uri
            .get(..8)
            .map_or(false, |p| p.eq_ignore_ascii_case("https://"))
}
