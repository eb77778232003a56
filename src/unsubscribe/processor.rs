use crate::config::ScanConfig;
use crate::html::HtmlDocument;
use crate::logging::Redactor;
use crate::message::{repair_soft_line_breaks, MessageContext};
use crate::unsubscribe::classifier::MethodClassifier;
use crate::unsubscribe::extractor::LinkExtractor;
use crate::unsubscribe::types::{ClassifiedMethod, MessageAnalysis, MethodDescriptor};
use crate::unsubscribe::validator::SafetyValidator;
use log::{debug, info};

/// Runs the full per-message pipeline: extract candidates, classify
/// each one, attach its safety verdict, and pick the primary method.
///
/// The primary is the highest-priority descriptor whose safety check
/// passed, first-seen order breaking priority ties. A safe
/// `ManualIntervention` can be primary; it is surfaced flagged rather
/// than dropped, because "needs a human" is still the best answer the
/// message offers. Messages with no safe method get no primary.
pub struct UnsubscribeProcessor {
    extractor: LinkExtractor,
    classifier: MethodClassifier,
    validator: SafetyValidator,
    redactor: Redactor,
}

impl UnsubscribeProcessor {
    pub fn new(config: &ScanConfig) -> Self {
        UnsubscribeProcessor {
            extractor: LinkExtractor::new(config),
            classifier: MethodClassifier::new(config),
            validator: SafetyValidator::new(config),
            redactor: Redactor::new(),
        }
    }

    pub fn analyze(&self, message: &MessageContext) -> MessageAnalysis {
        let candidates = self.extractor.extract(message);
        if candidates.is_empty() {
            debug!("no unsubscribe candidates in message");
            return MessageAnalysis {
                methods: Vec::new(),
                primary: None,
            };
        }

        // Forms are parsed once and handed to the classifier so it can
        // match POST actions against each candidate.
        let forms = message
            .html_body
            .as_deref()
            .map(repair_soft_line_breaks)
            .and_then(|html| HtmlDocument::parse(&html).map(|doc| doc.forms()))
            .unwrap_or_default();

        let methods: Vec<ClassifiedMethod> = candidates
            .into_iter()
            .map(|candidate| {
                let descriptor =
                    self.classifier
                        .classify(&candidate.uri, &message.headers, &forms);
                let safety = self.validator.validate(&candidate.uri);
                debug!(
                    "{} -> {} (safe: {})",
                    self.redactor.redact(&candidate.uri),
                    descriptor.method_name(),
                    safety.is_safe()
                );
                ClassifiedMethod {
                    descriptor,
                    safety,
                    source: candidate.source,
                }
            })
            .collect();

        let primary = select_primary(&methods);
        match &primary {
            Some(method) => info!(
                "primary unsubscribe method: {} ({})",
                method.descriptor.method_name(),
                method
                    .descriptor
                    .target()
                    .map(|t| self.redactor.redact(t))
                    .unwrap_or_default()
            ),
            None => info!("no safe unsubscribe method in message"),
        }

        MessageAnalysis { methods, primary }
    }
}

/// Highest priority among the safe methods; `max_by_key` keeps the
/// earliest entry on ties, so first-seen order is the tie-break.
fn select_primary(methods: &[ClassifiedMethod]) -> Option<ClassifiedMethod> {
    methods
        .iter()
        .filter(|m| m.safety.is_safe() && !matches!(m.descriptor, MethodDescriptor::Invalid { .. }))
        .rev()
        .max_by_key(|m| m.descriptor.priority())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unsubscribe::types::{CandidateSource, SafetyAssessment};
    use std::collections::HashMap;

    fn processor() -> UnsubscribeProcessor {
        UnsubscribeProcessor::new(&ScanConfig::default())
    }

    fn one_click_message() -> MessageContext {
        let mut headers = HashMap::new();
        headers.insert(
            "List-Unsubscribe".to_string(),
            "<https://a.com/u?id=1>".to_string(),
        );
        headers.insert(
            "List-Unsubscribe-Post".to_string(),
            "List-Unsubscribe=One-Click".to_string(),
        );
        MessageContext {
            headers,
            ..Default::default()
        }
    }

    #[test]
    fn test_one_click_header_end_to_end() {
        let analysis = processor().analyze(&one_click_message());
        let primary = analysis.primary.expect("primary method");
        assert!(primary.safety.is_safe());
        assert_eq!(
            primary.descriptor,
            MethodDescriptor::OneClick {
                url: "https://a.com/u?id=1".to_string(),
                marker: "List-Unsubscribe=One-Click".to_string(),
            }
        );
        assert_eq!(primary.source, CandidateSource::Header);
    }

    #[test]
    fn test_one_click_beats_safe_get() {
        let mut message = one_click_message();
        message.html_body =
            Some("<a href=\"https://b.com/unsubscribe?u=2\">Unsubscribe</a>".to_string());

        let analysis = processor().analyze(&message);
        assert_eq!(analysis.methods.len(), 2);
        assert!(matches!(
            analysis.primary.unwrap().descriptor,
            MethodDescriptor::OneClick { .. }
        ));
    }

    #[test]
    fn test_shortener_in_body_end_to_end() {
        let message = MessageContext {
            text_body: Some("Click here to unsubscribe: http://bit.ly/xyz".to_string()),
            ..Default::default()
        };

        let analysis = processor().analyze(&message);
        assert_eq!(analysis.methods.len(), 1);
        let method = &analysis.methods[0];
        assert!(matches!(
            method.descriptor,
            MethodDescriptor::HttpGet { .. }
        ));
        assert!(!method.safety.is_safe());
        assert!(method
            .safety
            .warnings()
            .iter()
            .any(|w| w.contains("Insecure connection")));
        assert!(method
            .safety
            .warnings()
            .iter()
            .any(|w| w.contains("URL shortener")));
        // the only method is unsafe, so nothing is selected
        assert!(analysis.primary.is_none());
    }

    #[test]
    fn test_unsafe_high_priority_loses_to_safe_lower() {
        let mut headers = HashMap::new();
        headers.insert(
            "List-Unsubscribe".to_string(),
            // insecure scheme, so the header candidate fails safety
            "<http://a.com/u?id=1>, <mailto:unsub@a.com>".to_string(),
        );

        let analysis = processor().analyze(&MessageContext {
            headers,
            ..Default::default()
        });
        assert_eq!(analysis.methods.len(), 2);
        let primary = analysis.primary.expect("mailto should be selected");
        assert!(matches!(
            primary.descriptor,
            MethodDescriptor::EmailReply { .. }
        ));
    }

    #[test]
    fn test_no_candidates_is_not_an_error() {
        let analysis = processor().analyze(&MessageContext::default());
        assert!(analysis.methods.is_empty());
        assert!(analysis.primary.is_none());
        assert!(!analysis.has_candidates());
    }

    #[test]
    fn test_complex_form_surfaced_as_manual_primary() {
        let mut headers = HashMap::new();
        headers.insert(
            "List-Unsubscribe".to_string(),
            "<https://news.acme-shop.com/prefs-center>".to_string(),
        );
        let message = MessageContext {
            headers,
            html_body: Some(
                r#"<form method="post" action="https://news.acme-shop.com/prefs-center">
                    <input type="checkbox" name="weekly" value="1"> Weekly digest
                    <input type="checkbox" name="offers" value="1"> Offers
                </form>"#
                    .to_string(),
            ),
            ..Default::default()
        };

        let analysis = processor().analyze(&message);
        let primary = analysis.primary.expect("manual method still surfaced");
        assert!(matches!(
            primary.descriptor,
            MethodDescriptor::ManualIntervention { .. }
        ));
        assert!(!primary.descriptor.is_auto_actionable());
    }

    #[test]
    fn test_first_seen_wins_priority_tie() {
        let methods = vec![
            ClassifiedMethod {
                descriptor: MethodDescriptor::HttpGet {
                    url: "https://first.test/u".to_string(),
                    params: Default::default(),
                },
                safety: SafetyAssessment::safe(),
                source: CandidateSource::Header,
            },
            ClassifiedMethod {
                descriptor: MethodDescriptor::HttpGet {
                    url: "https://second.test/u".to_string(),
                    params: Default::default(),
                },
                safety: SafetyAssessment::safe(),
                source: CandidateSource::HtmlAnchor,
            },
        ];

        let primary = select_primary(&methods).unwrap();
        assert_eq!(
            primary.descriptor.target(),
            Some("https://first.test/u")
        );
    }

    #[test]
    fn test_determinism_same_input_same_output() {
        let message = one_click_message();
        let processor = processor();
        let first = processor.analyze(&message);
        let second = processor.analyze(&message);
        assert_eq!(first.methods, second.methods);
        assert_eq!(first.primary, second.primary);
    }
}
