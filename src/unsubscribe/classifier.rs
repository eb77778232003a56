use crate::config::ScanConfig;
use crate::html::FormRef;
use crate::message::get_header_case_insensitive;
use crate::unsubscribe::{has_http_scheme, mailto_rest, query_of};
use crate::unsubscribe::types::{
    ComplexityReason, MethodDescriptor, LIST_UNSUBSCRIBE_HEADER, LIST_UNSUBSCRIBE_POST_HEADER,
    ONE_CLICK_MARKER,
};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use url::form_urlencoded;
use url::Url;

/// Turns one candidate URI into exactly one [`MethodDescriptor`].
///
/// Decision order, first match wins: malformed, one-click, mailto,
/// matching POST form, plain GET. Classification never fails; whatever
/// cannot be parsed more precisely ends up as `HttpGet` over the plain
/// URI. Matched forms are additionally screened for complexity — a form
/// offering real choices must never be blindly submitted, so it is
/// downgraded to `ManualIntervention`.
pub struct MethodClassifier {
    user_choice_phrases: Vec<String>,
}

impl MethodClassifier {
    pub fn new(config: &ScanConfig) -> Self {
        MethodClassifier {
            user_choice_phrases: config
                .user_choice_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    pub fn classify(
        &self,
        uri: &str,
        headers: &HashMap<String, String>,
        forms: &[FormRef],
    ) -> MethodDescriptor {
        if !is_valid_uri(uri) {
            return MethodDescriptor::Invalid {
                raw: uri.to_string(),
                reason: "invalid or malformed URL".to_string(),
            };
        }

        if self.is_one_click(uri, headers) {
            return MethodDescriptor::OneClick {
                url: uri.to_string(),
                marker: ONE_CLICK_MARKER.to_string(),
            };
        }

        if let Some(rest) = mailto_rest(uri) {
            return classify_email_reply(rest);
        }

        if let Some(form) = find_matching_post_form(uri, forms) {
            let reasons = self.complexity_reasons(form);
            if !reasons.is_empty() {
                debug!(
                    "form at {} needs a human: {:?}",
                    if form.action.is_empty() { uri } else { &form.action },
                    reasons
                );
                return MethodDescriptor::ManualIntervention {
                    url: uri.to_string(),
                    reasons,
                };
            }
            return classify_http_post(uri, form);
        }

        classify_http_get(uri)
    }

    /// RFC 8058: the candidate must be advertised verbatim in the
    /// List-Unsubscribe header and the companion header must equal the
    /// marker literal.
    fn is_one_click(&self, uri: &str, headers: &HashMap<String, String>) -> bool {
        let advertised = get_header_case_insensitive(headers, LIST_UNSUBSCRIBE_HEADER)
            .map(|v| v.contains(uri))
            .unwrap_or(false);
        let marker = get_header_case_insensitive(headers, LIST_UNSUBSCRIBE_POST_HEADER)
            .map(|v| v.trim() == ONE_CLICK_MARKER)
            .unwrap_or(false);
        advertised && marker
    }

    fn complexity_reasons(&self, form: &FormRef) -> Vec<ComplexityReason> {
        let mut reasons = Vec::new();

        if form.inputs.iter().any(|i| i.input_type == "checkbox") {
            reasons.push(ComplexityReason::Checkboxes);
        }
        if form.inputs.iter().any(|i| i.input_type == "radio") {
            reasons.push(ComplexityReason::RadioButtons);
        }
        if form.select_option_counts.iter().any(|&count| count > 2) {
            reasons.push(ComplexityReason::MultipleChoiceDropdowns);
        }

        let text_lower = form.text.to_lowercase();
        if self
            .user_choice_phrases
            .iter()
            .any(|phrase| text_lower.contains(phrase))
        {
            reasons.push(ComplexityReason::UserChoiceRequired);
        }

        reasons
    }
}

/// mailto needs an `@` and a dot; http(s) needs a parseable URL with a
/// dotted host. Everything else is malformed.
fn is_valid_uri(uri: &str) -> bool {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return false;
    }

    if mailto_rest(trimmed).is_some() {
        return trimmed.contains('@') && trimmed.contains('.');
    }

    if has_http_scheme(trimmed) {
        return match Url::parse(trimmed) {
            Ok(url) => url.host_str().map(|h| h.contains('.')).unwrap_or(false),
            Err(_) => false,
        };
    }

    false
}

fn classify_email_reply(rest: &str) -> MethodDescriptor {
    let (address, query) = match rest.split_once('?') {
        Some((address, query)) => (address, Some(query)),
        None => (rest, None),
    };

    let mut subject = None;
    let mut body = None;
    if let Some(query) = query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "subject" => subject = Some(value),
                "body" => body = Some(value),
                _ => {}
            }
        }
    }

    MethodDescriptor::EmailReply {
        address: address.to_string(),
        subject,
        body,
    }
}

/// First POST form whose action equals the candidate or is a substring
/// of it (or vice versa). An empty action matches any candidate and
/// submits back to the page itself.
fn find_matching_post_form<'a>(uri: &str, forms: &'a [FormRef]) -> Option<&'a FormRef> {
    forms.iter().find(|form| {
        form.is_post()
            && (form.action == uri || uri.contains(form.action.as_str()) || form.action.contains(uri))
    })
}

fn classify_http_post(uri: &str, form: &FormRef) -> MethodDescriptor {
    let action_url = if form.action.is_empty() {
        uri
    } else {
        form.action.as_str()
    };

    let form_fields = form
        .inputs
        .iter()
        .filter_map(|input| {
            input
                .name
                .as_ref()
                .map(|name| (name.clone(), input.value.clone()))
        })
        .collect();

    MethodDescriptor::HttpPost {
        action_url: action_url.to_string(),
        form_fields,
        url_params: parse_query_map(action_url),
    }
}

fn classify_http_get(uri: &str) -> MethodDescriptor {
    MethodDescriptor::HttpGet {
        url: uri.to_string(),
        params: parse_query_map(uri),
    }
}

/// Flat parameter map; repeated keys collapse to the last occurrence.
fn parse_query_map(uri: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(query) = query_of(uri) {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params.insert(key.into_owned(), value.into_owned());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::HtmlDocument;
    use pretty_assertions::assert_eq;

    fn classifier() -> MethodClassifier {
        MethodClassifier::new(&ScanConfig::default())
    }

    fn forms_of(html: &str) -> Vec<FormRef> {
        HtmlDocument::parse(html).map(|d| d.forms()).unwrap_or_default()
    }

    fn no_headers() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_broken_urls_are_invalid() {
        let classifier = classifier();
        for broken in ["https://broken-domain", "http://", "", "not-a-url"] {
            let descriptor = classifier.classify(broken, &no_headers(), &[]);
            assert!(
                matches!(descriptor, MethodDescriptor::Invalid { .. }),
                "expected invalid for {broken:?}, got {descriptor:?}"
            );
        }
    }

    #[test]
    fn test_one_click_needs_header_and_exact_marker() {
        let mut headers = HashMap::new();
        headers.insert(
            "List-Unsubscribe".to_string(),
            "<https://a.com/u?id=1>".to_string(),
        );
        headers.insert(
            "List-Unsubscribe-Post".to_string(),
            "List-Unsubscribe=One-Click".to_string(),
        );

        let descriptor = classifier().classify("https://a.com/u?id=1", &headers, &[]);
        assert_eq!(
            descriptor,
            MethodDescriptor::OneClick {
                url: "https://a.com/u?id=1".to_string(),
                marker: ONE_CLICK_MARKER.to_string(),
            }
        );
    }

    #[test]
    fn test_one_click_marker_must_match_exactly() {
        let mut headers = HashMap::new();
        headers.insert(
            "List-Unsubscribe".to_string(),
            "<https://a.com/u?id=1>".to_string(),
        );
        headers.insert(
            "List-Unsubscribe-Post".to_string(),
            "List-Unsubscribe=One-Click; version=2".to_string(),
        );

        let descriptor = classifier().classify("https://a.com/u?id=1", &headers, &[]);
        assert!(matches!(descriptor, MethodDescriptor::HttpGet { .. }));
    }

    #[test]
    fn test_one_click_requires_advertised_url() {
        let mut headers = HashMap::new();
        headers.insert(
            "List-Unsubscribe".to_string(),
            "<https://other.com/u>".to_string(),
        );
        headers.insert(
            "List-Unsubscribe-Post".to_string(),
            "List-Unsubscribe=One-Click".to_string(),
        );

        let descriptor = classifier().classify("https://a.com/u?id=1", &headers, &[]);
        assert!(matches!(descriptor, MethodDescriptor::HttpGet { .. }));
    }

    #[test]
    fn test_mailto_with_subject_and_body() {
        let descriptor = classifier().classify(
            "mailto:unsub@a.com?subject=Remove%20me&body=please+stop",
            &no_headers(),
            &[],
        );
        assert_eq!(
            descriptor,
            MethodDescriptor::EmailReply {
                address: "unsub@a.com".to_string(),
                subject: Some("Remove me".to_string()),
                body: Some("please stop".to_string()),
            }
        );
    }

    #[test]
    fn test_mailto_without_query() {
        let descriptor = classifier().classify("mailto:unsub@a.com", &no_headers(), &[]);
        assert_eq!(
            descriptor,
            MethodDescriptor::EmailReply {
                address: "unsub@a.com".to_string(),
                subject: None,
                body: None,
            }
        );
    }

    #[test]
    fn test_post_form_with_get_params_on_action() {
        let html = r#"<form method="post" action="https://company.com/unsubscribe?token=abc123">
            <input type="hidden" name="user_id" value="123">
        </form>"#;
        let forms = forms_of(html);

        let descriptor = classifier().classify(
            "https://company.com/unsubscribe?token=abc123",
            &no_headers(),
            &forms,
        );

        match descriptor {
            MethodDescriptor::HttpPost {
                action_url,
                form_fields,
                url_params,
            } => {
                assert_eq!(action_url, "https://company.com/unsubscribe?token=abc123");
                assert_eq!(form_fields, vec![("user_id".to_string(), "123".to_string())]);
                assert_eq!(url_params.get("token").map(String::as_str), Some("abc123"));
            }
            other => panic!("expected http_post, got {other:?}"),
        }
    }

    #[test]
    fn test_hidden_only_form_stays_post() {
        let html = r#"<form method="post" action="https://example.com/unsubscribe">
            <input type="hidden" name="user_id" value="123">
            <input type="hidden" name="token" value="abc">
        </form>"#;
        let descriptor = classifier().classify(
            "https://example.com/unsubscribe",
            &no_headers(),
            &forms_of(html),
        );
        assert!(matches!(descriptor, MethodDescriptor::HttpPost { .. }));
    }

    #[test]
    fn test_checkbox_form_downgraded_to_manual() {
        let html = r#"<form method="post" action="https://example.com/preferences">
            <input type="hidden" name="user_id" value="123">
            <input type="checkbox" name="newsletter" value="1"> Keep newsletter
            <input type="checkbox" name="promotions" value="1"> Keep promotions
        </form>"#;
        let descriptor = classifier().classify(
            "https://example.com/preferences",
            &no_headers(),
            &forms_of(html),
        );
        match descriptor {
            MethodDescriptor::ManualIntervention { reasons, .. } => {
                assert_eq!(reasons, vec![ComplexityReason::Checkboxes]);
            }
            other => panic!("expected manual intervention, got {other:?}"),
        }
    }

    #[test]
    fn test_radio_form_downgraded_to_manual() {
        let html = r#"<form method="post" action="https://example.com/preferences">
            <input type="radio" name="frequency" value="daily"> Daily
            <input type="radio" name="frequency" value="weekly"> Weekly
        </form>"#;
        let descriptor = classifier().classify(
            "https://example.com/preferences",
            &no_headers(),
            &forms_of(html),
        );
        match descriptor {
            MethodDescriptor::ManualIntervention { reasons, .. } => {
                assert_eq!(reasons, vec![ComplexityReason::RadioButtons]);
            }
            other => panic!("expected manual intervention, got {other:?}"),
        }
    }

    #[test]
    fn test_three_option_select_downgraded_to_manual() {
        let html = r#"<form method="post" action="https://example.com/preferences">
            <select name="subscription_type">
                <option value="all">All emails</option>
                <option value="important">Important only</option>
                <option value="none">Unsubscribe all</option>
            </select>
        </form>"#;
        let descriptor = classifier().classify(
            "https://example.com/preferences",
            &no_headers(),
            &forms_of(html),
        );
        match descriptor {
            MethodDescriptor::ManualIntervention { reasons, .. } => {
                assert!(reasons.contains(&ComplexityReason::MultipleChoiceDropdowns));
            }
            other => panic!("expected manual intervention, got {other:?}"),
        }
    }

    #[test]
    fn test_two_option_select_is_fine() {
        let html = r#"<form method="post" action="https://example.com/unsubscribe">
            <select name="confirm">
                <option value="yes">Yes</option>
                <option value="no">No</option>
            </select>
        </form>"#;
        let descriptor = classifier().classify(
            "https://example.com/unsubscribe",
            &no_headers(),
            &forms_of(html),
        );
        assert!(matches!(descriptor, MethodDescriptor::HttpPost { .. }));
    }

    #[test]
    fn test_choice_phrase_in_form_text_downgrades() {
        let html = r#"<form method="post" action="https://example.com/preferences">
            <p>Please select which updates you would like to continue receiving:</p>
            <input type="hidden" name="user_id" value="123">
        </form>"#;
        let descriptor = classifier().classify(
            "https://example.com/preferences",
            &no_headers(),
            &forms_of(html),
        );
        match descriptor {
            MethodDescriptor::ManualIntervention { reasons, .. } => {
                assert_eq!(reasons, vec![ComplexityReason::UserChoiceRequired]);
            }
            other => panic!("expected manual intervention, got {other:?}"),
        }
    }

    #[test]
    fn test_get_form_does_not_match() {
        let html = r#"<form method="get" action="https://example.com/unsubscribe"></form>"#;
        let descriptor = classifier().classify(
            "https://example.com/unsubscribe",
            &no_headers(),
            &forms_of(html),
        );
        assert!(matches!(descriptor, MethodDescriptor::HttpGet { .. }));
    }

    #[test]
    fn test_plain_get_with_repeated_key_keeps_last() {
        let descriptor =
            classifier().classify("https://a.com/unsub?id=1&id=2", &no_headers(), &[]);
        match descriptor {
            MethodDescriptor::HttpGet { params, .. } => {
                assert_eq!(params.get("id").map(String::as_str), Some("2"));
            }
            other => panic!("expected http_get, got {other:?}"),
        }
    }

    #[test]
    fn test_get_without_query_has_empty_params() {
        let descriptor = classifier().classify("https://a.com/unsub", &no_headers(), &[]);
        match descriptor {
            MethodDescriptor::HttpGet { url, params } => {
                assert_eq!(url, "https://a.com/unsub");
                assert!(params.is_empty());
            }
            other => panic!("expected http_get, got {other:?}"),
        }
    }

    #[test]
    fn test_mailto_listed_as_one_click_prefers_one_click() {
        let mut headers = HashMap::new();
        headers.insert(
            "List-Unsubscribe".to_string(),
            "<mailto:unsub@a.com>".to_string(),
        );
        headers.insert(
            "List-Unsubscribe-Post".to_string(),
            "List-Unsubscribe=One-Click".to_string(),
        );
        let descriptor = classifier().classify("mailto:unsub@a.com", &headers, &[]);
        assert!(matches!(descriptor, MethodDescriptor::OneClick { .. }));
    }
}
