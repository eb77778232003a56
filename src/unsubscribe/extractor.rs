use crate::config::ScanConfig;
use crate::html::HtmlDocument;
use crate::message::{repair_soft_line_breaks, MessageContext};
use crate::unsubscribe::query_of;
use crate::unsubscribe::types::{CandidateSource, UnsubscribeCandidate, LIST_UNSUBSCRIBE_HEADER};
use log::debug;
use regex::Regex;
use std::collections::HashSet;
use url::form_urlencoded;

/// Pulls candidate unsubscribe URIs out of one message: bracketed URIs
/// from the List-Unsubscribe header, keyword-bearing links and
/// contextual email addresses from the bodies, and every form action
/// for the classifier to judge.
///
/// Output is ordered (header first, then HTML, then plain text, then
/// form actions) and de-duplicated keeping the first occurrence.
/// Extraction never fails; the worst case is an empty list.
pub struct LinkExtractor {
    /// Lowercased intent keywords, as configured.
    keywords: Vec<String>,
    /// (space-removed, space-to-hyphen) forms for matching inside URLs.
    keyword_forms: Vec<(String, String)>,
    param_names: Vec<String>,
    window: usize,
    uri_re: Regex,
    email_re: Regex,
    bracket_re: Regex,
}

impl LinkExtractor {
    pub fn new(config: &ScanConfig) -> Self {
        let keywords: Vec<String> = config
            .unsubscribe_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let keyword_forms = keywords
            .iter()
            .map(|k| (k.replace(' ', ""), k.replace(' ', "-")))
            .collect();

        LinkExtractor {
            keywords,
            keyword_forms,
            param_names: config
                .unsubscribe_param_names
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            window: config.context_window_chars,
            uri_re: Regex::new(r#"(?i)(?:https?://|mailto:)[^\s<>"']+"#).unwrap(),
            email_re: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            bracket_re: Regex::new(r"<([^>]+)>").unwrap(),
        }
    }

    pub fn extract(&self, message: &MessageContext) -> Vec<UnsubscribeCandidate> {
        let mut candidates = Vec::new();

        if let Some(value) = message.header(LIST_UNSUBSCRIBE_HEADER) {
            let before = candidates.len();
            self.extract_from_header(value, &mut candidates);
            debug!(
                "List-Unsubscribe header yielded {} candidate(s)",
                candidates.len() - before
            );
        }

        let repaired_html = message
            .html_body
            .as_deref()
            .map(repair_soft_line_breaks);

        if let Some(html) = repaired_html.as_deref() {
            self.extract_from_html(html, &mut candidates);
        }

        if let Some(text) = message.text_body.as_deref() {
            let repaired = repair_soft_line_breaks(text);
            self.scan_uris(&repaired, CandidateSource::PlainText, &mut candidates);
            self.scan_addresses(&repaired, CandidateSource::PlainText, &mut candidates);
        }

        // Form actions go last, unfiltered; the classifier decides
        // whether they are unsubscribe forms.
        if let Some(html) = repaired_html.as_deref() {
            self.extract_form_actions(html, &mut candidates);
        }

        let deduped = dedup_first_wins(candidates);
        debug!("extracted {} unique candidate(s)", deduped.len());
        deduped
    }

    /// Header value is a comma-separated list of `<uri>` entries; every
    /// bracketed substring is taken verbatim.
    fn extract_from_header(&self, value: &str, out: &mut Vec<UnsubscribeCandidate>) {
        for capture in self.bracket_re.captures_iter(value) {
            let uri = capture[1].trim();
            if !uri.is_empty() {
                out.push(UnsubscribeCandidate::new(uri, CandidateSource::Header));
            }
        }
    }

    fn extract_from_html(&self, html: &str, out: &mut Vec<UnsubscribeCandidate>) {
        match HtmlDocument::parse(html) {
            Some(doc) => {
                for anchor in doc.anchors() {
                    let href = anchor.href.trim();
                    if !href.is_empty() && self.is_unsubscribe_link(href) {
                        out.push(UnsubscribeCandidate::new(href, CandidateSource::HtmlAnchor));
                    }
                }
                let text = doc.visible_text();
                self.scan_addresses(&text, CandidateSource::HtmlText, out);
            }
            None => {
                // No structured view; scan the raw markup for URIs.
                self.scan_uris(html, CandidateSource::HtmlText, out);
            }
        }
    }

    fn extract_form_actions(&self, html: &str, out: &mut Vec<UnsubscribeCandidate>) {
        if let Some(doc) = HtmlDocument::parse(html) {
            for form in doc.forms() {
                if !form.action.is_empty() {
                    out.push(UnsubscribeCandidate::new(
                        form.action,
                        CandidateSource::FormAction,
                    ));
                }
            }
        }
    }

    /// Bare URIs in running text count when the URI itself looks
    /// unsubscribe-related, or when the surrounding window shows intent
    /// (shortened links carry no keyword of their own).
    fn scan_uris(&self, text: &str, source: CandidateSource, out: &mut Vec<UnsubscribeCandidate>) {
        for m in self.uri_re.find_iter(text) {
            let uri = m.as_str();
            if self.is_unsubscribe_link(uri)
                || self.window_shows_intent(text, m.start(), m.end())
            {
                out.push(UnsubscribeCandidate::new(uri, source));
            }
        }
    }

    /// Bare email addresses become reply-candidates only when the
    /// window around them shows unsubscribe intent.
    fn scan_addresses(
        &self,
        text: &str,
        source: CandidateSource,
        out: &mut Vec<UnsubscribeCandidate>,
    ) {
        for m in self.email_re.find_iter(text) {
            if self.window_shows_intent(text, m.start(), m.end()) {
                out.push(UnsubscribeCandidate::new(
                    format!("mailto:{}", m.as_str()),
                    source,
                ));
            }
        }
    }

    /// Keyword (space-removed or space-to-hyphen form) anywhere in the
    /// lowercased link, or a configured name inside any query-parameter
    /// name.
    fn is_unsubscribe_link(&self, link: &str) -> bool {
        let link_lower = link.to_lowercase();

        for (squeezed, hyphenated) in &self.keyword_forms {
            if link_lower.contains(squeezed.as_str()) || link_lower.contains(hyphenated.as_str()) {
                return true;
            }
        }

        if let Some(query) = query_of(link) {
            for (name, _) in form_urlencoded::parse(query.as_bytes()) {
                let name_lower = name.to_lowercase();
                if self.param_names.iter().any(|p| name_lower.contains(p)) {
                    return true;
                }
            }
        }

        false
    }

    fn window_shows_intent(&self, text: &str, start: usize, end: usize) -> bool {
        let window = char_window(text, start, end, self.window);
        let window_lower = window.to_lowercase();
        self.keywords.iter().any(|k| window_lower.contains(k))
    }
}

/// Slice of `text` spanning up to `span` characters on each side of the
/// byte range `start..end`.
fn char_window(text: &str, start: usize, end: usize, span: usize) -> &str {
    let lo = text[..start]
        .char_indices()
        .rev()
        .take(span)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start.min(text.len()));
    let suffix = &text[end..];
    let hi = end
        + suffix
            .char_indices()
            .nth(span)
            .map(|(i, _)| i)
            .unwrap_or(suffix.len());
    &text[lo..hi]
}

fn dedup_first_wins(candidates: Vec<UnsubscribeCandidate>) -> Vec<UnsubscribeCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.uri.clone()))
        .collect()
}
