use crate::config::ScanConfig;
use crate::unsubscribe::types::SafetyAssessment;
use crate::unsubscribe::{has_http_scheme, mailto_rest, query_of};
use url::form_urlencoded;
use url::Url;

/// Judges whether a URI is safe to execute, independent of how it was
/// classified. There is no allow-list: unsubscribe endpoints are run by
/// an unbounded long tail of senders, so any domain is presumptively
/// fine until a concrete risk pattern fires.
pub struct SafetyValidator {
    suspicious_tokens: Vec<String>,
    shortener_hosts: Vec<String>,
    suspicious_param_names: Vec<String>,
    suspicious_param_values: Vec<String>,
}

impl SafetyValidator {
    pub fn new(config: &ScanConfig) -> Self {
        SafetyValidator {
            suspicious_tokens: lowercased(&config.suspicious_url_tokens),
            shortener_hosts: lowercased(&config.shortener_hosts),
            suspicious_param_names: lowercased(&config.suspicious_param_names),
            suspicious_param_values: lowercased(&config.suspicious_param_values),
        }
    }

    pub fn validate(&self, uri: &str) -> SafetyAssessment {
        let mut warnings = Vec::new();
        let uri_lower = uri.to_lowercase();

        if !uri_lower.starts_with("https://") && !uri_lower.starts_with("mailto:") {
            warnings.push("Insecure connection - HTTP instead of HTTPS".to_string());
        }

        for token in &self.suspicious_tokens {
            if uri_lower.contains(token.as_str()) {
                warnings.push(format!("Suspicious pattern detected: {token}"));
            }
        }

        if let Some(host) = host_of(uri) {
            if self
                .shortener_hosts
                .iter()
                .any(|shortener| is_same_or_subdomain(&host, shortener))
            {
                warnings.push("URL shortener detected - potential security risk".to_string());
            }
        }

        if self.has_suspicious_parameters(uri) {
            warnings.push("Suspicious parameters detected".to_string());
        }

        if !is_well_formed(uri) {
            warnings.push("Malformed or incomplete URL".to_string());
        }

        SafetyAssessment::from_warnings(warnings)
    }

    fn has_suspicious_parameters(&self, uri: &str) -> bool {
        let query = match query_of(uri) {
            Some(query) => query,
            None => return false,
        };

        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let name_lower = name.to_lowercase();
            if self
                .suspicious_param_names
                .iter()
                .any(|s| name_lower.contains(s.as_str()))
            {
                return true;
            }

            let value_lower = value.to_lowercase();
            if self
                .suspicious_param_values
                .iter()
                .any(|s| value_lower.contains(s.as_str()))
            {
                return true;
            }
        }

        false
    }
}

fn lowercased(list: &[String]) -> Vec<String> {
    list.iter().map(|s| s.to_lowercase()).collect()
}

fn host_of(uri: &str) -> Option<String> {
    Url::parse(uri)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_lowercase()))
}

/// `domain` equals `parent` or ends with `.parent`.
fn is_same_or_subdomain(domain: &str, parent: &str) -> bool {
    if domain == parent {
        return true;
    }
    if domain.len() > parent.len() && domain.ends_with(parent) {
        let prefix_len = domain.len() - parent.len();
        domain.as_bytes()[prefix_len - 1] == b'.'
    } else {
        false
    }
}

fn is_well_formed(uri: &str) -> bool {
    if uri.is_empty() {
        return false;
    }

    if mailto_rest(uri).is_some() {
        return uri.contains('@')
            && uri
                .split('@')
                .nth(1)
                .map_or(false, |after| after.contains('.'));
    }

    if has_http_scheme(uri) {
        return Url::parse(uri)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.contains('.')))
            .unwrap_or(false);
    }

    false
}
