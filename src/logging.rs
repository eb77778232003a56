use regex::Regex;

/// Masks credential-bearing query values before a URI or form payload
/// reaches the log. Unsubscribe links routinely embed per-recipient
/// tokens; log files must not become a token store.
pub struct Redactor {
    sensitive: Vec<Regex>,
}

impl Redactor {
    pub fn new() -> Self {
        let sensitive = vec![
            Regex::new(r"(?i)(token=)[^&\s]+").unwrap(),
            Regex::new(r"(?i)(password=)[^&\s]+").unwrap(),
            Regex::new(r"(?i)(api_key=)[^&\s]+").unwrap(),
            Regex::new(r"(?i)(key=)[^&\s]+").unwrap(),
            Regex::new(r"(?i)(secret=)[^&\s]+").unwrap(),
        ];
        Redactor { sensitive }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for pattern in &self.sensitive {
            out = pattern.replace_all(&out, "$1***").to_string();
        }
        out
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}
