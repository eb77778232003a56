use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One email as handed to the analysis pipeline. Header names are
/// stored as received; lookups go through
/// [`get_header_case_insensitive`].
#[derive(Debug, Default, Clone)]
pub struct MessageContext {
    pub headers: HashMap<String, String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    /// The message's own send time (Date header), not wall clock.
    /// Conflict resolution orders state updates by this value.
    pub sent_at: Option<DateTime<Utc>>,
}

impl MessageContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header_case_insensitive(&self.headers, name).map(|v| v.as_str())
    }
}

/// Case-insensitive header lookup utility function
pub fn get_header_case_insensitive<'a>(
    headers: &'a HashMap<String, String>,
    header_name: &str,
) -> Option<&'a String> {
    let header_lower = header_name.to_lowercase();
    headers
        .iter()
        .find(|(k, _)| k.to_lowercase() == header_lower)
        .map(|(_, v)| v)
}

/// Undoes quoted-printable soft line wraps: a trailing `=` plus line
/// break means the logical line continues unbroken, so the pair is
/// removed with nothing inserted. Literal `=3D` unescapes to `=`.
///
/// Wrapped URIs truncate at the wrap point without this step and then
/// fail downstream validation.
pub fn repair_soft_line_breaks(text: &str) -> String {
    text.replace("=\r\n", "")
        .replace("=\n", "")
        .replace("=3D", "=")
}
