use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Keyword, token, and host lists driving extraction, classification,
/// and safety checks. Every list has a built-in default; a YAML file
/// only needs to name the lists it overrides.
///
/// Components receive the config at construction and compile whatever
/// patterns they need from it, so tests can substitute alternate lists
/// without touching shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Phrases that signal unsubscribe intent in link text, URLs, and
    /// body context windows.
    #[serde(default = "default_unsubscribe_keywords")]
    pub unsubscribe_keywords: Vec<String>,

    /// Query-parameter names that mark a URL as unsubscribe-related.
    #[serde(default = "default_unsubscribe_param_names")]
    pub unsubscribe_param_names: Vec<String>,

    /// Substrings anywhere in a URI that make it unsafe to execute.
    #[serde(default = "default_suspicious_url_tokens")]
    pub suspicious_url_tokens: Vec<String>,

    /// Link-shortener hosts; a match (exact or subdomain) hides the
    /// real destination, so the URI is flagged.
    #[serde(default = "default_shortener_hosts")]
    pub shortener_hosts: Vec<String>,

    /// Query-parameter names suggesting command execution or
    /// destructive actions.
    #[serde(default = "default_suspicious_param_names")]
    pub suspicious_param_names: Vec<String>,

    /// Tokens in query-parameter values suggesting destructive actions.
    #[serde(default = "default_suspicious_param_values")]
    pub suspicious_param_values: Vec<String>,

    /// Phrases in form text meaning the form offers a real choice and
    /// must not be auto-submitted.
    #[serde(default = "default_user_choice_phrases")]
    pub user_choice_phrases: Vec<String>,

    /// Marketing terms where a single whole-word hit counts.
    #[serde(default = "default_strong_marketing_keywords")]
    pub strong_marketing_keywords: Vec<String>,

    /// Marketing terms that only count when two distinct ones appear.
    #[serde(default = "default_weak_marketing_keywords")]
    pub weak_marketing_keywords: Vec<String>,

    /// Characters inspected on each side of a bare address or URL when
    /// deciding whether surrounding text shows unsubscribe intent.
    #[serde(default = "default_context_window_chars")]
    pub context_window_chars: usize,
}

fn default_unsubscribe_keywords() -> Vec<String> {
    [
        "unsubscribe",
        "opt-out",
        "opt out",
        "optout",
        "remove",
        "remove me",
        "stop emails",
        "stop sending",
        "manage preferences",
        "email preferences",
        "preferences",
        "subscription",
        "manage subscription",
        "manage",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_unsubscribe_param_names() -> Vec<String> {
    ["unsub", "remove", "optout", "preferences", "manage"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_suspicious_url_tokens() -> Vec<String> {
    [
        "download",
        "exe",
        "zip",
        "dmg",
        "install",
        "delete",
        "destroy",
        "remove-account",
        "cancel-account",
        "confirm",
        "verify-deletion",
        "permanent",
        "javascript:",
        "data:",
        "vbscript:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_shortener_hosts() -> Vec<String> {
    [
        "bit.ly",
        "tinyurl.com",
        "t.co",
        "goo.gl",
        "ow.ly",
        "s.id",
        "j.mp",
        "buff.ly",
        "dlvr.it",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_suspicious_param_names() -> Vec<String> {
    [
        "cmd",
        "command",
        "exec",
        "delete",
        "destroy",
        "action",
        "do",
        "operation",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_suspicious_param_values() -> Vec<String> {
    ["delete", "destroy", "remove"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_user_choice_phrases() -> Vec<String> {
    [
        "select which",
        "choose",
        "continue receiving",
        "manage preferences",
        "customize",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_strong_marketing_keywords() -> Vec<String> {
    [
        "sale",
        "deal",
        "offer",
        "discount",
        "promo",
        "coupon",
        "limited time",
        "exclusive",
        "special",
        "free",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_weak_marketing_keywords() -> Vec<String> {
    ["newsletter", "update", "news", "weekly", "monthly"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_context_window_chars() -> usize {
    50
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            unsubscribe_keywords: default_unsubscribe_keywords(),
            unsubscribe_param_names: default_unsubscribe_param_names(),
            suspicious_url_tokens: default_suspicious_url_tokens(),
            shortener_hosts: default_shortener_hosts(),
            suspicious_param_names: default_suspicious_param_names(),
            suspicious_param_values: default_suspicious_param_values(),
            user_choice_phrases: default_user_choice_phrases(),
            strong_marketing_keywords: default_strong_marketing_keywords(),
            weak_marketing_keywords: default_weak_marketing_keywords(),
            context_window_chars: default_context_window_chars(),
        }
    }
}

impl ScanConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: ScanConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|source| ConfigError::Serialize { source })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_include_canonical_entries() {
        let config = ScanConfig::default();
        assert!(config.unsubscribe_keywords.contains(&"opt-out".to_string()));
        assert!(config.unsubscribe_keywords.contains(&"stop emails".to_string()));
        assert_eq!(config.unsubscribe_param_names.len(), 5);
        assert!(config.shortener_hosts.contains(&"bit.ly".to_string()));
        assert!(config.suspicious_url_tokens.contains(&"javascript:".to_string()));
        assert!(config.suspicious_param_names.contains(&"cmd".to_string()));
        assert_eq!(config.context_window_chars, 50);
    }

    #[test]
    fn test_empty_yaml_yields_defaults() {
        let config: ScanConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(
            config.unsubscribe_keywords,
            ScanConfig::default().unsubscribe_keywords
        );
        assert_eq!(config.shortener_hosts, ScanConfig::default().shortener_hosts);
    }

    #[test]
    fn test_partial_yaml_overrides_one_list() {
        let yaml = "shortener_hosts:\n  - example-shortener.test\n";
        let config: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.shortener_hosts, vec!["example-shortener.test"]);
        // untouched lists keep their defaults
        assert_eq!(
            config.unsubscribe_keywords,
            ScanConfig::default().unsubscribe_keywords
        );
    }
}
