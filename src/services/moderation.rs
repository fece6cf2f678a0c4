//! Content moderation filter
//!
//! Pure, stateless classification of message text. The pattern and word
//! lists are injected at startup; nothing here touches storage.

use crate::config::ModerationConfig;
use crate::error::{AppError, AppResult};
use regex::RegexBuilder;

/// Classifies message content against configured link patterns and a
/// term denylist
pub struct ModerationFilter {
    denylist: Vec<String>,
    link_patterns: Vec<regex::Regex>,
}

impl ModerationFilter {
    /// Compile the configured pattern set
    pub fn new(config: &ModerationConfig) -> AppResult<Self> {
        let mut link_patterns = Vec::with_capacity(config.link_patterns.len());
        for pattern in &config.link_patterns {
            let compiled = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| AppError::Config(format!("Invalid link pattern {:?}: {}", pattern, e)))?;
            link_patterns.push(compiled);
        }

        let denylist = config
            .denylist
            .iter()
            .map(|w| w.to_lowercase())
            .collect();

        Ok(Self {
            denylist,
            link_patterns,
        })
    }

    /// True if the text matches any configured link/handle pattern
    pub fn contains_disallowed_link(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.link_patterns.iter().any(|p| p.is_match(text))
    }

    /// True if the text contains any denylisted term, case-insensitively
    pub fn contains_disallowed_word(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.denylist.iter().any(|word| lower.contains(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(denylist: &[&str]) -> ModerationFilter {
        let config = ModerationConfig {
            denylist: denylist.iter().map(|w| w.to_string()).collect(),
            ..ModerationConfig::default()
        };
        ModerationFilter::new(&config).unwrap()
    }

    #[test]
    fn test_flags_urls_and_domains() {
        let filter = filter_with(&[]);
        assert!(filter.contains_disallowed_link("visit http://x.com now"));
        assert!(filter.contains_disallowed_link("HTTPS://EXAMPLE.ORG/path"));
        assert!(filter.contains_disallowed_link("www.example.com"));
        assert!(filter.contains_disallowed_link("join t.me/somechannel"));
    }

    #[test]
    fn test_flags_platform_handles() {
        let filter = filter_with(&[]);
        assert!(filter.contains_disallowed_link("message @someuser_1"));
        // Handles shorter than five characters are not flagged
        assert!(!filter.contains_disallowed_link("hi @abc"));
    }

    #[test]
    fn test_clean_text_passes() {
        let filter = filter_with(&["badword"]);
        assert!(!filter.contains_disallowed_link("hello there"));
        assert!(!filter.contains_disallowed_word("hello there"));
    }

    #[test]
    fn test_denylist_is_case_insensitive_substring() {
        let filter = filter_with(&["badword"]);
        assert!(filter.contains_disallowed_word("that was a BadWord indeed"));
        assert!(filter.contains_disallowed_word("xbadwordx"));
        assert!(!filter.contains_disallowed_word("goodword"));
    }

    #[test]
    fn test_empty_text_is_clean() {
        let filter = filter_with(&["badword"]);
        assert!(!filter.contains_disallowed_link(""));
        assert!(!filter.contains_disallowed_word(""));
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let config = ModerationConfig {
            link_patterns: vec!["[unclosed".to_string()],
            ..ModerationConfig::default()
        };
        assert!(ModerationFilter::new(&config).is_err());
    }
}
