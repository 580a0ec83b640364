//! Robots.txt rules for one host, matched with the robotstxt crate

use robotstxt::DefaultMatcher;

/// Parsed robots.txt of a host
///
/// An empty or absent robots.txt allows everything.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt body; `None` means no restrictions
    content: Option<String>,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        let trimmed = content.trim();
        Self {
            content: (!trimmed.is_empty()).then(|| content.to_string()),
        }
    }

    /// Rules for a host without a usable robots.txt
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks a full URL against the group for `user_agent`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.content {
            None => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let rules = RobotsRules::allow_all();
        assert!(rules.is_allowed("https://erc.gov.ph/admin", "PolicyCrawler"));
    }

    #[test]
    fn test_disallow_prefix() {
        let rules = RobotsRules::from_content("User-agent: *\nDisallow: /internal");
        assert!(rules.is_allowed("https://erc.gov.ph/", "PolicyCrawler"));
        assert!(!rules.is_allowed("https://erc.gov.ph/internal/memo", "PolicyCrawler"));
    }

    #[test]
    fn test_agent_specific_group() {
        let rules = RobotsRules::from_content(
            "User-agent: PolicyCrawler\nDisallow: /\n\nUser-agent: *\nAllow: /",
        );
        assert!(!rules.is_allowed("https://pse.com.ph/quotes", "PolicyCrawler"));
        assert!(rules.is_allowed("https://pse.com.ph/quotes", "OtherBot"));
    }

    #[test]
    fn test_allow_overrides_longer_match() {
        let rules =
            RobotsRules::from_content("User-agent: *\nDisallow: /docs\nAllow: /docs/public");
        assert!(!rules.is_allowed("https://mas.gov.sg/docs/draft", "PolicyCrawler"));
        assert!(rules.is_allowed("https://mas.gov.sg/docs/public/a", "PolicyCrawler"));
    }

    #[test]
    fn test_whitespace_only_allows_all() {
        let rules = RobotsRules::from_content("  \n ");
        assert!(rules.is_allowed("https://mas.gov.sg/", "PolicyCrawler"));
    }
}
