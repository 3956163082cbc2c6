//! Resource classifier deciding which asset references are left alone
//!
//! A reference that matches a skip rule is neither fetched nor rewritten; the
//! saved page keeps pointing at the original location.

use crate::config::ClassifierConfig;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Kind of asset-bearing element a reference was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    /// `<img src>`
    Image,
    /// `<link rel="stylesheet" href>`
    Stylesheet,
    /// `<script src>`
    Script,
}

impl AssetCategory {
    /// The attribute carrying the reference for this category
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Image | Self::Script => "src",
            Self::Stylesheet => "href",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
        }
    }

    /// Parses the category names used in configuration files
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "stylesheet" => Some(Self::Stylesheet),
            "script" => Some(Self::Script),
            _ => None,
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single skip predicate
#[derive(Debug, Clone)]
pub struct SkipRule {
    /// Category the rule applies to; `None` applies to every category
    pub category: Option<AssetCategory>,
    pub pattern: Regex,
}

impl SkipRule {
    /// Builds a case-insensitive rule
    pub fn new(category: Option<AssetCategory>, pattern: &str) -> Result<Self, ConfigError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        Ok(Self { category, pattern })
    }

    pub fn applies_to(&self, category: AssetCategory) -> bool {
        self.category.map_or(true, |c| c == category)
    }
}

// Heavy media, font CDNs, trackers and dynamic images
const IMAGE_SKIPS: &[&str] = &[
    r"\.mp4$",
    r"\.webm$",
    r"\.pdf$",
    r"\.zip$",
    r"fonts\.googleapis\.com",
    r"analytics",
    r"tracking",
    r"gtag",
    r"\.svg\?",
    r"data:image",
];

const STYLESHEET_SKIPS: &[&str] = &[
    r"fonts\.googleapis\.com",
    r"analytics",
    r"tracking",
    r"gtag",
    r"\.css\?v=\d+",
    r"cdn\.jsdelivr\.net.*bootstrap",
];

const SCRIPT_SKIPS: &[&str] = &[
    r"analytics",
    r"tracking",
    r"gtag",
    r"gtm",
    r"facebook\.net",
    r"twitter\.com",
    r"googleapis\.com.*analytics",
    r"\.js\?v=\d+",
    r"recaptcha",
    r"captcha",
    r"ads",
    r"doubleclick",
];

/// Ordered list of skip rules evaluated against raw references
#[derive(Debug, Clone, Default)]
pub struct ResourceClassifier {
    rules: Vec<SkipRule>,
}

impl ResourceClassifier {
    /// A classifier that skips nothing
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rule set
    pub fn with_defaults() -> Self {
        let mut rules = Vec::new();
        for (category, patterns) in [
            (AssetCategory::Image, IMAGE_SKIPS),
            (AssetCategory::Stylesheet, STYLESHEET_SKIPS),
            (AssetCategory::Script, SCRIPT_SKIPS),
        ] {
            for pattern in patterns {
                // Built-in patterns are fixed and known to compile
                if let Ok(rule) = SkipRule::new(Some(category), pattern) {
                    rules.push(rule);
                }
            }
        }
        Self { rules }
    }

    /// Builds the classifier described by configuration
    ///
    /// Defaults (if enabled) come first, configured rules follow in file order.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let mut classifier = if config.use_defaults {
            Self::with_defaults()
        } else {
            Self::empty()
        };

        for entry in &config.rules {
            let category = match entry.category.as_str() {
                "any" => None,
                other => Some(AssetCategory::from_config_str(other).ok_or_else(|| {
                    ConfigError::InvalidPattern(format!("unknown rule category '{}'", other))
                })?),
            };
            classifier.push(SkipRule::new(category, &entry.pattern)?);
        }

        Ok(classifier)
    }

    pub fn push(&mut self, rule: SkipRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the first rule that matches, if any
    pub fn matching_rule(&self, category: AssetCategory, raw: &str) -> Option<&SkipRule> {
        self.rules
            .iter()
            .find(|rule| rule.applies_to(category) && rule.pattern.is_match(raw))
    }

    /// Returns true if the reference should be left untouched
    pub fn should_skip(&self, category: AssetCategory, raw: &str) -> bool {
        self.matching_rule(category, raw).is_some()
    }
}
