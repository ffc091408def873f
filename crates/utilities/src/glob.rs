// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Item name pattern parsing and matching
//!
//! Patterns select child nodes and properties by name. A pattern is a list of
//! alternatives separated by `|`; each alternative is trimmed and may contain
//! any number of `*` wildcards:
//! - `"title"` matches exactly `title`
//! - `"j:translation_*"` matches every translation child
//! - `"jcr:* | title"` matches `jcr:data` and `title`

/// Error type for pattern operations
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GlobError {
    #[error("Invalid name pattern: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, GlobError>;

/// One alternative of a name pattern
#[derive(Debug, Clone, PartialEq)]
pub enum WildcardComponent {
    /// A component containing one or more '*' wildcards
    ///
    /// Pattern is split by '*' into literal segments that must appear in order.
    /// Examples:
    /// - "*VuLink*" -> ["", "VuLink", ""]
    /// - "file*.txt" -> ["file", ".txt"]
    Wildcard { segments: Vec<String> },
    /// A literal name with no wildcards
    Normal(String),
}

impl WildcardComponent {
    fn parse(alternative: &str) -> Self {
        if alternative.contains('*') {
            WildcardComponent::Wildcard {
                segments: alternative.split('*').map(str::to_string).collect(),
            }
        } else {
            WildcardComponent::Normal(alternative.to_string())
        }
    }

    /// Check if this component matches the given name
    /// Returns Some(captures) if match, where captures holds what each wildcard matched
    pub fn match_component<S: AsRef<str>>(&self, name: S) -> Option<Vec<String>> {
        let name = name.as_ref();

        match self {
            WildcardComponent::Wildcard { segments } => {
                let Some(first) = segments.first() else {
                    return Some(vec![name.to_string()]);
                };
                if !name.starts_with(first.as_str()) {
                    return None;
                }
                let mut pos = first.len();
                let mut captures = Vec::new();

                for (i, segment) in segments.iter().enumerate().skip(1) {
                    let capture_start = pos;
                    let is_last = i == segments.len() - 1;

                    if segment.is_empty() {
                        if is_last {
                            // Pattern ends with '*', capture the remainder
                            captures.push(name[capture_start..].to_string());
                            pos = name.len();
                        }
                        continue;
                    }

                    let found_at = if is_last {
                        // The last literal must end the name
                        if name.len() < pos + segment.len() || !name.ends_with(segment.as_str()) {
                            return None;
                        }
                        name.len() - segment.len() - pos
                    } else {
                        name[pos..].find(segment.as_str())?
                    };
                    let capture_end = pos + found_at;
                    captures.push(name[capture_start..capture_end].to_string());
                    pos = capture_end + segment.len();
                }

                if pos != name.len() {
                    return None;
                }
                Some(captures)
            }
            WildcardComponent::Normal(pattern) => {
                if name == pattern {
                    Some(vec![])
                } else {
                    None
                }
            }
        }
    }
}

/// A parsed `|`-separated name pattern
#[derive(Debug, Clone, PartialEq)]
pub struct NamePattern {
    alternatives: Vec<WildcardComponent>,
}

impl NamePattern {
    /// Parse a pattern such as `"jcr:* | title"`.
    ///
    /// # Examples
    /// ```
    /// use utilities::glob::NamePattern;
    ///
    /// let pattern = NamePattern::parse("j:translation_*|title").unwrap();
    /// assert!(pattern.matches("j:translation_fr"));
    /// assert!(pattern.matches("title"));
    /// assert!(!pattern.matches("body"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self> {
        let alternatives: Vec<WildcardComponent> = pattern
            .split('|')
            .map(str::trim)
            .map(|alt| {
                if alt.is_empty() || alt.contains('/') {
                    Err(GlobError::InvalidPattern(pattern.to_string()))
                } else {
                    Ok(WildcardComponent::parse(alt))
                }
            })
            .collect::<Result<_>>()?;
        Ok(Self { alternatives })
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.alternatives
            .iter()
            .any(|alt| alt.match_component(name).is_some())
    }

    #[must_use]
    pub fn alternatives(&self) -> &[WildcardComponent] {
        &self.alternatives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let pattern = NamePattern::parse("title").unwrap();
        assert!(pattern.matches("title"));
        assert!(!pattern.matches("titles"));
    }

    #[test]
    fn test_wildcard_captures() {
        let comp = WildcardComponent::parse("j:translation_*");
        assert_eq!(
            comp.match_component("j:translation_fr"),
            Some(vec!["fr".to_string()])
        );
        assert_eq!(comp.match_component("jcr:data"), None);

        let comp = WildcardComponent::parse("*.txt");
        assert_eq!(comp.match_component("a.b.txt"), Some(vec!["a.b".to_string()]));
        assert_eq!(comp.match_component("a.txt.bak"), None);

        let comp = WildcardComponent::parse("*VuLink*");
        assert_eq!(
            comp.match_component("xVuLinky"),
            Some(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn test_star_matches_everything() {
        let pattern = NamePattern::parse("*").unwrap();
        assert!(pattern.matches(""));
        assert!(pattern.matches("anything"));
    }

    #[test]
    fn test_alternatives_are_trimmed() {
        let pattern = NamePattern::parse("jcr:* | title").unwrap();
        assert!(pattern.matches("jcr:data"));
        assert!(pattern.matches("title"));
        assert!(!pattern.matches("body"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(NamePattern::parse("a||b").is_err());
        assert_eq!(
            NamePattern::parse("a/b"),
            Err(GlobError::InvalidPattern("a/b".to_string()))
        );
    }
}
