//! Channel name patterns
//!
//! Patterns are `/`-separated segments where a segment starting with `:` binds
//! a parameter, e.g. `users/:id` matches `users/42` with `id = "42"`.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parameters captured by a [`ChannelPattern`] match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelParams(HashMap<String, String>);

impl ChannelParams {
    /// Get a captured parameter
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of captured parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed channel pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPattern {
    source: String,
    segments: Vec<Segment>,
}

impl ChannelPattern {
    /// Parse a pattern
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let segments = split(&source)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        Self { source, segments }
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a channel name, returning captured parameters
    pub fn matches(&self, channel: &str) -> Option<ChannelParams> {
        let parts: Vec<&str> = split(channel).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        Some(ChannelParams(params))
    }
}

fn split(value: &str) -> impl Iterator<Item = &str> {
    value.split('/').filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let pattern = ChannelPattern::new("news/global");

        assert!(pattern.matches("news/global").unwrap().is_empty());
        assert!(pattern.matches("/news/global/").is_some());
        assert!(pattern.matches("news/local").is_none());
        assert!(pattern.matches("news").is_none());
    }

    #[test]
    fn test_param_capture() {
        let pattern = ChannelPattern::new("users/:id/orders/:order");
        let params = pattern.matches("users/42/orders/7").unwrap();

        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("order"), Some("7"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_param_requires_segment() {
        let pattern = ChannelPattern::new("users/:id");

        assert!(pattern.matches("users").is_none());
        assert!(pattern.matches("users/1/extra").is_none());
    }
}
