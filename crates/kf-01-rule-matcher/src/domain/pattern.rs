//! Segment and value patterns.
//!
//! A segment pattern splits on a separator (`/` for paths, `.` for hosts);
//! each segment is a literal or a capture:
//!
//! ```text
//! /orders/{id}/items/{item:[0-9]+}/{}
//!         ^^^^       ^^^^^^^^^^^^^ ^^
//!         named      named + regex anonymous
//! ```
//!
//! A value pattern (header/query) is a literal, or a regex in braces.

use crate::error::{MatcherError, MatcherResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref CAPTURE_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("capture name regex is valid");
}

#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Capture { name: Option<String>, regex: Regex },
}

/// Compiled segment pattern.
#[derive(Debug, Clone)]
pub struct SegmentPattern {
    sep: char,
    segments: Vec<Segment>,
}

impl SegmentPattern {
    pub fn parse(pattern: &str, sep: char) -> MatcherResult<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            if chars[i] == sep {
                i += 1;
                continue;
            }

            if chars[i] == '{' {
                let start = i;
                let (body, next) = read_braced(&chars, i).ok_or_else(|| {
                    MatcherError::UnclosedBrace {
                        index: start,
                        pattern: pattern.to_string(),
                    }
                })?;
                if next < chars.len() && chars[next] != sep {
                    return Err(MatcherError::MixedSegment {
                        index: next,
                        pattern: pattern.to_string(),
                    });
                }
                segments.push(capture(&body, sep)?);
                i = next;
                continue;
            }

            let mut literal = String::new();
            while i < chars.len() && chars[i] != sep {
                match chars[i] {
                    '\\' if chars.get(i + 1) == Some(&'{') => {
                        literal.push('{');
                        i += 2;
                    }
                    '{' => {
                        return Err(MatcherError::MixedSegment {
                            index: i,
                            pattern: pattern.to_string(),
                        })
                    }
                    c => {
                        literal.push(c);
                        i += 1;
                    }
                }
            }
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { sep, segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match `value` segment by segment, writing named captures into
    /// `captures` only when every segment matched. With `prefix` the value
    /// may have more segments than the pattern.
    pub fn matches(
        &self,
        value: &str,
        prefix: bool,
        captures: &mut BTreeMap<String, String>,
    ) -> bool {
        let trimmed = value.trim_matches(self.sep);
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split(self.sep).collect()
        };

        if self.segments.len() > parts.len() {
            return false;
        }
        if !prefix && self.segments.len() != parts.len() {
            return false;
        }

        let mut found = Vec::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return false;
                    }
                }
                Segment::Capture { name, regex } => {
                    if !regex.is_match(part) {
                        return false;
                    }
                    if let Some(name) = name {
                        found.push((name.clone(), (*part).to_string()));
                    }
                }
            }
        }

        captures.extend(found);
        true
    }
}

/// Header or query value: literal, or `{regex}`.
#[derive(Debug, Clone)]
pub enum ValuePattern {
    Literal(String),
    Regex(Regex),
}

impl ValuePattern {
    pub fn parse(value: &str) -> MatcherResult<Self> {
        match value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
            Some(inner) => {
                let inner = if inner.is_empty() { ".*" } else { inner };
                Ok(ValuePattern::Regex(anchored(inner)?))
            }
            None => Ok(ValuePattern::Literal(value.to_string())),
        }
    }

    /// True when any of `values` matches.
    pub fn matches_any(&self, values: &[String]) -> bool {
        values.iter().any(|v| match self {
            ValuePattern::Literal(lit) => lit == v,
            ValuePattern::Regex(re) => re.is_match(v),
        })
    }
}

/// Compile `re` anchored at both ends, dropping anchors it already has.
pub fn anchored(re: &str) -> MatcherResult<Regex> {
    let body = re.strip_prefix('^').unwrap_or(re);
    let body = body.strip_suffix('$').unwrap_or(body);
    Regex::new(&format!("^{body}$")).map_err(|e| MatcherError::InvalidRegex {
        regex: re.to_string(),
        reason: e.to_string(),
    })
}

/// Read `{...}` starting at `open`, balancing nested braces so quantifiers
/// like `{3}` stay inside. Returns the inner text and the index after the
/// closing brace.
fn read_braced(chars: &[char], open: usize) -> Option<(String, usize)> {
    let mut depth = 0usize;
    let mut body = String::new();
    let mut i = open;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            if depth > 0 {
                body.push(c);
                body.push(chars[i + 1]);
            }
            i += 2;
            continue;
        }
        match c {
            '{' => {
                if depth > 0 {
                    body.push(c);
                }
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((body, i + 1));
                }
                body.push(c);
            }
            _ => body.push(c),
        }
        i += 1;
    }
    None
}

/// `{}`, `{name}`, `{name:regex}`, or a bare regex such as the alternation
/// produced by array variables.
fn capture(body: &str, sep: char) -> MatcherResult<Segment> {
    let default_re = || format!("[^{}]+", regex::escape(&sep.to_string()));

    let (name, re) = match body.split_once(':') {
        Some((name, re)) if CAPTURE_NAME.is_match(name) || name.is_empty() => {
            let re = if re.is_empty() { default_re() } else { re.to_string() };
            (non_empty(name), re)
        }
        _ if body.is_empty() => (None, default_re()),
        _ if CAPTURE_NAME.is_match(body) => (Some(body.to_string()), default_re()),
        _ => (None, body.to_string()),
    };

    Ok(Segment::Capture {
        name,
        regex: anchored(&re)?,
    })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_exact_path() {
        let p = SegmentPattern::parse("/orders/{id}", '/').unwrap();
        let mut c = caps();
        assert!(p.matches("/orders/42", false, &mut c));
        assert_eq!(c.get("id").map(String::as_str), Some("42"));

        let mut c = caps();
        assert!(!p.matches("/orders", false, &mut c));
        assert!(!p.matches("/orders/42/extra", false, &mut c));
        assert!(c.is_empty());
    }

    #[test]
    fn test_prefix_path() {
        let p = SegmentPattern::parse("/orders", '/').unwrap();
        let mut c = caps();
        assert!(p.matches("/orders", true, &mut c));
        assert!(p.matches("/orders/42/extra", true, &mut c));
        assert!(!p.matches("/order", true, &mut c));
    }

    #[test]
    fn test_root_path() {
        let p = SegmentPattern::parse("/", '/').unwrap();
        let mut c = caps();
        assert!(p.matches("/", false, &mut c));
        assert!(!p.matches("/a", false, &mut c));
        assert!(p.matches("/a/b", true, &mut c));
    }

    #[test]
    fn test_regex_capture_with_quantifier() {
        let p = SegmentPattern::parse("/items/{sku:[A-Z]{3}-[0-9]+}", '/').unwrap();
        let mut c = caps();
        assert!(p.matches("/items/ABC-12", false, &mut c));
        assert_eq!(c["sku"], "ABC-12");
        assert!(!p.matches("/items/AB-12", false, &mut caps()));
    }

    #[test]
    fn test_anonymous_capture_not_recorded() {
        let p = SegmentPattern::parse("/a/{}/c", '/').unwrap();
        let mut c = caps();
        assert!(p.matches("/a/anything/c", false, &mut c));
        assert!(c.is_empty());
    }

    #[test]
    fn test_failed_match_commits_nothing() {
        let p = SegmentPattern::parse("/a/{x}/c", '/').unwrap();
        let mut c = caps();
        assert!(!p.matches("/a/1/d", false, &mut c));
        assert!(c.is_empty());
    }

    #[test]
    fn test_host_segments() {
        let p = SegmentPattern::parse("{tenant}.example.com", '.').unwrap();
        let mut c = caps();
        assert!(p.matches("acme.example.com", false, &mut c));
        assert_eq!(c["tenant"], "acme");
        assert!(!p.matches("a.b.example.com", false, &mut caps()));
    }

    #[test]
    fn test_alternation_segment() {
        let p = SegmentPattern::parse("/{^v1$|^v2$}/x", '/').unwrap();
        assert!(p.matches("/v2/x", false, &mut caps()));
        assert!(!p.matches("/v3/x", false, &mut caps()));
    }

    #[test]
    fn test_escaped_brace_is_literal() {
        let p = SegmentPattern::parse(r"/\{literal}", '/').unwrap();
        assert!(p.matches("/{literal}", false, &mut caps()));
    }

    #[test]
    fn test_unclosed_brace() {
        let err = SegmentPattern::parse("/a/{id", '/').unwrap_err();
        assert!(matches!(err, MatcherError::UnclosedBrace { index: 3, .. }));
    }

    #[test]
    fn test_mixed_segment_rejected() {
        assert!(matches!(
            SegmentPattern::parse("/a/x{id}", '/'),
            Err(MatcherError::MixedSegment { .. })
        ));
        assert!(matches!(
            SegmentPattern::parse("/a/{id}.json", '/'),
            Err(MatcherError::MixedSegment { .. })
        ));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            SegmentPattern::parse("/a/{id:[0-9}", '/'),
            Err(MatcherError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_value_patterns() {
        let vals = vec!["application/json".to_string(), "text/html".to_string()];
        assert!(ValuePattern::parse("text/html").unwrap().matches_any(&vals));
        assert!(ValuePattern::parse("{^text/.*$}").unwrap().matches_any(&vals));
        assert!(ValuePattern::parse("{}").unwrap().matches_any(&vals));
        assert!(!ValuePattern::parse("{xml}").unwrap().matches_any(&vals));
        assert!(!ValuePattern::parse("{}").unwrap().matches_any(&[]));
    }
}
