//! Path pattern matching module
//!
//! A pattern is a `/`-delimited list of segments; a segment is either a
//! literal or a named parameter written as `:name`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use super::RouteError;

/// Bound path parameters, keyed by parameter name
pub type Params = HashMap<String, String>;

/// One segment of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

/// Parsed route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern such as `/authorById/:id`
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| invalid("pattern must start with '/'"))?;

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            if let Some(name) = raw.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter name must not be empty"));
                }
                if segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(existing) if existing == name))
                {
                    return Err(invalid(&format!("parameter ':{name}' is declared twice")));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning the bound parameters on success.
    ///
    /// Parameter values are percent-decoded; a value that does not decode to
    /// UTF-8 does not match.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = Params::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if part != literal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = urlencoding::decode(part).ok()?;
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }

        // Segment counts must be equal, no tail matching
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }

    /// Whether some path could be matched by both patterns
    pub fn overlaps(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    // A parameter never matches an empty segment
                    (Segment::Param(_), Segment::Literal(l))
                    | (Segment::Literal(l), Segment::Param(_)) => !l.is_empty(),
                    (Segment::Param(_), Segment::Param(_)) => true,
                })
    }

    /// Compare specificity against an overlapping pattern.
    ///
    /// The first position where one pattern has a literal and the other a
    /// parameter decides; the literal side is more specific. `Equal` means the
    /// two patterns cannot be told apart.
    pub fn specificity(&self, other: &Self) -> Ordering {
        self.segments
            .iter()
            .zip(&other.segments)
            .map(|(a, b)| a.is_literal().cmp(&b.is_literal()))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_segments() {
        let p = pattern("/authorById/:id");
        assert_eq!(
            p.segments,
            [
                Segment::Literal("authorById".to_string()),
                Segment::Param("id".to_string()),
            ]
        );
        assert_eq!(p.as_str(), "/authorById/:id");
    }

    #[test]
    fn test_parse_rejects_invalid_patterns() {
        assert!(matches!(
            PathPattern::parse("authorById"),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/:"),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/:id/b/:id"),
            Err(RouteError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_match_literal() {
        let p = pattern("/addNewAuthor");
        assert!(p.matches("/addNewAuthor").is_some());
        assert!(p.matches("/addNewAuthor/").is_none());
        assert!(p.matches("/addNewAuthors").is_none());
        assert!(p.matches("addNewAuthor").is_none());
    }

    #[test]
    fn test_match_binds_param() {
        let p = pattern("/authorById/:id");
        let params = p.matches("/authorById/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));

        let params = p.matches("/authorById/not-a-number").unwrap();
        assert_eq!(params["id"], "not-a-number");
    }

    #[test]
    fn test_param_is_percent_decoded() {
        let p = pattern("/authorById/:id");
        assert_eq!(p.matches("/authorById/%34%32").unwrap()["id"], "42");
        assert_eq!(p.matches("/authorById/a%20b").unwrap()["id"], "a b");
        assert!(p.matches("/authorById/%FF").is_none());
    }

    #[test]
    fn test_param_never_matches_empty_segment() {
        let p = pattern("/authorById/:id");
        assert!(p.matches("/authorById/").is_none());
        assert!(p.matches("/authorById").is_none());
        assert!(p.matches("/authorById/42/").is_none());
    }

    #[test]
    fn test_segment_count_must_match() {
        let p = pattern("/a/:x");
        assert!(p.matches("/a/b/c").is_none());
        assert!(p.matches("/a").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let p = pattern("/");
        assert!(p.matches("/").is_some());
        assert!(p.matches("/x").is_none());
    }

    #[test]
    fn test_overlaps() {
        assert!(pattern("/a/:x").overlaps(&pattern("/a/b")));
        assert!(pattern("/a/:x").overlaps(&pattern("/:y/b")));
        assert!(pattern("/a/:x").overlaps(&pattern("/a/:y")));
        assert!(!pattern("/a/:x").overlaps(&pattern("/b/:x")));
        assert!(!pattern("/a/:x").overlaps(&pattern("/a/:x/c")));
        assert!(!pattern("/a/:x").overlaps(&pattern("/a/")));
    }

    #[test]
    fn test_specificity_prefers_literal() {
        assert_eq!(
            pattern("/a/b").specificity(&pattern("/a/:x")),
            Ordering::Greater
        );
        assert_eq!(
            pattern("/:y/b").specificity(&pattern("/a/:x")),
            Ordering::Less
        );
        assert_eq!(
            pattern("/a/:x").specificity(&pattern("/a/:y")),
            Ordering::Equal
        );
    }
}
