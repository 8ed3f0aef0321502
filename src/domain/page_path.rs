//! Page path patterns.
//!
//! Patterns use the same placeholder syntax as the HTTP router so a single
//! string registers both the document route and the in-place navigation
//! target: `/report/{id}` binds one segment, `/files/{*path}` binds the rest
//! of the path.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::error::RegistrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

impl Segment {
    const fn rank(&self) -> u8 {
        match self {
            Self::Literal(_) => 0,
            Self::Param(_) => 1,
            Self::CatchAll(_) => 2,
        }
    }
}

/// A parsed, validated page path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePattern {
    path: String,
    segments: Vec<Segment>,
}

impl PagePattern {
    /// Parses and validates a page path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPagePath`] if the path does not
    /// start with `/`, has an empty or duplicated placeholder, has stray
    /// braces, has a literal segment starting with `:` or `*`, or has a
    /// catch-all that is not the last segment.
    pub fn parse(path: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidPagePath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let Some(rest) = path.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let last = parts.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let (name, catch_all) = match inner.strip_prefix('*') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if name.is_empty() || name.contains(['{', '}', '*']) {
                        return Err(invalid("placeholder needs a plain name"));
                    }
                    if names.contains(&name) {
                        return Err(invalid("duplicate placeholder name"));
                    }
                    names.push(name);
                    if catch_all {
                        if i != last {
                            return Err(invalid("catch-all must be the last segment"));
                        }
                        Segment::CatchAll(name.to_string())
                    } else {
                        Segment::Param(name.to_string())
                    }
                }
                None if part.contains(['{', '}']) => {
                    return Err(invalid("unbalanced braces"));
                }
                None if part.starts_with([':', '*']) => {
                    return Err(invalid("literal segments must not start with ':' or '*'"));
                }
                None => Segment::Literal((*part).to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            path: path.to_string(),
            segments,
        })
    }

    /// Returns the pattern as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Matches a request path, returning the bound placeholders on success.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PageParams> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = HashMap::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => {
                    if parts.next()? != literal.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.next()?;
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
                Segment::CatchAll(name) => {
                    let remainder = parts.by_ref().collect::<Vec<_>>().join("/");
                    if remainder.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), remainder);
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(PageParams(params))
    }

    /// Returns `true` if both patterns cannot be routed side by side.
    ///
    /// Placeholder names do not distinguish patterns: `/report/{id}` and
    /// `/report/{key}` collide. A placeholder and a catch-all after the same
    /// prefix collide as well. Literal segments coexist with either.
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        for pair in self.segments.iter().zip(&other.segments) {
            match pair {
                (Segment::Literal(a), Segment::Literal(b)) if a == b => {}
                (Segment::Literal(_), _) | (_, Segment::Literal(_)) => return false,
                (Segment::Param(_), Segment::Param(_)) => {}
                (Segment::CatchAll(_) | Segment::Param(_), _) => return true,
            }
        }
        self.segments.len() == other.segments.len()
    }

    /// Orders patterns from most to least specific: literal segments beat
    /// placeholders, which beat catch-alls, compared left to right.
    #[must_use]
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        let ranks = |p: &Self| p.segments.iter().map(Segment::rank).collect::<Vec<_>>();
        ranks(self)
            .cmp(&ranks(other))
            .then_with(|| other.segments.len().cmp(&self.segments.len()))
    }
}

impl fmt::Display for PagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Placeholder values bound while matching a [`PagePattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams(HashMap<String, String>);

impl PageParams {
    /// Returns the value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the number of bound placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for PageParams {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn pattern(path: &str) -> PagePattern {
        let Ok(p) = PagePattern::parse(path) else {
            panic!("valid pattern {path}");
        };
        p
    }

    #[test]
    fn root_matches_only_root() {
        let root = pattern("/");
        assert!(root.matches("/").is_some());
        assert!(root.matches("/active").is_none());
        assert!(root.matches("").is_none());
    }

    #[test]
    fn binds_placeholders() {
        let p = pattern("/report/{id}");
        let Some(params) = p.matches("/report/q3") else {
            panic!("expected match");
        };
        assert_eq!(params.get("id"), Some("q3"));
        assert_eq!(params.len(), 1);
        assert!(p.matches("/report/").is_none());
        assert!(p.matches("/report/q3/extra").is_none());
        assert!(p.matches("/reports").is_none());
    }

    #[test]
    fn catch_all_binds_remaining_path() {
        let p = pattern("/files/{*path}");
        let Some(params) = p.matches("/files/a/b/c.txt") else {
            panic!("expected match");
        };
        assert_eq!(params, PageParams::from([("path", "a/b/c.txt")]));
        assert!(p.matches("/files").is_none());
        assert!(p.matches("/files/").is_none());
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in [
            "reports",
            "/report/{}",
            "/report/{id",
            "/report/id}",
            "/{*rest}/tail",
            "/{id}/{id}",
            "/{a*b}",
            "/:id",
            "/files/*rest",
        ] {
            assert!(
                matches!(
                    PagePattern::parse(bad),
                    Err(RegistrationError::InvalidPagePath { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn literal_segments_are_more_specific() {
        let literal = pattern("/report/new");
        let param = pattern("/report/{id}");
        let catch_all = pattern("/report/{*rest}");
        assert_eq!(literal.specificity_cmp(&param), Ordering::Less);
        assert_eq!(param.specificity_cmp(&catch_all), Ordering::Less);
        assert_eq!(catch_all.specificity_cmp(&literal), Ordering::Greater);
    }

    #[test]
    fn placeholder_names_do_not_distinguish_patterns() {
        assert!(pattern("/report/{id}").conflicts_with(&pattern("/report/{key}")));
        assert!(pattern("/x/{a}/tail").conflicts_with(&pattern("/x/{b}/tail")));
        assert!(pattern("/report/{id}").conflicts_with(&pattern("/report/{id}")));
    }

    #[test]
    fn placeholder_and_catch_all_at_same_position_conflict() {
        assert!(pattern("/report/{id}").conflicts_with(&pattern("/report/{*rest}")));
        assert!(pattern("/{*rest}").conflicts_with(&pattern("/{id}")));
        assert!(pattern("/cmd/{*path}").conflicts_with(&pattern("/cmd/{tool}/{sub}")));
    }

    #[test]
    fn literals_and_diverging_patterns_coexist() {
        for (a, b) in [
            ("/report/new", "/report/{id}"),
            ("/report/new", "/report/{*rest}"),
            ("/", "/{*rest}"),
            ("/report/{id}", "/report/{id}/raw"),
            ("/cmd/{xxx}/names", "/cmd/{tool}/{sub}"),
            ("/files", "/files/{*rest}"),
        ] {
            assert!(!pattern(a).conflicts_with(&pattern(b)), "{a} vs {b}");
            assert!(!pattern(b).conflicts_with(&pattern(a)), "{b} vs {a}");
        }
    }
}
