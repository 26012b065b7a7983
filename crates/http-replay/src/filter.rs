// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exclusion rules applied to captured requests before they are replayed.
//!
//! A rule is written `method:urlRegex` or just `urlRegex`, in which case any
//! method matches. `*` stands for "any" on either side. The url side is a
//! regular expression searched anywhere in the request url. A rule whose
//! regex does not compile never matches; it does not invalidate the others.

use regex::Regex;
use tracing::warn;

use crate::request::CanonicalRequest;

const WILDCARD: &str = "*";

/// Returns `true` when any of `patterns` excludes `request`.
///
/// Compiles every pattern on each call; use [`RequestFilter`] when the same
/// patterns are checked against many requests.
pub fn is_filtered<S: AsRef<str>>(request: &CanonicalRequest, patterns: &[S]) -> bool {
    patterns
        .iter()
        .filter_map(|p| FilterRule::parse(p.as_ref()))
        .any(|rule| rule.matches(request))
}

#[derive(Clone, Debug)]
enum UrlMatcher {
    Any,
    Pattern(Regex),
    /// The pattern did not compile.
    Inert,
}

#[derive(Clone, Debug)]
pub struct FilterRule {
    /// Lowercased, or `None` for any method.
    method: Option<String>,
    url: UrlMatcher,
}

impl FilterRule {
    /// Returns `None` for a pattern that is empty once whitespace is removed.
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern: String = pattern.chars().filter(|c| !c.is_whitespace()).collect();
        if pattern.is_empty() {
            return None;
        }

        let (method, url) = pattern
            .split_once(':')
            .unwrap_or((WILDCARD, pattern.as_str()));

        let method = (method != WILDCARD).then(|| method.to_lowercase());
        let url = if url == WILDCARD {
            UrlMatcher::Any
        } else {
            match Regex::new(url) {
                Ok(re) => UrlMatcher::Pattern(re),
                Err(err) => {
                    warn!("ignoring filter pattern `{pattern}`: {err}");
                    UrlMatcher::Inert
                }
            }
        };

        Some(Self { method, url })
    }

    pub fn matches(&self, request: &CanonicalRequest) -> bool {
        if let Some(method) = &self.method {
            if !request.method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        match &self.url {
            UrlMatcher::Any => true,
            UrlMatcher::Pattern(re) => re.is_match(&request.url),
            UrlMatcher::Inert => false,
        }
    }
}

/// A set of exclusion rules compiled once.
#[derive(Clone, Debug, Default)]
pub struct RequestFilter {
    rules: Vec<FilterRule>,
}

impl RequestFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            rules: patterns
                .iter()
                .filter_map(|p| FilterRule::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn is_filtered(&self, request: &CanonicalRequest) -> bool {
        self.rules.iter().any(|rule| rule.matches(request))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn get(url: &str) -> CanonicalRequest {
        CanonicalRequest::new("GET", url)
    }

    #[test]
    fn no_patterns_never_filter() {
        let empty: [&str; 0] = [];
        assert!(!is_filtered(&get("/a"), &empty));
        assert!(!is_filtered(&get("/a"), &["", "  \t"]));
    }

    #[test]
    fn bare_wildcard_filters_everything() {
        assert!(is_filtered(&get("/a"), &["*"]));
        assert!(is_filtered(&CanonicalRequest::new("DELETE", "/x"), &["*:*"]));
    }

    #[test]
    fn method_is_case_insensitive() {
        assert!(is_filtered(&get("/a"), &["get:/a"]));
        assert!(is_filtered(&get("/a"), &["GeT:/a"]));
        assert!(!is_filtered(&CanonicalRequest::new("POST", "/a"), &["get:/a"]));
    }

    #[test]
    fn url_is_searched_not_anchored() {
        assert!(is_filtered(&get("http://host/api/users/7"), &["users/\\d+"]));
        assert!(!is_filtered(&get("http://host/api/users/7"), &["^users"]));
    }

    #[test]
    fn splits_at_first_colon_only() {
        // the url side keeps its own colons
        assert!(is_filtered(&get("https://host/a"), &["get:https://host"]));
        assert!(is_filtered(&get("https://host/a"), &["*:https?://"]));
    }

    #[test]
    fn whitespace_is_ignored() {
        assert!(is_filtered(&get("/health"), &[" get : /health "]));
    }

    #[test]
    fn invalid_regex_is_inert() {
        assert!(!is_filtered(&get("/a("), &["/a("]));
        // later rules still apply
        assert!(is_filtered(&get("/a("), &["/a(", "/a"]));
    }

    #[test]
    fn compiled_filter_agrees_with_predicate() {
        let patterns = ["post:/b", "(", "get:^/admin"];
        let filter = RequestFilter::new(&patterns);
        for req in [
            get("/admin/x"),
            get("/b"),
            CanonicalRequest::new("POST", "/b"),
            CanonicalRequest::new("POST", "/admin"),
        ] {
            assert_eq!(filter.is_filtered(&req), is_filtered(&req, &patterns));
        }
    }

    proptest! {
        #[test]
        fn wildcard_excludes_any_request(method in "[A-Za-z]{1,8}", url in "\\PC*") {
            prop_assert!(is_filtered(&CanonicalRequest::new(method, url), &["*"]));
        }

        #[test]
        fn empty_pattern_list_never_excludes(method in "[A-Za-z]{1,8}", url in "\\PC*") {
            let empty: [String; 0] = [];
            prop_assert!(!is_filtered(&CanonicalRequest::new(method, url), &empty));
        }
    }
}
