//! Pure functions for route templates, path parameters and query strings.
//!
//! This module contains stateless, side-effect-free functions for turning a
//! route template plus editor rows into a concrete URL, and for going back
//! from a pasted URL to query rows. These functions are designed to be easily
//! testable.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use url::Url;

use crate::types::{KeyValuePair, PathParam};

static COLON_PARAM: OnceLock<Regex> = OnceLock::new();
static BRACKET_PARAM: OnceLock<Regex> = OnceLock::new();

fn colon_param_re() -> &'static Regex {
    COLON_PARAM.get_or_init(|| {
        Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("colon parameter regex")
    })
}

fn bracket_param_re() -> &'static Regex {
    // Alternation order matters: `[[...x]]` must win over `[...x]`.
    BRACKET_PARAM.get_or_init(|| {
        Regex::new(r"\[\[\.\.\.([^\[\]/]+)\]\]|\[(\.\.\.)?([^\[\]/]+)\]")
            .expect("bracket parameter regex")
    })
}

/// Extract the placeholders of a route template.
///
/// Colon-style parameters (`:id`) are always required. Bracket-style
/// parameters are required for `[id]` and optional for the catch-all forms
/// `[...slug]` and `[[...slug]]`; the `...` marker is not part of the name.
///
/// Colon matches are listed before bracket matches, so a template mixing both
/// styles is not reported in left-to-right order.
///
/// # Examples
/// ```
/// use api_explorer::url_params::extract_path_params;
///
/// let params = extract_path_params("/api/v1/teams/:teamId/docs/[...slug]");
/// assert_eq!(params[0].name, "teamId");
/// assert_eq!(params[1].name, "slug");
/// assert!(!params[1].required);
/// ```
pub fn extract_path_params(template: &str) -> Vec<PathParam> {
    let mut params: Vec<PathParam> = Vec::new();

    for caps in colon_param_re().captures_iter(template) {
        let pattern = caps[0].to_string();
        if params.iter().any(|p| p.pattern == pattern) {
            continue;
        }
        params.push(PathParam::new(&caps[1], pattern, true));
    }

    for caps in bracket_param_re().captures_iter(template) {
        let pattern = caps[0].to_string();
        if params.iter().any(|p| p.pattern == pattern) {
            continue;
        }

        let param = if let Some(name) = caps.get(1) {
            // [[...name]]
            PathParam::new(name.as_str(), pattern, false)
        } else {
            let catch_all = caps.get(2).is_some();
            let name = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            PathParam::new(name, pattern, !catch_all)
        };
        params.push(param);
    }

    params
}

/// Encode a path parameter value. Slashes survive so catch-all values can
/// span several segments.
fn encode_path_value(value: &str) -> String {
    value
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Byte ranges of every placeholder in `template`, left to right.
///
/// Where a colon and a bracket match overlap, the earlier one wins.
fn placeholder_spans(template: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = colon_param_re()
        .find_iter(template)
        .chain(bracket_param_re().find_iter(template))
        .map(|m| m.range())
        .collect();
    spans.sort_by_key(|r| r.start);

    let mut kept: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        if kept.last().map_or(true, |last| span.start >= last.end) {
            kept.push(span);
        }
    }
    kept
}

/// Substitute filled path parameters into a template.
///
/// Each placeholder occurrence is replaced by its own parameter's value in a
/// single pass, so `:team` never touches `:teamId` and substituted values
/// are never rescanned. Parameters with an empty value are left as their
/// literal placeholder so the user can see what remains to fill.
pub fn substitute_path_params(base_path: &str, path_params: &[PathParam]) -> String {
    let mut path = String::with_capacity(base_path.len());
    let mut cursor = 0;

    for span in placeholder_spans(base_path) {
        let pattern = &base_path[span.clone()];
        path.push_str(&base_path[cursor..span.start]);
        match path_params
            .iter()
            .find(|p| p.pattern == pattern && !p.value.is_empty())
        {
            Some(param) => path.push_str(&encode_path_value(&param.value)),
            None => path.push_str(pattern),
        }
        cursor = span.end;
    }

    path.push_str(&base_path[cursor..]);
    path
}

/// Serialize the active query rows into a query string without the leading `?`.
///
/// Only enabled rows with a non-empty key and value are included. Repeated
/// keys are kept as repeated parameters.
pub fn build_query_string(query_params: &[KeyValuePair]) -> String {
    query_params
        .iter()
        .filter(|p| p.is_active())
        .map(|p| {
            format!(
                "{}={}",
                urlencoding::encode(&p.key),
                urlencoding::encode(&p.value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Build a request URL from a route template, path parameters and query rows.
///
/// # Examples
/// ```
/// use api_explorer::types::PathParam;
/// use api_explorer::url_params::build_url;
///
/// let id = PathParam::new("id", "[id]", true).with_value("42");
/// assert_eq!(build_url("/api/v1/users/[id]", &[id], &[]), "/api/v1/users/42");
/// ```
pub fn build_url(base_path: &str, path_params: &[PathParam], query_params: &[KeyValuePair]) -> String {
    let path = substitute_path_params(base_path, path_params);
    let query = build_query_string(query_params);

    if query.is_empty() {
        path
    } else if path.contains('?') {
        format!("{}&{}", path, query)
    } else {
        format!("{}?{}", path, query)
    }
}

/// Join a configured base URL and a request path.
///
/// Absolute URLs are returned untouched.
pub fn resolve_against_base(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || base_url.is_empty() {
        return path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Extract the base URL (without query string) from a URL string.
///
/// # Examples
/// ```
/// use api_explorer::url_params::extract_base_url;
///
/// assert_eq!(extract_base_url("https://example.com/api?foo=bar"), "https://example.com/api");
/// assert_eq!(extract_base_url("https://example.com/api"), "https://example.com/api");
/// assert_eq!(extract_base_url(""), "");
/// ```
pub fn extract_base_url(url: &str) -> &str {
    if let Some(pos) = url.find('?') {
        &url[..pos]
    } else {
        url
    }
}

/// Parse query parameters from a URL string.
///
/// Returns a list of (key, value) pairs. Works on absolute URLs as well as
/// bare paths such as `/api/items?q=1`.
pub fn parse_query_params(url: &str) -> Vec<(String, String)> {
    if url.is_empty() {
        return Vec::new();
    }

    if let Ok(parsed_url) = Url::parse(url) {
        return parsed_url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
    }

    // Not an absolute URL, split the query string by hand
    let Some(query_start) = url.find('?') else {
        return Vec::new();
    };

    let decode = |s: &str| {
        urlencoding::decode(&s.replace('+', " "))
            .map(|s| s.to_string())
            .unwrap_or_default()
    };

    url[query_start + 1..]
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = match pair.find('=') {
                Some(eq_pos) => (decode(&pair[..eq_pos]), decode(&pair[eq_pos + 1..])),
                None => (decode(pair), String::new()),
            };
            (!key.is_empty()).then_some((key, value))
        })
        .collect()
}

/// Turn a pasted URL into editor query rows, all enabled.
pub fn query_rows_from_url(url: &str) -> Vec<KeyValuePair> {
    parse_query_params(url)
        .into_iter()
        .map(|(k, v)| KeyValuePair::new(k, v))
        .collect()
}

/// Compare two lists of query parameters (ignoring empty entries).
///
/// Returns true if the params are equivalent (same keys and values in order).
pub fn params_equal(params1: &[(String, String)], params2: &[(String, String)]) -> bool {
    let filtered1: Vec<_> = params1
        .iter()
        .filter(|(k, v)| !k.is_empty() || !v.is_empty())
        .collect();
    let filtered2: Vec<_> = params2
        .iter()
        .filter(|(k, v)| !k.is_empty() || !v.is_empty())
        .collect();

    filtered1 == filtered2
}
