//! Cache-busting query parameter for visitors who must bypass the edge cache.
//!
//! Rewriting works on the raw string instead of a parsed `Url` so relative
//! links survive and the rest of the query keeps its original encoding.

use std::borrow::Cow;

use time::OffsetDateTime;
use url::form_urlencoded;
use uuid::Uuid;

use super::error::DomainError;

pub const DEFAULT_PARAM_NAME: &str = "nocache";

const RESERVED_NAME_CHARS: &[char] = &['&', '=', '#', '?', '/', ' '];

/// How long one cache-bust token stays in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPolicy {
    /// One token for the lifetime of the process.
    #[default]
    PerProcess,
    /// A new token for every render.
    PerRender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoCacheConfig {
    pub enabled: bool,
    pub param_name: String,
    pub param_value: String,
}

impl NoCacheConfig {
    pub fn new(enabled: bool, param_name: impl Into<String>, param_value: impl Into<String>) -> Self {
        Self {
            enabled,
            param_name: param_name.into(),
            param_value: param_value.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, DEFAULT_PARAM_NAME, String::new())
    }
}

/// Token fixed at process start: the current Unix time in seconds.
pub fn process_token() -> String {
    OffsetDateTime::now_utc().unix_timestamp().to_string()
}

/// Token unique to one render.
pub fn render_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn validate_param_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::missing("nocache.param_name"));
    }
    if name.contains(RESERVED_NAME_CHARS) {
        return Err(DomainError::validation(format!(
            "query parameter name `{name}` contains a reserved character"
        )));
    }
    Ok(())
}

/// Set `param_name=param_value` on `url`, replacing an existing value in place.
pub fn rewrite(url: &str, cfg: &NoCacheConfig) -> String {
    if !cfg.enabled {
        return url.to_string();
    }

    let parts = UrlParts::split(url);
    let pair = encode_pair(&cfg.param_name, &cfg.param_value);

    let mut replaced = false;
    let mut segments: Vec<Cow<'_, str>> = Vec::new();
    for segment in parts.segments() {
        if segment_key(segment) == cfg.param_name {
            if !replaced {
                segments.push(Cow::Owned(pair.clone()));
                replaced = true;
            }
        } else {
            segments.push(Cow::Borrowed(segment));
        }
    }
    if !replaced {
        segments.push(Cow::Owned(pair));
    }

    parts.join(&segments)
}

/// Remove every occurrence of `param_name` from the query of `url`.
pub fn strip_nocache_param(url: &str, param_name: &str) -> String {
    let parts = UrlParts::split(url);
    if !parts.segments().any(|segment| segment_key(segment) == param_name) {
        return url.to_string();
    }

    let segments: Vec<&str> = parts
        .segments()
        .filter(|segment| segment_key(segment) != param_name)
        .collect();
    parts.join(&segments)
}

/// Move a cache-bust parameter wedged into a feed path to the end of the link.
///
/// Feed links are composed as `permalink + "/" + "feed/"`; when the permalink
/// already carries `?nocache=<token>` the parameter ends up mid-path, e.g.
/// `https://ex.com/post/?nocache=123/feed/`. Only the first such occurrence is
/// relocated; anything else is returned untouched.
pub fn fix_feed_ordering(content: &str, param_name: &str) -> String {
    let needle = format!("?{param_name}=");
    let mut search_from = 0;

    while let Some(offset) = content[search_from..].find(&needle) {
        let start = search_from + offset;
        let token_start = start + needle.len();
        let token_len = content[token_start..]
            .bytes()
            .take_while(|byte| is_token_byte(*byte))
            .count();
        let token_end = token_start + token_len;

        if token_len > 0 && content[token_end..].starts_with('/') {
            let token = &content[token_start..token_end];
            let remaining = format!("{}{}", &content[..start], &content[token_end + 1..]);
            return append_param(&remaining, param_name, token);
        }

        search_from = token_start;
    }

    content.to_string()
}

/// [`fix_feed_ordering`] for one render: the active token is relocated even
/// when it falls outside the feed token charset.
pub fn fix_feed_ordering_for(content: &str, cfg: &NoCacheConfig) -> String {
    let wedged = format!("?{}/", encode_pair(&cfg.param_name, &cfg.param_value));
    match content.find(&wedged) {
        Some(start) => {
            let remaining = format!("{}{}", &content[..start], &content[start + wedged.len()..]);
            append_segment(&remaining, &wedged[1..wedged.len() - 1])
        }
        None => fix_feed_ordering(content, &cfg.param_name),
    }
}

fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_digit() || byte.is_ascii_lowercase() || byte == b'_' || byte == b'-'
}

fn append_param(content: &str, param_name: &str, token: &str) -> String {
    append_segment(content, &format!("{param_name}={token}"))
}

fn append_segment(content: &str, segment: &str) -> String {
    let (head, fragment) = match content.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (content, None),
    };
    let separator = if head.contains('?') { '&' } else { '?' };

    let mut out = String::with_capacity(content.len() + segment.len() + 1);
    out.push_str(head);
    out.push(separator);
    out.push_str(segment);
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn encode_pair(name: &str, value: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(name, value)
        .finish()
}

fn segment_key(segment: &str) -> Cow<'_, str> {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(key, _)| key)
        .unwrap_or_default()
}

struct UrlParts<'a> {
    base: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    fn split(url: &'a str) -> Self {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (url, None),
        };
        let (base, query) = match rest.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (rest, None),
        };
        Self {
            base,
            query,
            fragment,
        }
    }

    fn segments(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.query
            .unwrap_or_default()
            .split('&')
            .filter(|segment| !segment.is_empty())
    }

    fn join<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut out = String::from(self.base);
        for (index, segment) in segments.iter().enumerate() {
            out.push(if index == 0 { '?' } else { '&' });
            out.push_str(segment.as_ref());
        }
        if let Some(fragment) = self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(value: &str) -> NoCacheConfig {
        NoCacheConfig::new(true, DEFAULT_PARAM_NAME, value)
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        let query = UrlParts::split(url).query.unwrap_or_default();
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    const SAMPLES: &[&str] = &[
        "https://ex.com/",
        "https://ex.com/post/",
        "https://ex.com/?p=12",
        "https://ex.com/?p=12&lang=fr#comments",
        "https://ex.com/search/?q=a%20b&page=2",
        "https://ex.com/?nocache=old&p=3",
        "/relative/path?x=1",
    ];

    #[test]
    fn disabled_config_leaves_urls_alone() {
        let cfg = NoCacheConfig::disabled();
        for url in SAMPLES {
            assert_eq!(rewrite(url, &cfg), *url);
        }
    }

    #[test]
    fn appends_parameter_to_plain_and_query_urls() {
        let cfg = enabled("1700000000");
        assert_eq!(
            rewrite("https://ex.com/post/", &cfg),
            "https://ex.com/post/?nocache=1700000000"
        );
        assert_eq!(
            rewrite("https://ex.com/?p=12&lang=fr#comments", &cfg),
            "https://ex.com/?p=12&lang=fr&nocache=1700000000#comments"
        );
    }

    #[test]
    fn existing_key_is_replaced_in_place() {
        let cfg = enabled("new");
        assert_eq!(
            rewrite("https://ex.com/?nocache=old&p=3&nocache=older", &cfg),
            "https://ex.com/?nocache=new&p=3"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let cfg = enabled("abc");
        for url in SAMPLES {
            let once = rewrite(url, &cfg);
            assert_eq!(rewrite(&once, &cfg), once, "url: {url}");
        }
    }

    #[test]
    fn strip_undoes_rewrite() {
        let cfg = enabled("abc");
        for url in SAMPLES {
            let stripped = strip_nocache_param(&rewrite(url, &cfg), DEFAULT_PARAM_NAME);
            let expected: Vec<_> = query_pairs(url)
                .into_iter()
                .filter(|(key, _)| key != DEFAULT_PARAM_NAME)
                .collect();
            assert_eq!(query_pairs(&stripped), expected, "url: {url}");
        }
    }

    #[test]
    fn strip_without_parameter_returns_input() {
        let url = "https://ex.com/?a=1&&b=2";
        assert_eq!(strip_nocache_param(url, DEFAULT_PARAM_NAME), url);
    }

    #[test]
    fn strip_drops_empty_query() {
        assert_eq!(
            strip_nocache_param("https://ex.com/post/?nocache=1#top", DEFAULT_PARAM_NAME),
            "https://ex.com/post/#top"
        );
    }

    #[test]
    fn value_is_form_encoded() {
        let cfg = NoCacheConfig::new(true, "bust", "a b&c");
        assert_eq!(rewrite("/x", &cfg), "/x?bust=a+b%26c");
    }

    #[test]
    fn feed_fix_moves_trailing_parameter() {
        assert_eq!(
            fix_feed_ordering("https://ex.com/comments/feed/?nocache=abc/", "nocache"),
            "https://ex.com/comments/feed/?nocache=abc"
        );
    }

    #[test]
    fn feed_fix_moves_parameter_out_of_the_path() {
        assert_eq!(
            fix_feed_ordering("https://ex.com/post/?nocache=1700000000/feed/", "nocache"),
            "https://ex.com/post/feed/?nocache=1700000000"
        );
    }

    #[test]
    fn feed_fix_merges_into_existing_query() {
        assert_eq!(
            fix_feed_ordering("https://ex.com/post/?nocache=a_1/feed/?lang=fr", "nocache"),
            "https://ex.com/post/feed/?lang=fr&nocache=a_1"
        );
    }

    #[test]
    fn feed_fix_ignores_well_formed_links() {
        let content = "https://ex.com/post/feed/?nocache=abc";
        assert_eq!(fix_feed_ordering(content, "nocache"), content);
        let other = "https://ex.com/?other=abc/feed/";
        assert_eq!(fix_feed_ordering(other, "nocache"), other);
    }

    #[test]
    fn feed_fix_skips_tokens_outside_the_charset() {
        let content = "https://ex.com/?nocache=ABC/feed/";
        assert_eq!(fix_feed_ordering(content, "nocache"), content);
    }

    #[test]
    fn render_feed_fix_relocates_the_active_token() {
        let cfg = NoCacheConfig::new(true, DEFAULT_PARAM_NAME, "V2");
        assert_eq!(
            fix_feed_ordering_for("https://ex.com/post/?nocache=V2/feed/", &cfg),
            "https://ex.com/post/feed/?nocache=V2"
        );

        let cfg = NoCacheConfig::new(true, DEFAULT_PARAM_NAME, "v1.2");
        assert_eq!(
            fix_feed_ordering_for("https://ex.com/post/?nocache=v1.2/feed/?lang=fr", &cfg),
            "https://ex.com/post/feed/?lang=fr&nocache=v1.2"
        );
    }

    #[test]
    fn render_feed_fix_falls_back_to_charset_match() {
        let cfg = NoCacheConfig::new(true, DEFAULT_PARAM_NAME, "V2");
        assert_eq!(
            fix_feed_ordering_for("https://ex.com/post/?nocache=123/feed/", &cfg),
            "https://ex.com/post/feed/?nocache=123"
        );
    }

    #[test]
    fn param_names_are_validated() {
        assert!(validate_param_name("nocache").is_ok());
        assert!(validate_param_name("").is_err());
        assert!(validate_param_name("a=b").is_err());
    }

    #[test]
    fn tokens_fit_the_feed_charset() {
        for token in [process_token(), render_token()] {
            assert!(!token.is_empty());
            assert!(token.bytes().all(is_token_byte), "token: {token}");
        }
    }
}
