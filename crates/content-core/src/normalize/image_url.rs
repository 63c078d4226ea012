use crate::config::ApiConfig;

/// Authority markers of known-misconfigured hosts whose URLs must be
/// re-rooted on the configured origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadHostPolicy {
    markers: Vec<String>,
}

/// Port the API was once published on by mistake.
pub const LEGACY_BAD_PORT: &str = ":8082";

impl Default for BadHostPolicy {
    fn default() -> Self {
        Self::new(vec![LEGACY_BAD_PORT.to_string()])
    }
}

impl BadHostPolicy {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    pub fn none() -> Self {
        Self {
            markers: Vec::new(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn matches(&self, authority: &str) -> bool {
        self.markers.iter().any(|m| authority.contains(m.as_str()))
    }
}

const API_SEGMENT: &str = "/api/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrlNormalizer {
    origin: String,
    bad_hosts: BadHostPolicy,
}

impl ImageUrlNormalizer {
    /// `origin` is used verbatim apart from trailing slashes; validation
    /// happens in [`ApiConfig`].
    pub fn new(origin: impl Into<String>, bad_hosts: BadHostPolicy) -> Self {
        let origin: String = origin.into();
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            bad_hosts,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.origin(), config.bad_hosts().clone())
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn bad_hosts(&self) -> &BadHostPolicy {
        &self.bad_hosts
    }

    /// Canonical display form of an image reference: relative paths are
    /// rooted on the origin, bad-host URLs are re-rooted, everything else
    /// absolute is returned as-is.
    pub fn normalize(&self, url: &str) -> String {
        let url = url.trim();
        if url.is_empty() {
            return url.to_string();
        }
        if let Some(authority) = absolute_authority(url) {
            if self.bad_hosts.matches(authority) {
                if let Some((_, rest)) = url.split_once(API_SEGMENT) {
                    let fixed = format!("{}{}{}", self.origin, API_SEGMENT, rest);
                    tracing::debug!(from = url, to = %fixed, "re-rooted bad-host image url");
                    return fixed;
                }
            }
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            format!("{}/{}", self.origin, url)
        }
    }

    /// Form persisted in storage: relative path for images served from the
    /// origin, the absolute URL otherwise.
    pub fn to_storage(&self, url: &str) -> String {
        let absolute = self.normalize(url);
        match self.strip_origin(&absolute) {
            Some(relative) => relative,
            None => absolute,
        }
    }

    fn strip_origin(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(self.origin.as_str())?;
        if rest.is_empty() {
            return Some("/".to_string());
        }
        match rest.as_bytes()[0] {
            b'/' => Some(rest.to_string()),
            b'?' | b'#' => Some(format!("/{}", rest)),
            _ => None,
        }
    }
}

/// Returns the authority of an absolute or protocol-relative URL, or `None`
/// for relative paths. Opaque URIs (`data:`, `blob:`) report an empty
/// authority.
fn absolute_authority(url: &str) -> Option<&str> {
    if let Some(rest) = url.strip_prefix("//") {
        return Some(authority_of(rest));
    }
    let scheme_end = url.find(':')?;
    let scheme = &url[..scheme_end];
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return None;
    }
    let rest = &url[scheme_end + 1..];
    Some(rest.strip_prefix("//").map(authority_of).unwrap_or(""))
}

fn authority_of(rest: &str) -> &str {
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}
