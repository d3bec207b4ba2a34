//! Shared HTTP plumbing for OpenAI-compatible APIs.

use secrecy::{ExposeSecret, Secret};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: Secret<String>,
    base_url: String,
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// Resolve `path` (e.g. `embeddings`, `chat/completions`) against a base url
/// that may or may not already carry a `/v1`-style suffix.
fn endpoint(base_url: &str, path: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with(&format!("/{path}")) {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/{path}");
    }
    format!("{normalized}/v1/{path}")
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Secret::new(api_key),
            base_url: normalize_base_url(base_url.unwrap_or(DEFAULT_BASE_URL)),
        }
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = endpoint(&self.base_url, path);
        log::debug!("POST {url}");
        self.client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenAiClient {{ base_url: {:?}, api_key: [REDACTED] }}", self.base_url)
    }
}
