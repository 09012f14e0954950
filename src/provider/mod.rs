//! Provider payload parsing
//!
//! Classifies an inbound request by provider header, verifies it against
//! the target secret and decodes it into a typed payload.

pub mod github;
pub mod gitlab;

use axum::http::HeaderMap;

use crate::error::PayloadError;
use github::{GithubPingPayload, GithubPushPayload};
use gitlab::GitlabPushPayload;

pub const GITHUB_EVENT_HEADER: &str = "X-GitHub-Event";
pub const GITLAB_EVENT_HEADER: &str = "X-Gitlab-Event";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Github,
    Gitlab,
    Unrecognized,
}

impl Provider {
    /// Header presence decides; GitHub wins if both are set.
    pub fn classify(headers: &HeaderMap) -> Self {
        if headers.contains_key(GITHUB_EVENT_HEADER) {
            Provider::Github
        } else if headers.contains_key(GITLAB_EVENT_HEADER) {
            Provider::Gitlab
        } else {
            Provider::Unrecognized
        }
    }
}

/// A decoded webhook body
#[derive(Debug)]
pub enum WebhookPayload {
    GithubPush(Box<GithubPushPayload>),
    GitlabPush(Box<GitlabPushPayload>),
    Ping(GithubPingPayload),
    Unrecognized,
}

/// Verify and decode a request for a target with the given secret.
pub fn parse(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
) -> Result<WebhookPayload, PayloadError> {
    match Provider::classify(headers) {
        Provider::Github => github::parse(headers, body, secret),
        Provider::Gitlab => gitlab::parse(headers, body, secret),
        Provider::Unrecognized => Ok(WebhookPayload::Unrecognized),
    }
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Compare two byte strings without short-circuiting on the first difference.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
