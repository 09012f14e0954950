//! GitLab webhook payloads

use axum::http::HeaderMap;
use serde::Deserialize;

use super::{GITLAB_EVENT_HEADER, WebhookPayload, constant_time_eq, header_str};
use crate::error::PayloadError;

pub const TOKEN_HEADER: &str = "X-Gitlab-Token";
const PUSH_EVENT: &str = "Push Hook";

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabPushPayload {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    pub user_name: String,
    pub project: GitlabProject,
    #[serde(default)]
    pub commits: Vec<GitlabCommit>,
    /// May exceed `commits.len()`; GitLab truncates the list on large pushes.
    #[serde(default)]
    pub total_commits_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabProject {
    pub name: String,
    pub path_with_namespace: String,
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabCommit {
    pub id: String,
    pub message: String,
    pub url: Option<String>,
    pub author: GitlabAuthor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabAuthor {
    pub name: String,
}

pub(super) fn parse(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
) -> Result<WebhookPayload, PayloadError> {
    if !secret.is_empty() {
        let token = header_str(headers, TOKEN_HEADER).unwrap_or_default();
        if !constant_time_eq(token.as_bytes(), secret.as_bytes()) {
            return Err(PayloadError::InvalidToken);
        }
    }

    let event = header_str(headers, GITLAB_EVENT_HEADER).unwrap_or_default();
    if event != PUSH_EVENT {
        return Err(PayloadError::UnsupportedEvent(event.to_string()));
    }
    Ok(WebhookPayload::GitlabPush(Box::new(serde_json::from_slice(
        body,
    )?)))
}
