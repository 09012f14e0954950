//! GitHub webhook payloads

use axum::http::HeaderMap;
use hex::decode as hex_decode;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use super::{GITHUB_EVENT_HEADER, WebhookPayload, header_str};
use crate::error::PayloadError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Clone, Deserialize)]
pub struct GithubPushPayload {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    pub compare: Option<String>,
    #[serde(default)]
    pub forced: bool,
    pub repository: GithubRepository,
    pub pusher: GithubPusher,
    #[serde(default)]
    pub commits: Vec<GithubCommit>,
    pub head_commit: Option<GithubCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepository {
    pub name: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubPusher {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommit {
    pub id: String,
    pub message: String,
    pub url: Option<String>,
    pub committer: GithubCommitUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommitUser {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubPingPayload {
    pub zen: Option<String>,
    pub hook_id: Option<u64>,
}

/// Hex HMAC-SHA256 of `payload`, as GitHub sends it after the `sha256=` prefix.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a `sha256=<hex>` signature header against the payload.
pub fn verify_signature(secret: &str, payload: &[u8], signature_header: &str) -> bool {
    let Some(git_signature) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(git_signature_bytes) = hex_decode(git_signature) else {
        debug!("Signature header is not valid hex");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    // verify_slice compares in constant time
    mac.verify_slice(&git_signature_bytes).is_ok()
}

pub(super) fn parse(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
) -> Result<WebhookPayload, PayloadError> {
    if !secret.is_empty() {
        let signature =
            header_str(headers, SIGNATURE_HEADER).ok_or(PayloadError::MissingSignature)?;
        if !verify_signature(secret, body, signature) {
            return Err(PayloadError::InvalidSignature);
        }
    }

    let event = header_str(headers, GITHUB_EVENT_HEADER).unwrap_or_default();
    match event {
        "push" => Ok(WebhookPayload::GithubPush(Box::new(serde_json::from_slice(
            body,
        )?))),
        "ping" => Ok(WebhookPayload::Ping(serde_json::from_slice(body)?)),
        other => Err(PayloadError::UnsupportedEvent(other.to_string())),
    }
}
