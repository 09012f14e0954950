//! Webhook handler for push notifications

use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::SharedState;
use crate::dispatch::dispatch;
use crate::provider::{self, WebhookPayload};
use crate::push::PushEvent;
use crate::render::render_lines;
use crate::targets::Target;

/// Everything one webhook route needs, built once per target.
pub struct TargetHandler {
    pub target: Arc<Target>,
    pub state: SharedState,
}

/// Handles a POST to a target path.
///
/// Anything that is not a usable push answers 204 without detail; pushes
/// answer 202 and are delivered on a background task.
pub async fn handle_webhook(
    AxumState(handler): AxumState<Arc<TargetHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let target = &handler.target;

    let payload = match provider::parse(&headers, &body, &target.secret) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(path = %target.path, "Could not parse webhook payload: {}", e);
            return StatusCode::NO_CONTENT;
        }
    };

    let event = match payload {
        WebhookPayload::GithubPush(push) => PushEvent::from_github(&push),
        WebhookPayload::GitlabPush(push) => PushEvent::from_gitlab(&push),
        WebhookPayload::Ping(ping) => {
            info!(path = %target.path, hook_id = ?ping.hook_id, zen = ?ping.zen, "Pinged");
            return StatusCode::NO_CONTENT;
        }
        WebhookPayload::Unrecognized => {
            info!(path = %target.path, "Webhooked from neither GitHub nor GitLab, ignoring");
            return StatusCode::NO_CONTENT;
        }
    };
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            warn!(path = %target.path, "Rejecting push payload: {}", e);
            return StatusCode::NO_CONTENT;
        }
    };

    let delivery = Uuid::now_v7();
    let mut lines = render_lines(&event);
    info!(
        delivery = %delivery,
        path = %target.path,
        destination = %target.destination,
        channel = %target.channel,
        repo = %event.repo_full_name,
        branch = %event.branch,
        "Push received"
    );
    for line in &lines {
        debug!(delivery = %delivery, "  {}", line);
    }

    let span = info_span!("delivery", id = %delivery);
    tokio::spawn(
        async move {
            let state = &handler.state;
            state.linker.decorate(&event, &mut lines).await;
            dispatch(&state.destinations, &handler.target, &lines).await;
        }
        .instrument(span),
    );

    StatusCode::ACCEPTED
}
