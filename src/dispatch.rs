//! Delivers rendered lines to a target's session and channel.
//!
//! Delivery is best effort: every precondition failure drops the whole
//! notification with a log line, and nothing is returned as an error.

use std::fmt;
use tracing::{debug, info, warn};

use crate::session::DestinationRegistry;
use crate::targets::Target;

/// Why a notification was dropped before sending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMiss {
    DestinationNotFound,
    NotConnected,
    NotInChannel,
}

impl fmt::Display for RoutingMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMiss::DestinationNotFound => write!(f, "destination not found"),
            RoutingMiss::NotConnected => write!(f, "not connected"),
            RoutingMiss::NotInChannel => write!(f, "not a member of channel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { sent: usize, failed: usize },
    Dropped(RoutingMiss),
}

pub async fn dispatch(
    registry: &DestinationRegistry,
    target: &Target,
    lines: &[String],
) -> DispatchOutcome {
    let Some(session) = registry.get(&target.destination) else {
        return dropped(target, RoutingMiss::DestinationNotFound);
    };
    if !session.is_connected() {
        return dropped(target, RoutingMiss::NotConnected);
    }
    if !session.member_channels().contains(&target.channel) {
        return dropped(target, RoutingMiss::NotInChannel);
    }

    let mut sent = 0;
    let mut failed = 0;
    for line in lines {
        match session.send_message(&target.channel, line).await {
            Ok(()) => {
                debug!(destination = %target.destination, channel = %target.channel, "  {}", line);
                sent += 1;
            }
            Err(e) => {
                warn!(
                    path = %target.path,
                    destination = %target.destination,
                    channel = %target.channel,
                    error = %e,
                    "Failed to send line"
                );
                failed += 1;
            }
        }
    }

    info!(
        path = %target.path,
        destination = %target.destination,
        channel = %target.channel,
        sent,
        failed,
        "Notification delivered"
    );
    DispatchOutcome::Delivered { sent, failed }
}

fn dropped(target: &Target, reason: RoutingMiss) -> DispatchOutcome {
    warn!(
        path = %target.path,
        destination = %target.destination,
        channel = %target.channel,
        reason = %reason,
        "Dropping notification"
    );
    DispatchOutcome::Dropped(reason)
}
