//! Optional link on the summary line, shortened when a shortener is set.
//!
//! Shortening never fails a delivery: any error falls back to the long URL.

use reqwest::{Client, StatusCode, header::LOCATION, redirect::Policy};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LinkConfig;
use crate::push::PushEvent;

#[derive(Debug, Clone)]
pub struct Linker {
    enabled: bool,
    shortener: Option<Shortener>,
}

#[derive(Debug, Clone)]
struct Shortener {
    endpoint: String,
    client: Client,
}

impl Linker {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            shortener: None,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let shortener = config.shortener.as_ref().and_then(|endpoint| {
            // The short URL comes back in a redirect's Location header.
            match Client::builder()
                .redirect(Policy::none())
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
            {
                Ok(client) => Some(Shortener {
                    endpoint: endpoint.clone(),
                    client,
                }),
                Err(e) => {
                    warn!("Could not build shortener client, links stay long: {}", e);
                    None
                }
            }
        });

        Self {
            enabled: true,
            shortener,
        }
    }

    /// Appends the event's link to the summary line, if enabled and known.
    pub async fn decorate(&self, event: &PushEvent, lines: &mut [String]) {
        if !self.enabled {
            return;
        }
        let (Some(long_url), Some(summary)) = (event.link.as_deref(), lines.first_mut()) else {
            return;
        };

        let url = match &self.shortener {
            Some(shortener) => shortener.shorten(long_url).await,
            None => long_url.to_string(),
        };
        summary.push(' ');
        summary.push_str(&url);
    }
}

impl Shortener {
    async fn shorten(&self, long_url: &str) -> String {
        let response = match self
            .client
            .post(&self.endpoint)
            .form(&[("url", long_url)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %long_url, "URL shortener request failed: {}", e);
                return long_url.to_string();
            }
        };

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        match location {
            Some(short) if status.is_redirection() || status == StatusCode::CREATED => {
                short.to_string()
            }
            _ => {
                debug!(url = %long_url, status = %status, "URL shortener gave no location");
                long_url.to_string()
            }
        }
    }
}
