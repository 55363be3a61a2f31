//! Tracking stage.
//!
//! Purely observational bookends around the rest of the chain. A tracking
//! problem must never block a request, so this stage always calls `next` and
//! never touches the request or the response.

use tracing::info;

use crate::filter::{BoxFuture, Filter, FilterContext, Next};

/// Toggles for the tracking stage.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Logged on every request.
    pub base_message: String,
    /// Emit an event before the rest of the chain runs.
    pub pre_logger: bool,
    /// Emit an event once the response is known.
    pub post_logger: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_message: "torii tracker".to_owned(),
            pre_logger: true,
            post_logger: true,
        }
    }
}

/// Chain stage recording pre and post events for every request.
pub struct TrackingFilter {
    config: TrackerConfig,
}

impl TrackingFilter {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }
}

impl Filter for TrackingFilter {
    fn name(&self) -> &'static str {
        "tracker"
    }

    fn handle<'a>(&'a self, ctx: &'a mut FilterContext, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            info!("tracker base message: {}", self.config.base_message);

            if self.config.pre_logger {
                info!(request_id = %ctx.request().id(), "tracker start");
            }

            let response = next.run(ctx).await;

            if self.config.post_logger {
                info!(
                    request_id = %ctx.request().id(),
                    status = %response.status_code(),
                    "tracker end"
                );
            }

            response
        })
    }
}
