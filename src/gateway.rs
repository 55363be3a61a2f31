//! The gateway router.
//!
//! Composes the route table, the filter chain, the per-route breakers, and
//! backend dispatch into a single `route(Request) -> Response` hot path.
//! Every failure mode ends in a well-formed response: a 404 for an unmatched
//! path, a chain short-circuit, or the route's fallback when the breaker
//! refuses the call or the backend fails or times out. Breaker rejections
//! are observability events, never errors.

use std::sync::Arc;

use http::StatusCode;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::breaker::{BreakerRegistry, CircuitBreaker, Outcome};
use crate::filter::{BoxFuture, FilterChain, FilterContext, Terminal};
use crate::request::Request;
use crate::response::Response;
use crate::route::{Route, RouteTable};

pub struct GatewayRouter {
    routes: RouteTable,
    chain: FilterChain,
    breakers: BreakerRegistry,
    backend: Arc<dyn Backend>,
}

impl GatewayRouter {
    pub fn new(
        routes: RouteTable,
        chain: FilterChain,
        breakers: BreakerRegistry,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self { routes, chain, breakers, backend }
    }

    /// Routes one request to one response.
    pub async fn route(&self, request: Request) -> Response {
        let Some(route) = self.routes.lookup(request.path()) else {
            info!(path = %request.path(), "no route matched");
            return Response::status(StatusCode::NOT_FOUND);
        };

        let breaker = self.breakers.get(&route.id);
        let dispatch = Dispatch {
            route,
            breaker: &breaker,
            backend: self.backend.as_ref(),
        };

        let mut ctx = FilterContext::new(request);
        self.chain.run(&mut ctx, &dispatch).await
    }

    /// The breaker registry, exposed for administrative resets.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }
}

/// Terminal chain stage: breaker-guarded, timeout-bounded backend call.
struct Dispatch<'g> {
    route: &'g Route,
    breaker: &'g CircuitBreaker,
    backend: &'g dyn Backend,
}

impl Dispatch<'_> {
    /// The fallback is a normal response from the client's point of view:
    /// 200 with the route's apology body, never the backend's failure status.
    fn fallback(&self) -> Response {
        Response::text(self.route.fallback_message.clone())
    }
}

impl Terminal for Dispatch<'_> {
    fn dispatch<'c>(&'c self, ctx: &'c mut FilterContext) -> BoxFuture<'c> {
        Box::pin(async move {
            // The permit is held for the duration of the call; if this
            // future is dropped mid-dispatch, the permit's drop hands any
            // half-open trial slot back.
            let permit = match self.breaker.try_acquire() {
                Ok(permit) => permit,
                Err(_) => {
                    info!(route = %self.route.id, "breaker open, serving fallback");
                    return self.fallback();
                }
            };

            let timeout = self.breaker.config().call_timeout;
            let call = self.backend.dispatch(&self.route.backend, ctx.request());
            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(response)) => {
                    permit.record(Outcome::Success);
                    response
                }
                Ok(Err(error)) => {
                    warn!(route = %self.route.id, %error, "backend call failed, serving fallback");
                    permit.record(Outcome::Failure);
                    self.fallback()
                }
                // The in-flight call is dropped here; whatever the backend
                // eventually produces is discarded.
                Err(_elapsed) => {
                    warn!(route = %self.route.id, ?timeout, "backend call timed out, serving fallback");
                    permit.record(Outcome::Slow);
                    self.fallback()
                }
            }
        })
    }
}
