//! # torii
//!
//! A minimal edge gateway. Authentication and fault isolation before a
//! request ever reaches a backend. Nothing more. Nothing less.
//!
//! ## The pipeline
//!
//! ```text
//! inbound request
//!   → FilterChain      tracking pre-event, then JWT authorization
//!   → CircuitBreaker   per-route permit check
//!   → backend dispatch bounded by a timeout
//!   ← response         tracking post-event on the way out
//! ```
//!
//! Any stage can end the request early: a missing or invalid credential is a
//! `401`, an unmatched path is a `404`, and a refused permit, a failed call,
//! or a timeout all produce the route's fallback response. The fallback is a
//! *normal* `200` with an apology body — from the client's point of view the
//! gateway always answers; it never propagates a raw backend failure.
//!
//! What the surrounding infrastructure owns — torii intentionally ignores:
//!
//! - **TLS termination** — the ingress in front of the gateway
//! - **Rate limiting** — same
//! - **Service discovery** — the route table is static configuration
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use torii::{
//!     AuthorizationFilter, BreakerConfig, BreakerRegistry, FilterChain, GatewayRouter,
//!     HttpBackend, Route, RouteTable, Server, TokenValidator, TrackerConfig, TrackingFilter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), torii::Error> {
//!     let validator = TokenValidator::new("c2VjcmV0")?;
//!     let chain = FilterChain::new()
//!         .stage(TrackingFilter::new(TrackerConfig::default()))
//!         .stage(AuthorizationFilter::new(validator));
//!
//!     let routes = RouteTable::new(vec![Route {
//!         id: "catalog".into(),
//!         pattern: "/catalog-service/{*rest}".into(),
//!         backend: "http://127.0.0.1:8081".into(),
//!         fallback_message: "The catalog service is temporarily unavailable.".into(),
//!     }])?;
//!
//!     let gateway = GatewayRouter::new(
//!         routes,
//!         chain,
//!         BreakerRegistry::new(BreakerConfig::default()),
//!         Arc::new(HttpBackend::new()),
//!     );
//!
//!     Server::bind("0.0.0.0:8000".parse().unwrap()).serve(gateway).await
//! }
//! ```

mod auth;
mod backend;
mod breaker;
mod config;
mod error;
mod filter;
mod gateway;
mod request;
mod response;
mod route;
mod server;
mod token;
mod track;

pub use auth::{AuthorizationFilter, SUBJECT_KEY};
pub use backend::{Backend, BackendError, BoxBackendFuture, HttpBackend};
pub use breaker::{
    BreakerConfig, BreakerOpen, BreakerRegistry, BreakerState, CircuitBreaker, Outcome, Permit,
};
pub use config::{BreakerSettings, GatewayConfig, RouteSettings, TrackerSettings};
pub use error::Error;
pub use filter::{BoxFuture, Filter, FilterChain, FilterContext, Next, Terminal};
pub use gateway::GatewayRouter;
pub use request::Request;
pub use response::{Response, ResponseBuilder};
pub use route::{Route, RouteTable};
pub use server::Server;
pub use token::{Claims, InvalidToken, TokenValidator};
pub use track::{TrackerConfig, TrackingFilter};
