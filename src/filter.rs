//! The request filter chain.
//!
//! # How stages compose
//!
//! A [`Filter`] is one named stage in an ordered chain. Each stage receives
//! the per-request [`FilterContext`] and a [`Next`] handle covering the rest
//! of the chain plus the terminal dispatch. A stage may:
//!
//! - short-circuit by returning a [`Response`] without calling
//!   [`Next::run`] — later stages and the backend never execute;
//! - call [`Next::run`] and inspect or replace the resulting response;
//! - call [`Next::run`] and pass the response through untouched.
//!
//! Stages run strictly in the order they were registered with
//! [`FilterChain::stage`]. The response travels back through the chain as
//! the return value, so an early stage observes the final response even when
//! a later stage short-circuited.
//!
//! Each request gets its own `FilterContext`; stages hold no mutable state of
//! their own, so concurrent requests never interact inside the chain.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::trace;

use crate::request::Request;
use crate::response::Response;

/// A heap-allocated, type-erased future resolving to a [`Response`].
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = Response> + Send + 'a>>;

/// Per-request state carried through the chain.
///
/// Owns the [`Request`] and a string key-value side-channel that lets an
/// early stage hand data (the resolved subject, for one) to later stages and
/// the terminal dispatch. Created by the gateway, dropped once the response
/// has been written.
pub struct FilterContext {
    request: Request,
    values: HashMap<String, String>,
}

impl FilterContext {
    pub fn new(request: Request) -> Self {
        Self { request, values: HashMap::new() }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Stores a value in the side-channel, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// One stage in the chain.
pub trait Filter: Send + Sync + 'static {
    /// Stage name, logged by [`Next::run`] as each stage is entered.
    fn name(&self) -> &'static str;

    /// Processes the request, either short-circuiting with a response or
    /// delegating to `next`.
    fn handle<'a>(&'a self, ctx: &'a mut FilterContext, next: Next<'a>) -> BoxFuture<'a>;
}

/// The terminal stage a chain bottoms out in once every filter has passed —
/// for the gateway, the breaker-guarded backend dispatch.
pub trait Terminal: Send + Sync {
    fn dispatch<'c>(&'c self, ctx: &'c mut FilterContext) -> BoxFuture<'c>;
}

/// An ordered, immutable sequence of stages. Built once at startup and
/// shared across all requests.
pub struct FilterChain {
    stages: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage. Registration order is execution order.
    pub fn stage(mut self, filter: impl Filter) -> Self {
        self.stages.push(Arc::new(filter));
        self
    }

    /// Runs the chain for one request, ending in `terminal` if no stage
    /// short-circuits.
    pub async fn run(&self, ctx: &mut FilterContext, terminal: &dyn Terminal) -> Response {
        Next { stages: &self.stages, index: 0, terminal }.run(ctx).await
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle on the remainder of the chain. Consumed by [`Next::run`]; a stage
/// that drops it short-circuits everything after itself.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Filter>],
    index: usize,
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    /// Invokes the next stage, or the terminal dispatch once the chain is
    /// exhausted.
    pub fn run<'c>(mut self, ctx: &'c mut FilterContext) -> BoxFuture<'c>
    where
        'a: 'c,
    {
        Box::pin(async move {
            let stages = self.stages;
            match stages.get(self.index) {
                Some(stage) => {
                    self.index += 1;
                    trace!(stage = stage.name(), "entering filter stage");
                    stage.handle(ctx, self).await
                }
                None => self.terminal.dispatch(ctx).await,
            }
        })
    }
}
