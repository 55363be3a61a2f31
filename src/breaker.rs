//! Per-route circuit breaker.
//!
//! # States
//!
//! ```text
//! Closed    → Open:      failure-or-slow ratio over the rolling window
//!                        reaches the threshold (with at least
//!                        `minimum_calls` samples)
//! Open      → HalfOpen:  cooldown elapsed; next permit check admits trials
//! HalfOpen  → Closed:    a trial call succeeds; window resets
//! HalfOpen  → Open:      a trial call fails or runs slow; cooldown restarts
//! ```
//!
//! One breaker per route, created lazily by [`BreakerRegistry`] and kept for
//! the life of the process. All state sits behind a single mutex per breaker;
//! the critical sections are pure bookkeeping and the lock is never held
//! across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::info;

/// Breaker position in the state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// The outcome of one guarded call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    Failure,
    /// The call exceeded the dispatch timeout. Counts against the failure
    /// ratio like a failure.
    Slow,
}

/// A permit was refused because the breaker is open.
#[derive(Debug, Error)]
#[error("circuit breaker is open")]
pub struct BreakerOpen;

/// A live call slot handed out by [`CircuitBreaker::try_acquire`].
///
/// Consume it with [`Permit::record`] once the call's outcome is known.
/// Dropping it unrecorded — the request future was cancelled mid-call —
/// hands a half-open trial slot back, so an abandoned trial can never wedge
/// the breaker in `HalfOpen`.
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    recorded: bool,
}

impl Permit<'_> {
    /// Records the outcome of the permitted call.
    pub fn record(mut self, outcome: Outcome) {
        self.recorded = true;
        self.breaker.record(outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.release_trial();
        }
    }
}

/// Breaker tuning. The defaults mirror the deployment this gateway fronts:
/// trip at a 50% failure ratio over a 100-call window with at least 100
/// samples, hold open for 60s, admit 10 half-open trials, bound each
/// dispatched call at 4s.
#[derive(Clone, Debug)]
pub struct BreakerConfig {
    /// Failure-or-slow percentage at which a closed breaker opens.
    pub failure_rate_threshold: f64,
    /// Rolling window capacity, in call outcomes.
    pub window_size: usize,
    /// Samples required before the ratio is acted on.
    pub minimum_calls: usize,
    /// How long an open breaker rejects before admitting trials.
    pub cooldown: Duration,
    /// Concurrent trial calls admitted while half-open.
    pub half_open_calls: usize,
    /// Upper bound on each dispatched backend call.
    pub call_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            window_size: 100,
            minimum_calls: 100,
            cooldown: Duration::from_secs(60),
            half_open_calls: 10,
            call_timeout: Duration::from_secs(4),
        }
    }
}

struct Inner {
    state: BreakerState,
    window: VecDeque<Outcome>,
    opened_at: Option<Instant>,
    trials_in_flight: usize,
}

/// Failure tracker for one route.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                trials_in_flight: 0,
            }),
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Decides whether a call may be attempted right now.
    ///
    /// An open breaker whose cooldown has elapsed flips to half-open here and
    /// admits the caller as the first trial. The returned [`Permit`] must be
    /// consumed with [`Permit::record`]; dropping it releases the slot.
    pub fn try_acquire(&self) -> Result<Permit<'_>, BreakerOpen> {
        let mut inner = self.lock();
        let admitted = match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let cooled = inner
                    .opened_at
                    .is_none_or(|at| at.elapsed() >= self.config.cooldown);
                if cooled {
                    info!(breaker = %self.name, "circuit breaker half-open");
                    inner.state = BreakerState::HalfOpen;
                    inner.window.clear();
                    inner.trials_in_flight = 1;
                }
                cooled
            }
            BreakerState::HalfOpen => {
                let slot_free = inner.trials_in_flight < self.config.half_open_calls;
                if slot_free {
                    inner.trials_in_flight += 1;
                }
                slot_free
            }
        };

        if admitted {
            Ok(Permit { breaker: self, recorded: false })
        } else {
            Err(BreakerOpen)
        }
    }

    /// Returns a trial slot taken by a call that went away before its
    /// outcome could be recorded.
    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    /// Records the outcome of a permitted call.
    pub fn record(&self, outcome: Outcome) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.window.push_back(outcome);
                if inner.window.len() > self.config.window_size {
                    inner.window.pop_front();
                }
                if inner.window.len() >= self.config.minimum_calls
                    && failure_rate(&inner.window) >= self.config.failure_rate_threshold
                {
                    info!(breaker = %self.name, "circuit breaker opened");
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                match outcome {
                    Outcome::Success => {
                        info!(breaker = %self.name, "circuit breaker closed");
                        inner.state = BreakerState::Closed;
                        inner.window.clear();
                        inner.opened_at = None;
                        inner.trials_in_flight = 0;
                    }
                    Outcome::Failure | Outcome::Slow => {
                        info!(breaker = %self.name, "circuit breaker reopened");
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                        inner.trials_in_flight = 0;
                    }
                }
            }
            // A late result from a call permitted before the breaker opened.
            // The state machine already moved on; drop it.
            BreakerState::Open => {}
        }
    }

    /// Administrative reset back to closed with an empty window.
    pub fn reset(&self) {
        let mut inner = self.lock();
        info!(breaker = %self.name, "circuit breaker reset");
        inner.state = BreakerState::Closed;
        inner.window.clear();
        inner.opened_at = None;
        inner.trials_in_flight = 0;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn failure_rate(window: &VecDeque<Outcome>) -> f64 {
    let bad = window.iter().filter(|o| !matches!(o, Outcome::Success)).count();
    bad as f64 * 100.0 / window.len() as f64
}

/// Process-wide breaker map, keyed by route id.
///
/// Breakers are created on first use and retained until the process exits;
/// [`BreakerRegistry::reset`] is the only way to clear one out of band.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, breakers: Mutex::new(HashMap::new()) }
    }

    /// Returns the breaker for `route_id`, creating it on first use.
    pub fn get(&self, route_id: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(breakers.entry(route_id.to_owned()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(route_id, self.config.clone()))
        }))
    }

    /// Administrative reset hook. Returns `false` when no breaker exists for
    /// the route yet.
    pub fn reset(&self, route_id: &str) -> bool {
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        match breakers.get(route_id) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BreakerConfig {
        BreakerConfig {
            failure_rate_threshold: 50.0,
            window_size: 4,
            minimum_calls: 4,
            cooldown: Duration::from_secs(10),
            half_open_calls: 1,
            call_timeout: Duration::from_secs(4),
        }
    }

    fn tripped() -> CircuitBreaker {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..4 {
            breaker.try_acquire().unwrap().record(Outcome::Failure);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        breaker
    }

    #[tokio::test(start_paused = true)]
    async fn stays_closed_below_minimum_samples() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            breaker.record(Outcome::Failure);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn opens_at_threshold_and_rejects_within_cooldown() {
        let breaker = tripped();
        assert!(breaker.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn successes_keep_ratio_below_threshold() {
        let breaker = CircuitBreaker::new("test", config());
        for outcome in [Outcome::Success, Outcome::Success, Outcome::Success, Outcome::Failure] {
            breaker.record(outcome);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_outcomes_count_as_failures() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..4 {
            breaker.record(Outcome::Slow);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_success_closes_and_resets_window() {
        let breaker = tripped();

        tokio::time::advance(Duration::from_secs(10)).await;
        let trial = breaker.try_acquire().unwrap();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        trial.record(Outcome::Success);
        assert_eq!(breaker.state(), BreakerState::Closed);

        // Window was reset: one failure must not trip it again.
        breaker.record(Outcome::Failure);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_failure_reopens_and_restarts_cooldown() {
        let breaker = tripped();

        tokio::time::advance(Duration::from_secs(10)).await;
        breaker.try_acquire().unwrap().record(Outcome::Failure);
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_bounded_trials() {
        let breaker = tripped();

        tokio::time::advance(Duration::from_secs(10)).await;
        let _trial = breaker.try_acquire().unwrap();
        // half_open_calls = 1: the second concurrent trial is refused.
        assert!(breaker.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_permit_frees_the_slot() {
        let breaker = tripped();

        tokio::time::advance(Duration::from_secs(10)).await;
        // The trial's caller goes away without recording an outcome — a
        // cancelled request. Its slot must come back.
        drop(breaker.try_acquire().unwrap());

        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        let trial = breaker.try_acquire().unwrap();
        trial.record(Outcome::Success);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn window_evicts_old_outcomes() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..4 {
            breaker.record(Outcome::Success);
        }
        breaker.record(Outcome::Failure);
        breaker.record(Outcome::Failure);
        // The 4-slot window now holds [S, S, F, F]; the evicted successes no
        // longer dilute the ratio, so 50% trips it.
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn registry_creates_lazily_and_resets() {
        let registry = BreakerRegistry::new(config());
        assert!(!registry.reset("order"));

        let breaker = registry.get("order");
        for _ in 0..4 {
            breaker.record(Outcome::Failure);
        }
        assert_eq!(registry.get("order").state(), BreakerState::Open);

        assert!(registry.reset("order"));
        assert_eq!(registry.get("order").state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_after_opening_is_discarded() {
        let breaker = tripped();
        breaker.record(Outcome::Success);
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
