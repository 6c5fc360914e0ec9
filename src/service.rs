//! In-process decision services.
//!
//! These speak the same [`DecisionService`] contract an adapter over an external service
//! would, so the evaluator can be exercised end to end without one:
//!
//! - [`UniformService`]: uniform random choice per slot (pure exploration, the behavior of
//!   a fresh service with exploration rate 1.0).
//! - [`ThompsonService`]: Beta-posterior Thompson sampling per `(context features, slot)`.
//!
//! Both are **seedable** and issue one event id per decision. An event accepts exactly one
//! report; reporting an unknown or already-reported event is an error.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};
use tracing::trace;

use crate::action::Problem;
use crate::context::ContextFeatures;
use crate::decision::{Decision, DecisionService, EventId, ServiceStats};
use crate::error::ServiceError;

fn check_slots(problem: &Problem) -> Result<(), ServiceError> {
    match problem.slots().iter().position(|s| s.is_empty()) {
        Some(slot) => Err(ServiceError::status(format!("slot {slot} has no actions"))),
        None => Ok(()),
    }
}

/// Uniform random choice per slot.
#[derive(Debug, Clone)]
pub struct UniformService {
    app_id: String,
    rng: StdRng,
    next_event: u64,
    open: BTreeSet<EventId>,
    stats: ServiceStats,
}

impl UniformService {
    pub fn with_seed(app_id: &str, seed: u64) -> Self {
        Self {
            app_id: app_id.to_string(),
            rng: StdRng::seed_from_u64(seed),
            next_event: 0,
            open: BTreeSet::new(),
            stats: ServiceStats::default(),
        }
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    fn issue(&mut self) -> EventId {
        let id = EventId::new(format!("{}-{:08}", self.app_id, self.next_event));
        self.next_event += 1;
        self.open.insert(id.clone());
        id
    }
}

impl DecisionService for UniformService {
    fn request<C: ContextFeatures>(
        &mut self,
        _context: &C,
        problem: &Problem,
    ) -> Result<Vec<Decision>, ServiceError> {
        check_slots(problem)?;
        self.stats.requests += 1;
        let mut out = Vec::with_capacity(problem.slot_count());
        for space in problem.slots() {
            let n = space.len();
            let index = self.rng.random_range(0..n);
            out.push(Decision {
                index,
                event_id: self.issue(),
                probability: Some(1.0 / n as f64),
            });
        }
        self.stats.decisions += out.len() as u64;
        Ok(out)
    }

    fn report(&mut self, event_id: &EventId, _reward: f64) -> Result<(), ServiceError> {
        if !self.open.remove(event_id) {
            return Err(ServiceError::UnknownEvent(event_id.to_string()));
        }
        self.stats.reports += 1;
        Ok(())
    }
}

/// Configuration for [`ThompsonService`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThompsonConfig {
    /// Prior alpha (must be > 0).
    pub alpha0: f64,
    /// Prior beta (must be > 0).
    pub beta0: f64,
    /// Reported rewards are mapped linearly from `[lo, hi]` onto `[0, 1]` and clamped.
    ///
    /// Use `(0.0, 1.0)` for click rewards and `(-1.0, 0.0)` for negated costs.
    pub reward_bounds: (f64, f64),
}

impl Default for ThompsonConfig {
    fn default() -> Self {
        Self {
            alpha0: 1.0,
            beta0: 1.0,
            reward_bounds: (0.0, 1.0),
        }
    }
}

/// Beta posterior state for one action.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BetaStats {
    pub alpha: f64,
    pub beta: f64,
    pub uses: u64,
}

impl BetaStats {
    pub fn expected_value(&self) -> f64 {
        let denom = self.alpha + self.beta;
        if denom <= 0.0 {
            0.5
        } else {
            self.alpha / denom
        }
    }
}

// (context features, slot)
type ArmKey = (String, usize);

#[derive(Debug, Clone)]
struct Pending {
    key: ArmKey,
    index: usize,
}

/// Seedable Thompson-sampling service.
///
/// Per slot:
/// - Explore: the first action (stable order) with no reported reward yet.
/// - Otherwise: sample each action's Beta posterior and take the max (lower index on ties).
#[derive(Debug, Clone)]
pub struct ThompsonService {
    app_id: String,
    cfg: ThompsonConfig,
    rng: StdRng,
    arms: BTreeMap<ArmKey, Vec<BetaStats>>,
    pending: BTreeMap<EventId, Pending>,
    next_event: u64,
    stats: ServiceStats,
}

impl ThompsonService {
    pub fn with_seed(app_id: &str, cfg: ThompsonConfig, seed: u64) -> Self {
        Self {
            app_id: app_id.to_string(),
            cfg,
            rng: StdRng::seed_from_u64(seed),
            arms: BTreeMap::new(),
            pending: BTreeMap::new(),
            next_event: 0,
            stats: ServiceStats::default(),
        }
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    /// Posterior state for one `(features, slot)` cell, if it has been requested.
    pub fn posteriors(&self, features: &str, slot: usize) -> Option<&[BetaStats]> {
        self.arms
            .get(&(features.to_string(), slot))
            .map(Vec::as_slice)
    }

    fn prior(&self) -> BetaStats {
        let a = self.cfg.alpha0;
        let b = self.cfg.beta0;
        BetaStats {
            alpha: if a.is_finite() && a > 0.0 { a } else { 1.0 },
            beta: if b.is_finite() && b > 0.0 { b } else { 1.0 },
            uses: 0,
        }
    }

    fn normalize(&self, reward: f64) -> f64 {
        let (lo, hi) = self.cfg.reward_bounds;
        if !reward.is_finite() || !(hi > lo) {
            return 0.0;
        }
        ((reward - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    fn sample_beta(rng: &mut StdRng, s: BetaStats) -> f64 {
        match Beta::new(s.alpha, s.beta) {
            Ok(dist) => dist.sample(rng),
            Err(_) => 0.5,
        }
    }

    fn choose(&mut self, key: &ArmKey, n: usize) -> usize {
        let prior = self.prior();
        let stats = self.arms.entry(key.clone()).or_default();
        if stats.len() != n {
            stats.resize(n, prior);
        }
        if let Some(i) = stats.iter().position(|s| s.uses == 0) {
            return i;
        }
        let mut best = 0;
        let mut best_sample = f64::NEG_INFINITY;
        for (i, s) in stats.iter().enumerate() {
            let x = Self::sample_beta(&mut self.rng, *s);
            if x > best_sample {
                best_sample = x;
                best = i;
            }
        }
        best
    }
}

impl DecisionService for ThompsonService {
    fn request<C: ContextFeatures>(
        &mut self,
        context: &C,
        problem: &Problem,
    ) -> Result<Vec<Decision>, ServiceError> {
        check_slots(problem)?;
        self.stats.requests += 1;
        let features = context.features();
        let mut out = Vec::with_capacity(problem.slot_count());
        for (slot, space) in problem.slots().iter().enumerate() {
            let key = (features.clone(), slot);
            let index = self.choose(&key, space.len());
            let event_id = EventId::new(format!("{}-{:08}", self.app_id, self.next_event));
            self.next_event += 1;
            self.pending.insert(event_id.clone(), Pending { key, index });
            out.push(Decision {
                index,
                event_id,
                probability: None,
            });
        }
        self.stats.decisions += out.len() as u64;
        Ok(out)
    }

    fn report(&mut self, event_id: &EventId, reward: f64) -> Result<(), ServiceError> {
        let Some(p) = self.pending.remove(event_id) else {
            return Err(ServiceError::UnknownEvent(event_id.to_string()));
        };
        let r = self.normalize(reward);
        if let Some(s) = self.arms.get_mut(&p.key).and_then(|v| v.get_mut(p.index)) {
            s.alpha += r;
            s.beta += 1.0 - r;
            s.uses = s.uses.saturating_add(1);
        }
        trace!(event = %event_id, slot = p.key.1, index = p.index, reward, "reward reported");
        self.stats.reports += 1;
        Ok(())
    }
}

/// Either in-process service, chosen at runtime.
#[derive(Debug, Clone)]
pub enum BuiltinService {
    Uniform(UniformService),
    Thompson(ThompsonService),
}

impl BuiltinService {
    pub fn stats(&self) -> ServiceStats {
        match self {
            BuiltinService::Uniform(s) => s.stats(),
            BuiltinService::Thompson(s) => s.stats(),
        }
    }
}

impl DecisionService for BuiltinService {
    fn request<C: ContextFeatures>(
        &mut self,
        context: &C,
        problem: &Problem,
    ) -> Result<Vec<Decision>, ServiceError> {
        match self {
            BuiltinService::Uniform(s) => s.request(context, problem),
            BuiltinService::Thompson(s) => s.request(context, problem),
        }
    }

    fn report(&mut self, event_id: &EventId, reward: f64) -> Result<(), ServiceError> {
        match self {
            BuiltinService::Uniform(s) => s.report(event_id, reward),
            BuiltinService::Thompson(s) => s.report(event_id, reward),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSpace;
    use crate::context::{Connection, Context, Platform, Region};

    fn ctx() -> Context {
        Context::new(Platform::Mac, Connection::Wifi, Region::Us)
    }

    fn two_slots() -> Problem {
        Problem::slate(vec![
            ActionSpace::build_single(&["a", "b", "c"]),
            ActionSpace::build_single(&["d", "e"]),
        ])
    }

    #[test]
    fn uniform_returns_one_decision_per_slot_within_range() {
        let mut s = UniformService::with_seed("t", 1);
        let p = two_slots();
        for _ in 0..50 {
            let ds = s.request(&ctx(), &p).unwrap();
            assert_eq!(ds.len(), 2);
            assert!(ds[0].index < 3);
            assert!(ds[1].index < 2);
            assert_eq!(ds[1].probability, Some(0.5));
            assert_ne!(ds[0].event_id, ds[1].event_id);
        }
        assert_eq!(s.stats().requests, 50);
        assert_eq!(s.stats().decisions, 100);
    }

    #[test]
    fn uniform_is_seed_deterministic() {
        let p = two_slots();
        let mut a = UniformService::with_seed("t", 7);
        let mut b = UniformService::with_seed("t", 7);
        for _ in 0..20 {
            assert_eq!(a.request(&ctx(), &p).unwrap(), b.request(&ctx(), &p).unwrap());
        }
    }

    #[test]
    fn reports_close_events_exactly_once() {
        let mut s = UniformService::with_seed("t", 1);
        let ds = s.request(&ctx(), &two_slots()).unwrap();
        s.report(&ds[0].event_id, 1.0).unwrap();
        let again = s.report(&ds[0].event_id, 1.0);
        assert!(matches!(again, Err(ServiceError::UnknownEvent(_))));
        assert!(s.report(&EventId::new("nope"), 0.0).is_err());
        assert_eq!(s.stats().reports, 1);
    }

    #[test]
    fn empty_slot_is_a_service_error() {
        let mut s = UniformService::with_seed("t", 1);
        let p = Problem::single(ActionSpace::default());
        assert!(matches!(
            s.request(&ctx(), &p),
            Err(ServiceError::Status { .. })
        ));
    }

    #[test]
    fn thompson_explores_in_order_then_exploits() {
        let mut s = ThompsonService::with_seed("t", ThompsonConfig::default(), 3);
        let p = Problem::single(ActionSpace::build_single(&["bad", "good"]));

        let d = s.request(&ctx(), &p).unwrap();
        assert_eq!(d[0].index, 0);
        s.report(&d[0].event_id, 0.0).unwrap();
        let d = s.request(&ctx(), &p).unwrap();
        assert_eq!(d[0].index, 1);
        s.report(&d[0].event_id, 1.0).unwrap();

        let mut good = 0;
        for _ in 0..300 {
            let d = s.request(&ctx(), &p).unwrap();
            let r = if d[0].index == 1 { 1.0 } else { 0.0 };
            good += d[0].index;
            s.report(&d[0].event_id, r).unwrap();
        }
        assert!(good > 250, "good={good}");
        let post = s.posteriors(&ctx().features(), 0).unwrap();
        assert!(post[1].expected_value() > post[0].expected_value());
    }

    #[test]
    fn thompson_normalizes_negative_rewards() {
        let cfg = ThompsonConfig {
            reward_bounds: (-1.0, 0.0),
            ..ThompsonConfig::default()
        };
        let mut s = ThompsonService::with_seed("t", cfg, 0);
        let p = Problem::single(ActionSpace::build_single(&["x"]));
        let d = s.request(&ctx(), &p).unwrap();
        s.report(&d[0].event_id, -0.25).unwrap();
        let post = s.posteriors(&ctx().features(), 0).unwrap();
        assert!((post[0].alpha - 1.75).abs() < 1e-12);
        assert!((post[0].beta - 1.25).abs() < 1e-12);
        assert!(s.report(&d[0].event_id, 0.0).is_err());
    }
}
