//! The evaluation loop.
//!
//! One loop serves both problem shapes: a single-slot problem yields one decision per
//! round, a slate yields one per slot. Each round:
//!
//! 1. sample a context,
//! 2. request decisions,
//! 3. resolve them and score the round,
//! 4. report the reward against every decision's event id,
//! 5. fold the reward into the running aggregate.
//!
//! Any error aborts the run; a partial aggregate is never returned.

use tracing::{debug, info};

use crate::action::{Pick, Problem};
use crate::context::{ContextFeatures, ContextSource};
use crate::decision::{Decision, DecisionService};
use crate::error::Error;
use crate::metrics::{ProgressLine, RunSummary, RunningAggregate};
use crate::scorer::Scorer;

/// Run length and progress cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvalConfig {
    pub rounds: u64,
    /// Emit a progress line when `round % progress_every == 0`. `0` disables progress.
    pub progress_every: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            rounds: 10_000,
            progress_every: 500,
        }
    }
}

/// Everything that happened in one round, handed to an observer before it is discarded.
#[derive(Debug, Clone, Copy)]
pub struct RoundRecord<'a, C> {
    /// 0-based round index.
    pub round: u64,
    pub context: &'a C,
    pub decisions: &'a [Decision],
    pub picks: &'a [Pick<'a>],
    pub reward: f64,
}

/// Drives a decision service against a context source and a scorer.
#[derive(Debug)]
pub struct Evaluator<S, D, R> {
    source: S,
    service: D,
    scorer: R,
    problem: Problem,
    cfg: EvalConfig,
}

impl<S, D, R> Evaluator<S, D, R>
where
    S: ContextSource,
    S::Context: ContextFeatures,
    D: DecisionService,
    R: Scorer<S::Context>,
{
    pub fn new(source: S, service: D, scorer: R, problem: Problem, cfg: EvalConfig) -> Self {
        Self {
            source,
            service,
            scorer,
            problem,
            cfg,
        }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn config(&self) -> &EvalConfig {
        &self.cfg
    }

    pub fn service(&self) -> &D {
        &self.service
    }

    pub fn scorer(&self) -> &R {
        &self.scorer
    }

    /// Give back the collaborators (e.g. to inspect a service's learned state).
    pub fn into_parts(self) -> (S, D, R) {
        (self.source, self.service, self.scorer)
    }

    /// Run every round.
    pub fn run(&mut self) -> Result<RunSummary, Error> {
        self.run_with(|_| {})
    }

    /// Run every round, calling `observe` once per completed round.
    pub fn run_with<F>(&mut self, mut observe: F) -> Result<RunSummary, Error>
    where
        F: FnMut(&RoundRecord<'_, S::Context>),
    {
        let mut agg = RunningAggregate::default();
        let mut reports = 0u64;

        for round in 0..self.cfg.rounds {
            let context = self.source.sample_context();
            let decisions = self.service.request(&context, &self.problem)?;
            let picks = self.problem.resolve(&decisions)?;
            let reward = self.scorer.score(&context, &picks)?;

            for d in &decisions {
                self.service.report(&d.event_id, reward)?;
                reports += 1;
            }
            agg.record(reward);

            debug!(
                round,
                features = %context.features(),
                picks = picks.len(),
                reward,
                "round"
            );
            if self.cfg.progress_every > 0 && round % self.cfg.progress_every == 0 {
                let line = ProgressLine {
                    round,
                    average: agg.mean(),
                    reward,
                };
                info!("{line}");
            }

            observe(&RoundRecord {
                round,
                context: &context,
                decisions: &decisions,
                picks: &picks,
                reward,
            });
        }

        Ok(RunSummary {
            rounds: agg.count(),
            total_reward: agg.total(),
            reports,
        })
    }
}
