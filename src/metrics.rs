//! Running statistics for evaluation runs.

use std::collections::BTreeMap;
use std::fmt;

/// Direction of "better".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Objective {
    /// Lower is better (costs).
    Min,
    /// Higher is better (rewards).
    #[default]
    Max,
}

impl Objective {
    /// Is `candidate` strictly better than `incumbent`?
    pub fn better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Objective::Min => candidate < incumbent,
            Objective::Max => candidate > incumbent,
        }
    }

    /// Non-negative gap between `optimal` and `value` under this objective.
    pub fn regret(self, optimal: f64, value: f64) -> f64 {
        match self {
            Objective::Min => value - optimal,
            Objective::Max => optimal - value,
        }
    }
}

/// Total reward and round count.
///
/// The count never decreases; the total is unconstrained in sign.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunningAggregate {
    total: f64,
    count: u64,
}

impl RunningAggregate {
    pub fn record(&mut self, reward: f64) {
        self.total += reward;
        self.count = self.count.saturating_add(1);
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running average (`0.0` before the first round).
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// One periodic progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressLine {
    /// 0-based round index.
    pub round: u64,
    pub average: f64,
    pub reward: f64,
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i: {}, Avg reward: {}, this reward: {}",
            self.round, self.average, self.reward
        )
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    pub rounds: u64,
    pub total_reward: f64,
    /// Outcome reports delivered to the decision service.
    pub reports: u64,
}

impl RunSummary {
    pub fn average(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.total_reward / self.rounds as f64
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total iterations: {}, Avg reward: {}",
            self.rounds,
            self.average()
        )
    }
}

/// Per-context regret summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegretRow {
    pub n: u64,
    pub optimal: f64,
    pub total_reward: f64,
    pub total_regret: f64,
}

impl RegretRow {
    pub fn average_reward(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.total_reward / self.n as f64
        }
    }

    pub fn average_regret(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.total_regret / self.n as f64
        }
    }
}

/// Accumulates regret against a per-context optimum.
///
/// The optimum for a context is supplied the first time the context is seen and is
/// assumed fixed for the run.
#[derive(Debug, Clone)]
pub struct RegretTracker<C: Ord> {
    objective: Objective,
    rows: BTreeMap<C, RegretRow>,
}

impl<C: Ord + Clone> RegretTracker<C> {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            rows: BTreeMap::new(),
        }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Record `value` for `context`; `optimal` is only evaluated for a new context.
    pub fn record<F>(&mut self, context: &C, value: f64, optimal: F)
    where
        F: FnOnce() -> f64,
    {
        let row = self.rows.entry(context.clone()).or_insert_with(|| RegretRow {
            n: 0,
            optimal: optimal(),
            total_reward: 0.0,
            total_regret: 0.0,
        });
        row.n += 1;
        row.total_reward += value;
        row.total_regret += self.objective.regret(row.optimal, value);
    }

    /// Rows in context order.
    pub fn rows(&self) -> impl Iterator<Item = (&C, &RegretRow)> + '_ {
        self.rows.iter()
    }

    pub fn get(&self, context: &C) -> Option<&RegretRow> {
        self.rows.get(context)
    }

    /// Regret summed over every context.
    pub fn total_regret(&self) -> f64 {
        self.rows.values().map(|r| r.total_regret).sum()
    }
}
