//! Scorers: turn resolved picks into one scalar reward per round.
//!
//! A scorer binds a pick shape to an oracle:
//! - [`BernoulliScorer`]: one label pick against a [`Persona`]'s click probabilities.
//! - [`ParametricScorer`]: three grid picks `(x, y, z)` against the closed-form surface.
//! - [`EmpiricalScorer`]: three label picks (slate) or one combo pick (cross product)
//!   against a [`RewardTable`].
//!
//! A slate round produces one shared reward; per-slot attribution is not modeled.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::action::{Action, Pick};
use crate::context::{Context, Persona};
use crate::empirical::{ActionTuple, RewardTable, SamplePolicy};
use crate::error::{ConfigError, Error};
use crate::parametric::ParametricOracle;

/// Computes the reward for one round.
pub trait Scorer<C> {
    fn score(&mut self, context: &C, picks: &[Pick<'_>]) -> Result<f64, Error>;
}

impl<C, S: Scorer<C> + ?Sized> Scorer<C> for &mut S {
    fn score(&mut self, context: &C, picks: &[Pick<'_>]) -> Result<f64, Error> {
        (**self).score(context, picks)
    }
}

/// Which end of the parametric surface a scorer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sign {
    /// Report the cost as-is (lower is better).
    #[default]
    Cost,
    /// Report the negated cost (higher is better).
    Reward,
}

/// Persona click outcomes, one uniform draw per round from its own RNG.
#[derive(Debug, Clone)]
pub struct BernoulliScorer {
    rng: StdRng,
}

impl BernoulliScorer {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Scorer<Persona> for BernoulliScorer {
    fn score(&mut self, persona: &Persona, picks: &[Pick<'_>]) -> Result<f64, Error> {
        let [pick] = picks else {
            return Err(shape(format!("expected 1 pick, got {}", picks.len())));
        };
        let draw: f64 = self.rng.random();
        Ok(persona.outcome(pick.index, draw))
    }
}

/// Parametric surface over three grid slots.
#[derive(Debug, Clone)]
pub struct ParametricScorer {
    oracle: ParametricOracle,
    sign: Sign,
}

impl ParametricScorer {
    pub fn new(oracle: ParametricOracle, sign: Sign) -> Self {
        Self { oracle, sign }
    }

    pub fn oracle(&self) -> &ParametricOracle {
        &self.oracle
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }
}

impl Scorer<Context> for ParametricScorer {
    fn score(&mut self, context: &Context, picks: &[Pick<'_>]) -> Result<f64, Error> {
        let [x, y, z] = picks else {
            return Err(shape(format!("expected 3 grid picks, got {}", picks.len())));
        };
        let value = |p: &Pick<'_>| {
            p.action
                .value()
                .ok_or_else(|| shape(format!("expected a grid value, got {}", p.action)))
        };
        let (x, y, z) = (value(x)?, value(y)?, value(z)?);
        Ok(match self.sign {
            Sign::Cost => self.oracle.cost(context, x, y, z),
            Sign::Reward => self.oracle.reward(context, x, y, z),
        })
    }
}

/// Observation-table lookup. Unseen keys score `0.0`.
#[derive(Debug, Clone)]
pub struct EmpiricalScorer {
    table: RewardTable,
    policy: SamplePolicy,
}

impl EmpiricalScorer {
    pub fn new(table: RewardTable, policy: SamplePolicy) -> Self {
        Self { table, policy }
    }

    pub fn table(&self) -> &RewardTable {
        &self.table
    }

    pub fn policy(&self) -> SamplePolicy {
        self.policy
    }

    /// Lookup key for a three-label slate or a single three-part combo.
    pub fn key(picks: &[Pick<'_>]) -> Result<ActionTuple, ConfigError> {
        match picks {
            [x, y, z] => {
                let label = |p: &Pick<'_>| {
                    p.action.label().map(str::to_string).ok_or_else(|| {
                        ConfigError::ActionShape(format!("expected a label, got {}", p.action))
                    })
                };
                Ok([label(x)?, label(y)?, label(z)?])
            }
            [only] => match only.action {
                Action::Combo(parts) if parts.len() == 3 => {
                    Ok([parts[0].clone(), parts[1].clone(), parts[2].clone()])
                }
                other => Err(ConfigError::ActionShape(format!(
                    "expected a 3-part combo, got {other}"
                ))),
            },
            _ => Err(ConfigError::ActionShape(format!(
                "expected 3 label picks or 1 combo pick, got {} picks",
                picks.len()
            ))),
        }
    }
}

impl Scorer<Context> for EmpiricalScorer {
    fn score(&mut self, context: &Context, picks: &[Pick<'_>]) -> Result<f64, Error> {
        let key = Self::key(picks)?;
        Ok(self.table.lookup(context, &key, self.policy))
    }
}

fn shape(msg: String) -> Error {
    Error::Config(ConfigError::ActionShape(msg))
}
