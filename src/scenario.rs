//! Reference scenarios.
//!
//! Each scenario wires a context source, a problem shape and a scorer together and runs
//! the evaluator against one of the in-process services:
//!
//! | scenario            | contexts            | problem                          | scorer              |
//! |---------------------|---------------------|----------------------------------|---------------------|
//! | `personas`          | persona population  | one slot, two labels             | Bernoulli clicks    |
//! | `parametric-slate`  | uniform categorical | three grid slots (`x`, `y`, `z`) | closed-form surface |
//! | `empirical-slate`   | uniform categorical | three slots of observed labels   | observation table   |
//! | `empirical-combo`   | uniform categorical | one slot, full cross product     | observation table   |
//!
//! Every run also tracks regret per context against that context's best available action.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::action::{Action, ActionSpace, Problem};
use crate::context::{Context, Population, UniformContexts};
use crate::decision::ServiceStats;
use crate::empirical::{RewardTable, SamplePolicy};
use crate::error::{ConfigError, Error};
use crate::eval::{EvalConfig, Evaluator};
use crate::metrics::{Objective, RegretTracker, RunSummary};
use crate::parametric::{ParametricConfig, ParametricOracle};
use crate::scorer::{BernoulliScorer, EmpiricalScorer, ParametricScorer, Sign};
use crate::service::{BuiltinService, ThompsonConfig, ThompsonService, UniformService};

const APP_ID: &str = "slatesim";

/// Which in-process service a scenario runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServiceKind {
    #[default]
    Uniform,
    Thompson,
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "uniform" => Ok(ServiceKind::Uniform),
            "thompson" => Ok(ServiceKind::Thompson),
            other => Err(format!("unknown service {other:?} (expected uniform|thompson)")),
        }
    }
}

/// Knobs shared by every scenario.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScenarioConfig {
    pub eval: EvalConfig,
    /// Root seed; the context source, scorer and service each derive their own stream.
    pub seed: u64,
    /// Grid step for the parametric slate.
    pub step: f64,
    pub parametric: ParametricConfig,
    /// What the parametric scorer reports.
    pub sign: Sign,
    /// How repeated observations collapse during lookup.
    pub policy: SamplePolicy,
    pub service: ServiceKind,
    /// Thompson prior. `reward_bounds` is replaced by the scenario's own reward range.
    pub thompson: ThompsonConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            eval: EvalConfig::default(),
            seed: 0,
            step: 1.0,
            parametric: ParametricConfig::default(),
            sign: Sign::Reward,
            policy: SamplePolicy::First,
            service: ServiceKind::Uniform,
            thompson: ThompsonConfig::default(),
        }
    }
}

impl ScenarioConfig {
    fn context_seed(&self) -> u64 {
        self.seed
    }

    fn scorer_seed(&self) -> u64 {
        self.seed ^ 0x5343_4f52 // "SCOR"
    }

    fn service_seed(&self) -> u64 {
        self.seed ^ 0x5345_5256 // "SERV"
    }

    fn build_service(&self, reward_bounds: (f64, f64)) -> BuiltinService {
        match self.service {
            ServiceKind::Uniform => {
                BuiltinService::Uniform(UniformService::with_seed(APP_ID, self.service_seed()))
            }
            ServiceKind::Thompson => {
                let cfg = ThompsonConfig {
                    reward_bounds,
                    ..self.thompson
                };
                BuiltinService::Thompson(ThompsonService::with_seed(
                    APP_ID,
                    cfg,
                    self.service_seed(),
                ))
            }
        }
    }
}

/// A reference scenario. The empirical ones own their observation table.
#[derive(Debug, Clone)]
pub enum Scenario {
    Personas,
    ParametricSlate,
    EmpiricalSlate(RewardTable),
    EmpiricalCombo(RewardTable),
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scenario::Personas => "personas",
            Scenario::ParametricSlate => "parametric-slate",
            Scenario::EmpiricalSlate(_) => "empirical-slate",
            Scenario::EmpiricalCombo(_) => "empirical-combo",
        })
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub summary: RunSummary,
    pub service: ServiceStats,
    /// Regret keyed by context display (persona id for `personas`).
    pub regret: RegretTracker<String>,
}

/// One slot over the reference persona actions.
pub fn personas_problem() -> Problem {
    Problem::single(ActionSpace::build_single(&Population::REFERENCE_ACTIONS))
}

/// Three grid slots bounded by the box maxima.
pub fn parametric_slate_problem(cfg: &ParametricConfig, step: f64) -> Result<Problem, ConfigError> {
    Ok(Problem::slate(vec![
        ActionSpace::build_grid(cfg.max_x, step)?,
        ActionSpace::build_grid(cfg.max_y, step)?,
        ActionSpace::build_grid(cfg.max_z, step)?,
    ]))
}

/// Three slots, each over the distinct labels observed in its dimension.
pub fn empirical_slate_problem(table: &RewardTable) -> Result<Problem, ConfigError> {
    let labels = observed_labels(table)?;
    Ok(Problem::slate(
        labels
            .iter()
            .map(|l| ActionSpace::build_single(l.as_slice()))
            .collect(),
    ))
}

/// One slot over the cross product of the observed labels.
pub fn empirical_combo_problem(table: &RewardTable) -> Result<Problem, ConfigError> {
    let labels = observed_labels(table)?;
    Ok(Problem::single(ActionSpace::build_cross_product(
        labels.as_slice(),
    )))
}

fn observed_labels(table: &RewardTable) -> Result<Vec<Vec<String>>, ConfigError> {
    if table.is_empty() {
        return Err(ConfigError::EmptyTable);
    }
    (0..3).map(|dim| table.unique_actions(dim)).collect()
}

fn grid_values(space: &ActionSpace) -> Vec<f64> {
    space.iter().filter_map(Action::value).collect()
}

impl Scenario {
    /// Build the problem shape this scenario presents to the service.
    pub fn problem(&self, cfg: &ScenarioConfig) -> Result<Problem, ConfigError> {
        match self {
            Scenario::Personas => Ok(personas_problem()),
            Scenario::ParametricSlate => parametric_slate_problem(&cfg.parametric, cfg.step),
            Scenario::EmpiricalSlate(table) => empirical_slate_problem(table),
            Scenario::EmpiricalCombo(table) => empirical_combo_problem(table),
        }
    }

    /// Run to completion. Setup errors surface before the first round.
    pub fn run(self, cfg: &ScenarioConfig) -> Result<ScenarioReport, Error> {
        let name = self.to_string();
        let problem = self.problem(cfg)?;
        info!(
            scenario = %name,
            slots = problem.slot_count(),
            rounds = cfg.eval.rounds,
            seed = cfg.seed,
            "starting run"
        );

        let report = match self {
            Scenario::Personas => run_personas(cfg, problem)?,
            Scenario::ParametricSlate => run_parametric(cfg, problem)?,
            Scenario::EmpiricalSlate(table) | Scenario::EmpiricalCombo(table) => {
                run_empirical(cfg, problem, table)?
            }
        };
        info!(
            scenario = %name,
            total_regret = report.regret.total_regret(),
            reports = report.service.reports,
            "run complete"
        );
        Ok(report)
    }
}

fn run_personas(cfg: &ScenarioConfig, problem: Problem) -> Result<ScenarioReport, Error> {
    let source = Population::with_seed(Population::reference_members(), cfg.context_seed())?;
    let service = cfg.build_service((0.0, 1.0));
    let scorer = BernoulliScorer::with_seed(cfg.scorer_seed());
    let mut regret = RegretTracker::new(Objective::Max);

    let mut ev = Evaluator::new(source, service, scorer, problem, cfg.eval);
    let summary = ev.run_with(|r| {
        regret.record(&r.context.id, r.reward, || {
            r.context
                .click_probabilities
                .iter()
                .copied()
                .fold(0.0, f64::max)
        });
    })?;
    Ok(ScenarioReport {
        summary,
        service: ev.service().stats(),
        regret,
    })
}

fn run_parametric(cfg: &ScenarioConfig, problem: Problem) -> Result<ScenarioReport, Error> {
    let oracle = ParametricOracle::reference(cfg.parametric)?;
    let (lo, hi) = (cfg.parametric.range_min, cfg.parametric.range_max);
    let (bounds, objective) = match cfg.sign {
        Sign::Cost => ((lo, hi), Objective::Min),
        Sign::Reward => ((-hi, -lo), Objective::Max),
    };
    let grids: Vec<Vec<f64>> = problem.slots().iter().map(grid_values).collect();
    let truth = oracle.clone();
    let sign = cfg.sign;

    let source = UniformContexts::with_seed(cfg.context_seed());
    let service = cfg.build_service(bounds);
    let scorer = ParametricScorer::new(oracle, sign);
    let mut regret = RegretTracker::new(objective);

    let mut ev = Evaluator::new(source, service, scorer, problem, cfg.eval);
    let summary = ev.run_with(|r| {
        regret.record(&r.context.to_string(), r.reward, || {
            let best = truth
                .best_on_grid(r.context, &grids[0], &grids[1], &grids[2])
                .map(|b| b.cost)
                .unwrap_or(0.0);
            match sign {
                Sign::Cost => best,
                Sign::Reward => -best,
            }
        });
    })?;
    Ok(ScenarioReport {
        summary,
        service: ev.service().stats(),
        regret,
    })
}

fn run_empirical(
    cfg: &ScenarioConfig,
    problem: Problem,
    table: RewardTable,
) -> Result<ScenarioReport, Error> {
    // Unseen keys score 0.0, so the range always includes it.
    let (lo, hi) = table.reward_bounds().unwrap_or((0.0, 0.0));
    let bounds = match (lo.min(0.0), hi.max(0.0)) {
        (lo, hi) if hi > lo => (lo, hi),
        _ => (0.0, 1.0),
    };
    let truth = table.clone();
    let policy = cfg.policy;

    let source = UniformContexts::with_seed(cfg.context_seed());
    let service = cfg.build_service(bounds);
    let scorer = EmpiricalScorer::new(table, policy);
    let mut regret = RegretTracker::new(Objective::Max);

    let mut ev = Evaluator::new(source, service, scorer, problem, cfg.eval);
    let summary = ev.run_with(|r| {
        regret.record(&r.context.to_string(), r.reward, || {
            best_observed(&truth, r.context, policy)
        });
    })?;
    Ok(ScenarioReport {
        summary,
        service: ev.service().stats(),
        regret,
    })
}

fn best_observed(table: &RewardTable, context: &Context, policy: SamplePolicy) -> f64 {
    table
        .optimum(context, Objective::Max, policy)
        .map(|o| o.value.max(0.0))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empirical::ObservationRecord;

    fn short(service: ServiceKind) -> ScenarioConfig {
        ScenarioConfig {
            eval: EvalConfig {
                rounds: 200,
                progress_every: 0,
            },
            service,
            ..ScenarioConfig::default()
        }
    }

    fn small_table() -> RewardTable {
        let mut t = RewardTable::new();
        for ctx in Context::all() {
            for (x, r) in [("a", 0.2), ("b", 0.9)] {
                t.insert(ObservationRecord {
                    context: ctx,
                    actions: [x.to_string(), "m".to_string(), "n".to_string()],
                    reward: r,
                });
            }
        }
        t
    }

    #[test]
    fn problems_have_expected_shapes() {
        let cfg = ScenarioConfig::default();
        let p = Scenario::ParametricSlate.problem(&cfg).unwrap();
        let sizes: Vec<usize> = p.slots().iter().map(ActionSpace::len).collect();
        assert_eq!(sizes, vec![4, 3, 2]);

        assert_eq!(Scenario::Personas.problem(&cfg).unwrap().slot_count(), 1);

        let combo = Scenario::EmpiricalCombo(small_table()).problem(&cfg).unwrap();
        assert_eq!(combo.slots()[0].len(), 2);
        let slate = Scenario::EmpiricalSlate(small_table()).problem(&cfg).unwrap();
        assert_eq!(slate.slot_count(), 3);
    }

    #[test]
    fn empty_table_is_rejected_before_any_round() {
        let err = Scenario::EmpiricalSlate(RewardTable::new())
            .run(&ScenarioConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::EmptyTable)));
    }

    #[test]
    fn bad_step_is_rejected() {
        let cfg = ScenarioConfig {
            step: 0.0,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            Scenario::ParametricSlate.run(&cfg),
            Err(Error::Config(ConfigError::InvalidStep(_)))
        ));
    }

    #[test]
    fn runs_are_seed_deterministic() {
        let a = Scenario::Personas.run(&short(ServiceKind::Uniform)).unwrap();
        let b = Scenario::Personas.run(&short(ServiceKind::Uniform)).unwrap();
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.service, b.service);
    }

    #[test]
    fn thompson_beats_uniform_on_a_clear_table() {
        let cfg_u = ScenarioConfig {
            eval: EvalConfig {
                rounds: 2_000,
                progress_every: 0,
            },
            ..short(ServiceKind::Uniform)
        };
        let cfg_t = ScenarioConfig {
            service: ServiceKind::Thompson,
            ..cfg_u
        };
        let u = Scenario::EmpiricalCombo(small_table()).run(&cfg_u).unwrap();
        let t = Scenario::EmpiricalCombo(small_table()).run(&cfg_t).unwrap();
        assert!(t.summary.average() > u.summary.average());
        assert!(t.regret.total_regret() < u.regret.total_regret());
        for (_, row) in t.regret.rows() {
            assert!((row.optimal - 0.9).abs() < 1e-12);
        }
    }

    #[test]
    fn parametric_regret_is_non_negative() {
        let r = Scenario::ParametricSlate
            .run(&short(ServiceKind::Thompson))
            .unwrap();
        assert_eq!(r.summary.reports, 600);
        for (_, row) in r.regret.rows() {
            assert_eq!(row.optimal, 0.0);
            assert!(row.total_regret >= 0.0);
        }
    }
}
