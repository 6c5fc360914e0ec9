//! `slatesim`: deterministic reward simulation for evaluating decision services.
//!
//! The crate drives a decision service (anything that speaks the request/report contract
//! in [`DecisionService`]) through a fixed number of simulated rounds and reports how much
//! reward it collected:
//!
//! - **Contexts** ([`ContextSource`]): uniform categorical contexts
//!   ([`UniformContexts`]) or a fixed persona population ([`Population`]).
//! - **Problems** ([`Problem`]): one slot over an [`ActionSpace`], or a slate of slots that
//!   share a context. Spaces come from labels, a cross product, or a fixed step grid.
//! - **Oracles**: a closed-form cost surface ([`ParametricOracle`]) and a lookup table of
//!   recorded observations ([`RewardTable`]). Persona click draws are the third source.
//!   [`ObservationGenerator`] samples noisy records from the parametric surface.
//! - **Scorers** ([`Scorer`]): bind a pick shape to one oracle.
//! - **Loop** ([`Evaluator`]): sample, request, score, report, aggregate.
//! - **Metrics**: running average, periodic [`ProgressLine`]s, a final [`RunSummary`],
//!   and per-context regret ([`RegretTracker`]).
//!
//! Everything is seedable: the same seed and inputs give the same run.
//!
//! **Non-goals:**
//! - Not a bandit library; the in-process services ([`UniformService`],
//!   [`ThompsonService`]) exist so the loop can run without an external one.
//! - No off-policy estimators, parallel rounds, or persistence of run results.
//!
//! ```
//! use slatesim::{EvalConfig, Scenario, ScenarioConfig};
//!
//! let cfg = ScenarioConfig {
//!     eval: EvalConfig { rounds: 100, progress_every: 0 },
//!     ..ScenarioConfig::default()
//! };
//! let report = Scenario::ParametricSlate.run(&cfg).unwrap();
//! assert_eq!(report.summary.rounds, 100);
//! assert_eq!(report.summary.reports, 300);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{ConfigError, DataError, Error, ServiceError, UnknownToken};

mod context;
pub use context::*;

mod action;
pub use action::*;

mod decision;
pub use decision::*;

mod parametric;
pub use parametric::*;

mod empirical;
pub use empirical::*;

mod generate;
pub use generate::*;

mod metrics;
pub use metrics::*;

mod service;
pub use service::*;

mod scorer;
pub use scorer::*;

mod eval;
pub use eval::*;

mod scenario;
pub use scenario::*;
