//! Synthetic observation records drawn from the parametric surface.
//!
//! For every context and every point of the `x`/`y`/`z` step grids, the generator draws
//! `samples_per_point` noisy costs: `cost(context, x, y, z) + N(0, noise_sd)`. The result
//! is a set of [`ObservationRecord`]s that [`write_records`](crate::write_records) writes
//! in the format the empirical oracle loads, so an empirical run can be checked against
//! the surface that produced its data.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::action::{Action, ActionSpace};
use crate::context::Context;
use crate::empirical::ObservationRecord;
use crate::error::ConfigError;
use crate::parametric::ParametricOracle;

/// How many observations to draw and how noisy they are.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerateConfig {
    /// Observations per `(context, x, y, z)` point.
    pub samples_per_point: usize,
    /// Standard deviation of the additive Gaussian noise. `0.0` gives exact costs.
    pub noise_sd: f64,
    /// Grid step shared by all three dimensions.
    pub step: f64,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            samples_per_point: 5,
            noise_sd: 0.05,
            step: 1.0,
        }
    }
}

/// Seeded sampler of noisy observations from a [`ParametricOracle`].
#[derive(Debug, Clone)]
pub struct ObservationGenerator {
    oracle: ParametricOracle,
    cfg: GenerateConfig,
    xs: Vec<f64>,
    ys: Vec<f64>,
    zs: Vec<f64>,
    noise: Normal<f64>,
    rng: StdRng,
}

impl ObservationGenerator {
    /// Validates the step and noise before any sample is drawn.
    pub fn with_seed(
        oracle: ParametricOracle,
        cfg: GenerateConfig,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if !(cfg.noise_sd.is_finite() && cfg.noise_sd >= 0.0) {
            return Err(ConfigError::InvalidNoise(cfg.noise_sd));
        }
        let noise =
            Normal::new(0.0, cfg.noise_sd).map_err(|_| ConfigError::InvalidNoise(cfg.noise_sd))?;
        let bounds = *oracle.config();
        let values = |max: f64| -> Result<Vec<f64>, ConfigError> {
            Ok(ActionSpace::build_grid(max, cfg.step)?
                .iter()
                .filter_map(Action::value)
                .collect())
        };
        Ok(Self {
            xs: values(bounds.max_x)?,
            ys: values(bounds.max_y)?,
            zs: values(bounds.max_z)?,
            oracle,
            cfg,
            noise,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.cfg
    }

    /// Number of grid points per context.
    pub fn points_per_context(&self) -> usize {
        self.xs.len() * self.ys.len() * self.zs.len()
    }

    /// Draw observations for one context, grid order (last dimension fastest).
    pub fn generate_context(&mut self, context: &Context) -> Vec<ObservationRecord> {
        let mut out = Vec::with_capacity(self.points_per_context() * self.cfg.samples_per_point);
        for &x in &self.xs {
            for &y in &self.ys {
                for &z in &self.zs {
                    let cost = self.oracle.cost(context, x, y, z);
                    let actions = [x.to_string(), y.to_string(), z.to_string()];
                    for _ in 0..self.cfg.samples_per_point {
                        out.push(ObservationRecord {
                            context: *context,
                            actions: actions.clone(),
                            reward: cost + self.noise.sample(&mut self.rng),
                        });
                    }
                }
            }
        }
        out
    }

    /// Draw observations for every context in [`Context::all`] order.
    pub fn generate(&mut self) -> Vec<ObservationRecord> {
        let mut out = Vec::new();
        for context in Context::all() {
            out.extend(self.generate_context(&context));
        }
        debug!(
            records = out.len(),
            points = self.points_per_context(),
            "generated observation records"
        );
        out
    }
}
