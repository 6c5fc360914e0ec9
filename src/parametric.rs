//! Parametric (closed-form) cost oracle.
//!
//! For a 3-dimensional continuous action `(x, y, z)` and context `c` with coefficient
//! profile `k = coefficients(c)`:
//!
//! ```text
//!   raw_cost(c, x, y, z) = k0*x + k1*y + k2*z + k3*x*y + k4*x*z + k5*y*z
//!   cost(c, x, y, z)     = rescale(raw_cost(c, x, y, z), raw_cost(c, MAX_X, MAX_Y, MAX_Z), lo, hi)
//!   rescale(v, vmax, lo, hi) = v / vmax * (hi - lo) + lo
//! ```
//!
//! With non-negative coefficients `raw_cost` is non-decreasing in every action dimension, so
//! `cost` stays in `[lo, hi]` on the box `[0, MAX_X] x [0, MAX_Y] x [0, MAX_Z]`.
//!
//! The surface is a **cost**. [`ParametricOracle::reward`] is the only place the sign is
//! flipped; callers name which one they want.

use std::collections::BTreeMap;

use crate::context::{Connection, Context, Platform, Region};
use crate::error::ConfigError;

/// Coefficients for the three linear and three pairwise terms: `[x, y, z, xy, xz, yz]`.
pub type CoefficientProfile = [f64; 6];

/// Action-box bounds and output range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParametricConfig {
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
    pub range_min: f64,
    pub range_max: f64,
}

impl Default for ParametricConfig {
    fn default() -> Self {
        Self {
            max_x: 4.0,
            max_y: 3.0,
            max_z: 2.0,
            range_min: 0.0,
            range_max: 1.0,
        }
    }
}

/// Linear rescale of `value` from `[0, values_max]` into `[range_min, range_max]`.
#[inline]
pub fn rescale(value: f64, values_max: f64, range_min: f64, range_max: f64) -> f64 {
    value / values_max * (range_max - range_min) + range_min
}

/// Grid point with the lowest cost for a context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridOptimum {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub cost: f64,
}

/// Closed-form cost surface, one coefficient profile per context.
///
/// Construction validates that every context has a profile and a positive normalizer, so
/// lookups are total afterwards.
#[derive(Debug, Clone)]
pub struct ParametricOracle {
    cfg: ParametricConfig,
    profiles: BTreeMap<Context, CoefficientProfile>,
    // Cached `raw_cost(c, MAX_X, MAX_Y, MAX_Z)`, validated > 0.
    max_raw: BTreeMap<Context, f64>,
}

impl ParametricOracle {
    pub fn new(
        profiles: BTreeMap<Context, CoefficientProfile>,
        cfg: ParametricConfig,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [("max_x", cfg.max_x), ("max_y", cfg.max_y), ("max_z", cfg.max_z)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveBound { name, value });
            }
        }
        if !(cfg.range_min.is_finite() && cfg.range_max.is_finite())
            || cfg.range_min >= cfg.range_max
        {
            return Err(ConfigError::InvalidRange {
                min: cfg.range_min,
                max: cfg.range_max,
            });
        }

        let mut max_raw = BTreeMap::new();
        for ctx in Context::all() {
            let k = profiles.get(&ctx).ok_or(ConfigError::MissingProfile(ctx))?;
            let m = polynomial(k, cfg.max_x, cfg.max_y, cfg.max_z);
            if !(m.is_finite() && m > 0.0) {
                return Err(ConfigError::NonPositiveNormalizer(ctx, m));
            }
            max_raw.insert(ctx, m);
        }

        Ok(Self {
            cfg,
            profiles,
            max_raw,
        })
    }

    /// The reference coefficient table over all eight contexts.
    pub fn reference_profiles() -> BTreeMap<Context, CoefficientProfile> {
        use Connection::{Wifi, Wired};
        use Platform::{Mac, Windows};
        use Region::{Ca, Us};

        // Windows/wifi/US, Windows/wifi/CA and Windows/wired/US share a profile.
        let windows_shared = [
            0.14937779, 0.46339031, 0.49216011, 0.14819576, 0.47126218, 0.26317773,
        ];
        BTreeMap::from([
            (
                Context::new(Mac, Wifi, Us),
                [0.37755595, 0.88794085, 0.78759054, 0.60708194, 0.92570716, 0.35602915],
            ),
            (
                Context::new(Mac, Wifi, Ca),
                [0.19113076, 0.17363948, 0.64172931, 0.5095073, 0.45841506, 0.43078203],
            ),
            (
                Context::new(Mac, Wired, Us),
                [0.78266802, 0.2267633, 0.95940249, 0.33171948, 0.36201023, 0.36354627],
            ),
            (
                Context::new(Mac, Wired, Ca),
                [0.55245693, 0.95071475, 0.21295371, 0.35589226, 0.25239824, 0.6135975],
            ),
            (Context::new(Windows, Wifi, Us), windows_shared),
            (Context::new(Windows, Wifi, Ca), windows_shared),
            (Context::new(Windows, Wired, Us), windows_shared),
            (
                Context::new(Windows, Wired, Ca),
                [0.87995436, 0.10853902, 0.24386487, 0.14241173, 0.30777027, 0.14954826],
            ),
        ])
    }

    /// Oracle over [`ParametricOracle::reference_profiles`].
    pub fn reference(cfg: ParametricConfig) -> Result<Self, ConfigError> {
        Self::new(Self::reference_profiles(), cfg)
    }

    pub fn config(&self) -> &ParametricConfig {
        &self.cfg
    }

    /// Coefficient profile for `context`. Total after construction.
    pub fn coefficients(&self, context: &Context) -> CoefficientProfile {
        // Every `Context` value was checked in `new`.
        self.profiles[context]
    }

    /// Unscaled polynomial cost.
    pub fn raw_cost(&self, context: &Context, x: f64, y: f64, z: f64) -> f64 {
        polynomial(&self.coefficients(context), x, y, z)
    }

    /// `raw_cost` at the box maxima; the normalizer for [`ParametricOracle::cost`].
    pub fn max_raw_cost(&self, context: &Context) -> f64 {
        self.max_raw[context]
    }

    /// Cost in `[range_min, range_max]` for actions inside the box.
    pub fn cost(&self, context: &Context, x: f64, y: f64, z: f64) -> f64 {
        rescale(
            self.raw_cost(context, x, y, z),
            self.max_raw_cost(context),
            self.cfg.range_min,
            self.cfg.range_max,
        )
    }

    /// Reward is negated cost.
    pub fn reward(&self, context: &Context, x: f64, y: f64, z: f64) -> f64 {
        -self.cost(context, x, y, z)
    }

    /// Lowest-cost point over the given per-dimension grids (first found wins ties).
    ///
    /// Returns `None` when any grid is empty.
    pub fn best_on_grid(
        &self,
        context: &Context,
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
    ) -> Option<GridOptimum> {
        let mut best: Option<GridOptimum> = None;
        for &x in xs {
            for &y in ys {
                for &z in zs {
                    let cost = self.cost(context, x, y, z);
                    if best.map(|b| cost < b.cost).unwrap_or(true) {
                        best = Some(GridOptimum { x, y, z, cost });
                    }
                }
            }
        }
        best
    }
}

fn polynomial(k: &CoefficientProfile, x: f64, y: f64, z: f64) -> f64 {
    k[0] * x + k[1] * y + k[2] * z + k[3] * x * y + k[4] * x * z + k[5] * y * z
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> ParametricOracle {
        ParametricOracle::reference(ParametricConfig::default()).unwrap()
    }

    #[test]
    fn rescale_is_affine() {
        assert_eq!(rescale(0.0, 10.0, 0.0, 1.0), 0.0);
        assert_eq!(rescale(10.0, 10.0, 0.0, 1.0), 1.0);
        assert_eq!(rescale(5.0, 10.0, -1.0, 1.0), 0.0);
    }

    #[test]
    fn cost_hits_range_ends_at_box_corners() {
        let o = oracle();
        for ctx in Context::all() {
            assert_eq!(o.cost(&ctx, 0.0, 0.0, 0.0), 0.0);
            let top = o.cost(&ctx, 4.0, 3.0, 2.0);
            assert!((top - 1.0).abs() < 1e-12, "{ctx}: {top}");
        }
    }

    #[test]
    fn reward_is_negated_cost() {
        let o = oracle();
        let ctx = Context::all()[2];
        let c = o.cost(&ctx, 1.0, 2.0, 1.0);
        assert!(c > 0.0);
        assert_eq!(o.reward(&ctx, 1.0, 2.0, 1.0), -c);
    }

    #[test]
    fn raw_cost_matches_hand_computation() {
        let mut profiles = ParametricOracle::reference_profiles();
        let ctx = Context::all()[0];
        profiles.insert(ctx, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let o = ParametricOracle::new(profiles, ParametricConfig::default()).unwrap();
        // 1*1 + 2*2 + 3*3 + 4*1*2 + 5*1*3 + 6*2*3
        assert_eq!(o.raw_cost(&ctx, 1.0, 2.0, 3.0), 1.0 + 4.0 + 9.0 + 8.0 + 15.0 + 36.0);
        assert_eq!(o.coefficients(&ctx), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn missing_profile_fails_construction() {
        let mut profiles = ParametricOracle::reference_profiles();
        let ctx = Context::all()[5];
        profiles.remove(&ctx);
        let err = ParametricOracle::new(profiles, ParametricConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingProfile(ctx));
    }

    #[test]
    fn zero_normalizer_fails_construction() {
        let mut profiles = ParametricOracle::reference_profiles();
        let ctx = Context::all()[1];
        profiles.insert(ctx, [0.0; 6]);
        let err = ParametricOracle::new(profiles, ParametricConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveNormalizer(ctx, 0.0));
    }

    #[test]
    fn bad_bounds_and_range_fail_construction() {
        let cfg = ParametricConfig {
            max_y: 0.0,
            ..ParametricConfig::default()
        };
        assert!(matches!(
            ParametricOracle::reference(cfg),
            Err(ConfigError::NonPositiveBound { name: "max_y", .. })
        ));
        let cfg = ParametricConfig {
            range_min: 1.0,
            range_max: 1.0,
            ..ParametricConfig::default()
        };
        assert!(matches!(
            ParametricOracle::reference(cfg),
            Err(ConfigError::InvalidRange { .. })
        ));
    }

    #[test]
    fn best_on_grid_is_origin_for_positive_coefficients() {
        let o = oracle();
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.0, 1.0, 2.0];
        let zs = [0.0, 1.0];
        for ctx in Context::all() {
            let b = o.best_on_grid(&ctx, &xs, &ys, &zs).unwrap();
            assert_eq!((b.x, b.y, b.z, b.cost), (0.0, 0.0, 0.0, 0.0));
        }
        assert!(o.best_on_grid(&Context::all()[0], &[], &ys, &zs).is_none());
    }
}
