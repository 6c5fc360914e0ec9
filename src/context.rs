//! Simulation contexts and the generators that draw them.
//!
//! A [`Context`] is an ordered tuple of three independent categorical dimensions
//! (platform, connection, region). Every dimension has a closed domain: parsing accepts a
//! canonical name (a few case variants) or the numeric code, and anything else is an error
//! rather than a silent default.
//!
//! Two generators implement [`ContextSource`]:
//! - [`UniformContexts`]: uniform over the Cartesian product of the dimensions.
//! - [`Population`]: uniform over a fixed list of [`Persona`]s, each with a latent
//!   per-action click probability (Bernoulli outcomes).
//!
//! Both are seedable; the same seed yields the same sequence.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::error::{ConfigError, UnknownToken};

/// Anything the evaluator can present to a decision service as "the situation".
///
/// `features` is the flat shared-feature string a service keys its model on. The exact
/// namespace encoding an external service expects is the adapter's concern.
pub trait ContextFeatures {
    fn features(&self) -> String;
}

/// Draws one context per round.
pub trait ContextSource {
    type Context;

    fn sample_context(&mut self) -> Self::Context;
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $variant:ident = $code:literal, $display:literal, [$($alias:literal),+] ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            /// All values, in code order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Numeric code (`0`, `1`, ...).
            pub fn code(self) -> u8 {
                match self {
                    $( $name::$variant => $code ),+
                }
            }

            /// Canonical display name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $display ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownToken;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $($alias)|+ => Ok($name::$variant), )+
                    other => Err(UnknownToken {
                        field: $field,
                        token: other.to_string(),
                    }),
                }
            }
        }
    };
}

categorical! {
    /// Client platform.
    Platform, "platform" {
        Mac = 0, "Mac", ["0", "mac", "Mac"],
        Windows = 1, "Windows", ["1", "windows", "Windows"],
    }
}

categorical! {
    /// Network connection type.
    Connection, "connection" {
        Wifi = 0, "wifi", ["0", "wifi", "Wifi"],
        Wired = 1, "wired", ["1", "wired", "Wired"],
    }
}

categorical! {
    /// Client region.
    Region, "region" {
        Us = 0, "US", ["0", "us", "US", "Us"],
        Ca = 1, "CA", ["1", "ca", "CA", "Ca"],
    }
}

/// Categorical simulation context. Totally ordered so it can key a `BTreeMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Context {
    pub platform: Platform,
    pub connection: Connection,
    pub region: Region,
}

impl Context {
    pub const fn new(platform: Platform, connection: Connection, region: Region) -> Self {
        Self {
            platform,
            connection,
            region,
        }
    }

    /// Every context, platform slowest-varying and region fastest.
    pub fn all() -> Vec<Context> {
        let mut out = Vec::with_capacity(8);
        for &p in Platform::ALL {
            for &c in Connection::ALL {
                for &r in Region::ALL {
                    out.push(Context::new(p, c, r));
                }
            }
        }
        out
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.platform, self.connection, self.region)
    }
}

impl ContextFeatures for Context {
    fn features(&self) -> String {
        format!(
            "platform={} connection={} region={}",
            self.platform.code(),
            self.connection.code(),
            self.region.code()
        )
    }
}

/// Uniform draws over every dimension independently.
#[derive(Debug, Clone)]
pub struct UniformContexts {
    rng: StdRng,
}

impl UniformContexts {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick<T: Copy>(&mut self, values: &[T]) -> T {
        values[self.rng.random_range(0..values.len())]
    }
}

impl ContextSource for UniformContexts {
    type Context = Context;

    fn sample_context(&mut self) -> Context {
        let platform = self.pick(Platform::ALL);
        let connection = self.pick(Connection::ALL);
        let region = self.pick(Region::ALL);
        Context::new(platform, connection, region)
    }
}

/// A named member of a fixed population with a latent click probability per action.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Persona {
    pub id: String,
    pub major: String,
    pub hobby: String,
    pub favorite_character: String,
    /// Click probability per action index.
    pub click_probabilities: Vec<f64>,
}

impl Persona {
    pub fn new(
        id: &str,
        major: &str,
        hobby: &str,
        favorite_character: &str,
        click_probabilities: Vec<f64>,
    ) -> Self {
        Self {
            id: id.to_string(),
            major: major.to_string(),
            hobby: hobby.to_string(),
            favorite_character: favorite_character.to_string(),
            click_probabilities,
        }
    }

    /// Bernoulli outcome for `action` given a uniform draw in `[0, 1)`: `1.0` on a click.
    ///
    /// Actions past the end of the probability vector never click.
    pub fn outcome(&self, action: usize, draw: f64) -> f64 {
        match self.click_probabilities.get(action) {
            Some(&p) if draw <= p => 1.0,
            _ => 0.0,
        }
    }
}

impl ContextFeatures for Persona {
    fn features(&self) -> String {
        format!(
            "id={} major={} hobby={} favorite_character={}",
            self.id, self.major, self.hobby, self.favorite_character
        )
    }
}

/// Uniform draws over a fixed, non-empty population.
#[derive(Debug, Clone)]
pub struct Population {
    members: Vec<Persona>,
    rng: StdRng,
}

impl Population {
    /// Action labels the reference personas' probabilities are indexed by.
    pub const REFERENCE_ACTIONS: [&'static str; 2] = ["HerbGarden", "MachineLearning"];

    pub fn with_seed(members: Vec<Persona>, seed: u64) -> Result<Self, ConfigError> {
        if members.is_empty() {
            return Err(ConfigError::EmptyPopulation);
        }
        for m in &members {
            if let Some(&bad) = m
                .click_probabilities
                .iter()
                .find(|p| !(p.is_finite() && (0.0..=1.0).contains(*p)))
            {
                return Err(ConfigError::InvalidProbability {
                    id: m.id.clone(),
                    value: bad,
                });
            }
        }
        Ok(Self {
            members,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The two reference personas, with click probabilities over
    /// [`Population::REFERENCE_ACTIONS`].
    pub fn reference_members() -> Vec<Persona> {
        vec![
            Persona::new("rnc", "engineering", "hiking", "spock", vec![0.3, 0.2]),
            Persona::new("mk", "psychology", "kids", "7of9", vec![0.1, 0.4]),
        ]
    }

    pub fn members(&self) -> &[Persona] {
        &self.members
    }

    /// Largest click probability across all members and actions.
    pub fn max_click_probability(&self) -> f64 {
        self.members
            .iter()
            .flat_map(|m| m.click_probabilities.iter().copied())
            .fold(0.0, f64::max)
    }
}

impl ContextSource for Population {
    type Context = Persona;

    fn sample_context(&mut self) -> Persona {
        let i = self.rng.random_range(0..self.members.len());
        self.members[i].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn parses_names_and_codes() {
        assert_eq!("mac".parse::<Platform>().unwrap(), Platform::Mac);
        assert_eq!("1".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!("Wifi".parse::<Connection>().unwrap(), Connection::Wifi);
        assert_eq!("wired".parse::<Connection>().unwrap(), Connection::Wired);
        assert_eq!("Us".parse::<Region>().unwrap(), Region::Us);
        assert_eq!(" CA ".parse::<Region>().unwrap(), Region::Ca);
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        let e = "Linux".parse::<Platform>().unwrap_err();
        assert_eq!(e.field, "platform");
        assert_eq!(e.token, "Linux");
        assert!("2".parse::<Region>().is_err());
        assert!("WIFI".parse::<Connection>().is_err());
    }

    #[test]
    fn all_contexts_are_distinct_and_ordered() {
        let all = Context::all();
        assert_eq!(all.len(), 8);
        let set: BTreeSet<_> = all.iter().copied().collect();
        assert_eq!(set.len(), 8);
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(sorted, all);
        assert_eq!(all[0].to_string(), "Mac/wifi/US");
        assert_eq!(all[7].to_string(), "Windows/wired/CA");
    }

    #[test]
    fn uniform_contexts_are_seed_deterministic_and_cover_domain() {
        let mut a = UniformContexts::with_seed(9);
        let mut b = UniformContexts::with_seed(9);
        let xs: Vec<_> = (0..200).map(|_| a.sample_context()).collect();
        let ys: Vec<_> = (0..200).map(|_| b.sample_context()).collect();
        assert_eq!(xs, ys);
        let seen: BTreeSet<_> = xs.into_iter().collect();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn population_rejects_empty_and_bad_probabilities() {
        assert_eq!(
            Population::with_seed(Vec::new(), 0).unwrap_err(),
            ConfigError::EmptyPopulation
        );
        let bad = vec![Persona::new("x", "m", "h", "c", vec![0.5, 1.5])];
        assert!(matches!(
            Population::with_seed(bad, 0),
            Err(ConfigError::InvalidProbability { .. })
        ));
    }

    #[test]
    fn population_samples_members_deterministically() {
        let mut a = Population::with_seed(Population::reference_members(), 3).unwrap();
        let mut b = Population::with_seed(Population::reference_members(), 3).unwrap();
        let ids_a: Vec<_> = (0..50).map(|_| a.sample_context().id).collect();
        let ids_b: Vec<_> = (0..50).map(|_| b.sample_context().id).collect();
        assert_eq!(ids_a, ids_b);
        assert!(ids_a.iter().any(|i| i == "rnc"));
        assert!(ids_a.iter().any(|i| i == "mk"));
        assert!((a.max_click_probability() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn persona_outcome_is_bernoulli_threshold() {
        let p = Persona::new("rnc", "engineering", "hiking", "spock", vec![0.3, 0.2]);
        assert_eq!(p.outcome(0, 0.3), 1.0);
        assert_eq!(p.outcome(0, 0.31), 0.0);
        assert_eq!(p.outcome(1, 0.1), 1.0);
        assert_eq!(p.outcome(5, 0.0), 0.0);
        assert_eq!(
            p.features(),
            "id=rnc major=engineering hobby=hiking favorite_character=spock"
        );
    }
}
