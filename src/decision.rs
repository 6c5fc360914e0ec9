//! Decision-service contract.
//!
//! The evaluator treats the decision service as an external collaborator: it asks for one
//! decision per slot and later reports a reward against each decision's event id. Anything
//! that speaks this contract (an in-process policy, an adapter over a remote service) can be
//! evaluated.

use std::fmt;

use crate::action::Problem;
use crate::context::ContextFeatures;
use crate::error::ServiceError;

/// Opaque identifier attributing a later reward to one decision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One slot's answer from the decision service.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    /// Chosen index into the slot's action space.
    pub index: usize,
    /// Event id to report the reward against.
    pub event_id: EventId,
    /// Probability the service assigned to the chosen action, when it exposes one.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub probability: Option<f64>,
}

/// The request/report contract of a decision service.
///
/// - `request` returns exactly one [`Decision`] per slot of `problem`, in slot order.
/// - `report` attributes `reward` to a previously issued event.
///
/// Any `Err` is fatal to the run that observes it.
pub trait DecisionService {
    fn request<C: ContextFeatures>(
        &mut self,
        context: &C,
        problem: &Problem,
    ) -> Result<Vec<Decision>, ServiceError>;

    fn report(&mut self, event_id: &EventId, reward: f64) -> Result<(), ServiceError>;
}

impl<S: DecisionService + ?Sized> DecisionService for &mut S {
    fn request<C: ContextFeatures>(
        &mut self,
        context: &C,
        problem: &Problem,
    ) -> Result<Vec<Decision>, ServiceError> {
        (**self).request(context, problem)
    }

    fn report(&mut self, event_id: &EventId, reward: f64) -> Result<(), ServiceError> {
        (**self).report(event_id, reward)
    }
}

/// Request/report counters kept by the in-process services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceStats {
    pub requests: u64,
    pub decisions: u64,
    pub reports: u64,
}
