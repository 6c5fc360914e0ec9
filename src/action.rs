//! Action spaces.
//!
//! Action spaces are built once at setup and reused for every round. Index order is part of
//! the contract: a decision service answers with an index, and the scorer maps that index
//! back to a label or value through the same space, so builders must be deterministic.

use std::fmt;

use crate::decision::Decision;
use crate::error::{ConfigError, ServiceError};

/// One choice offered to the decision service.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    /// Opaque categorical label.
    Label(String),
    /// Point on a fixed step grid.
    Value(f64),
    /// One label per dimension of a cross product.
    Combo(Vec<String>),
}

impl Action {
    /// Grid value, if this is a [`Action::Value`].
    pub fn value(&self) -> Option<f64> {
        match self {
            Action::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Label, if this is a [`Action::Label`].
    pub fn label(&self) -> Option<&str> {
        match self {
            Action::Label(s) => Some(s),
            _ => None,
        }
    }

    /// Per-dimension labels, if this is a [`Action::Combo`].
    pub fn combo(&self) -> Option<&[String]> {
        match self {
            Action::Combo(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Label(s) => f.write_str(s),
            Action::Value(v) => write!(f, "value={v}"),
            Action::Combo(parts) => f.write_str(&parts.join(",")),
        }
    }
}

/// An ordered, index-addressed set of actions.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionSpace {
    actions: Vec<Action>,
}

impl ActionSpace {
    /// One [`Action::Label`] per label; index = position.
    pub fn build_single<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            actions: labels
                .iter()
                .map(|s| Action::Label(s.as_ref().to_string()))
                .collect(),
        }
    }

    /// Full Cartesian product of the per-dimension labels.
    ///
    /// Enumeration is nested with the **last** dimension varying fastest, so for
    /// `[[a, b], [c, d]]` the order is `a,c  a,d  b,c  b,d`. No dimensions yields an
    /// empty space; any empty dimension also yields an empty space.
    pub fn build_cross_product<S: AsRef<str>>(per_dimension_labels: &[Vec<S>]) -> Self {
        if per_dimension_labels.is_empty() {
            return Self::default();
        }
        let mut combos: Vec<Vec<String>> = vec![Vec::new()];
        for dim in per_dimension_labels {
            let mut next = Vec::with_capacity(combos.len() * dim.len());
            for prefix in &combos {
                for label in dim {
                    let mut c = Vec::with_capacity(prefix.len() + 1);
                    c.extend(prefix.iter().cloned());
                    c.push(label.as_ref().to_string());
                    next.push(c);
                }
            }
            combos = next;
        }
        Self {
            actions: combos.into_iter().map(Action::Combo).collect(),
        }
    }

    /// `floor(max_value / step)` grid points at `0, step, 2*step, ...`.
    ///
    /// Values are computed as `i * step` (no accumulated drift).
    pub fn build_grid(max_value: f64, step: f64) -> Result<Self, ConfigError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ConfigError::InvalidStep(step));
        }
        let n = if max_value.is_finite() && max_value > 0.0 {
            (max_value / step).floor() as usize
        } else {
            0
        };
        Ok(Self {
            actions: (0..n).map(|i| Action::Value(i as f64 * step)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// Index of the first action equal to `action`.
    pub fn position(&self, action: &Action) -> Option<usize> {
        self.actions.iter().position(|a| a == action)
    }
}

impl<'a> IntoIterator for &'a ActionSpace {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// A decision resolved against its slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pick<'a> {
    pub index: usize,
    pub action: &'a Action,
}

/// Shape of one decision round: one slot, or several slots sharing a context.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Problem {
    Single(ActionSpace),
    Slate(Vec<ActionSpace>),
}

impl Problem {
    pub fn single(space: ActionSpace) -> Self {
        Problem::Single(space)
    }

    pub fn slate(slots: Vec<ActionSpace>) -> Self {
        Problem::Slate(slots)
    }

    /// Per-slot action spaces (one for [`Problem::Single`]).
    pub fn slots(&self) -> &[ActionSpace] {
        match self {
            Problem::Single(space) => std::slice::from_ref(space),
            Problem::Slate(slots) => slots,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots().len()
    }

    /// Map each decision's index through its slot.
    ///
    /// Decisions are positional: decision `i` answers slot `i`.
    pub fn resolve(&self, decisions: &[Decision]) -> Result<Vec<Pick<'_>>, ServiceError> {
        let slots = self.slots();
        if decisions.len() != slots.len() {
            return Err(ServiceError::InvalidChoice(format!(
                "expected {} decisions, got {}",
                slots.len(),
                decisions.len()
            )));
        }
        slots
            .iter()
            .zip(decisions)
            .enumerate()
            .map(|(slot, (space, d))| {
                let action = space.get(d.index).ok_or_else(|| {
                    ServiceError::InvalidChoice(format!(
                        "slot {slot}: index {} out of {} actions",
                        d.index,
                        space.len()
                    ))
                })?;
                Ok(Pick {
                    index: d.index,
                    action,
                })
            })
            .collect()
    }
}
