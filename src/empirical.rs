//! Empirical reward oracle built from recorded observations.
//!
//! Input is a header line followed by comma-separated rows:
//!
//! ```text
//!   platform,connection,region,x,y,z,reward
//!   Mac,wifi,US,0.1,1.2,0.4,0.734
//!   1,0,1,0.1,1.2,0.4,0.52
//! ```
//!
//! Categorical fields take a canonical name or numeric code; action fields are opaque
//! labels; `reward` is a finite decimal. Rows sharing a `(context, actions)` key are all
//! kept, in load order.
//!
//! Lookups never fail: an unseen key scores `0.0`. Two aggregation policies exist and are
//! named at each use site via [`SamplePolicy`]:
//! - [`SamplePolicy::First`]: the first recorded sample (live simulation path).
//! - [`SamplePolicy::Mean`]: the mean of all samples (reporting / averaged tables).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use tracing::debug;

use crate::context::{Context, Platform};
use crate::error::{ConfigError, DataError, UnknownToken};
use crate::metrics::Objective;

/// Action labels of one record, one per dimension (`x`, `y`, `z`).
pub type ActionTuple = [String; 3];

/// Header written by [`write_records`].
pub const RECORD_HEADER: &str = "platform,connection,region,x,y,z,reward";

/// Header written by [`RewardTable::write_averaged`].
pub const AVERAGED_HEADER: &str = "platform,network,country,x,y,z,reward";

/// How multiple samples under one key collapse to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SamplePolicy {
    /// First recorded sample.
    #[default]
    First,
    /// Arithmetic mean of all samples.
    Mean,
}

/// One parsed observation row.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub context: Context,
    pub actions: ActionTuple,
    pub reward: f64,
}

impl ObservationRecord {
    /// Parse one data row. `source_name` and `line` only decorate errors.
    pub fn parse(line: &str, source_name: &str, line_no: usize) -> Result<Self, DataError> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 7 {
            return Err(DataError::FieldCount {
                source_name: source_name.to_string(),
                line: line_no,
                found: fields.len(),
            });
        }
        let locate = |e: UnknownToken| DataError::UnknownToken {
            source_name: source_name.to_string(),
            line: line_no,
            field: e.field,
            token: e.token,
        };
        let context = Context::new(
            fields[0].parse::<Platform>().map_err(locate)?,
            fields[1].parse().map_err(locate)?,
            fields[2].parse().map_err(locate)?,
        );
        let reward = fields[6]
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
            .ok_or_else(|| DataError::InvalidReward {
                source_name: source_name.to_string(),
                line: line_no,
                token: fields[6].to_string(),
            })?;
        Ok(Self {
            context,
            actions: [
                fields[3].to_string(),
                fields[4].to_string(),
                fields[5].to_string(),
            ],
            reward,
        })
    }
}

impl fmt::Display for ObservationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.context.platform,
            self.context.connection,
            self.context.region,
            self.actions[0],
            self.actions[1],
            self.actions[2],
            self.reward
        )
    }
}

/// Write `records` in the format [`RewardTable::load_reader`] reads, header first.
pub fn write_records<W: Write>(records: &[ObservationRecord], mut out: W) -> io::Result<()> {
    writeln!(out, "{RECORD_HEADER}")?;
    for r in records {
        writeln!(out, "{r}")?;
    }
    Ok(())
}

/// Best observed action tuple for a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimum {
    pub actions: ActionTuple,
    pub value: f64,
}

/// `(context, actions) -> samples`, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardTable {
    rows: BTreeMap<Context, BTreeMap<ActionTuple, Vec<f64>>>,
}

impl RewardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one source. The first line is a header and is discarded; blank lines are skipped.
    pub fn load_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self, DataError> {
        let mut table = Self::new();
        table.extend_from_reader(reader, source_name)?;
        Ok(table)
    }

    /// Load and merge several files. Any missing or malformed file fails the whole load.
    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, DataError> {
        let mut table = Self::new();
        for path in paths {
            let path = path.as_ref();
            let file = File::open(path).map_err(|error| match error.kind() {
                io::ErrorKind::NotFound => DataError::NotFound(path.to_path_buf()),
                _ => DataError::Io {
                    source_name: path.display().to_string(),
                    error,
                },
            })?;
            table.extend_from_reader(BufReader::new(file), &path.display().to_string())?;
        }
        Ok(table)
    }

    fn extend_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        source_name: &str,
    ) -> Result<(), DataError> {
        let mut rows = 0usize;
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|error| DataError::Io {
                source_name: source_name.to_string(),
                error,
            })?;
            if i == 0 || line.trim().is_empty() {
                continue;
            }
            self.insert(ObservationRecord::parse(&line, source_name, i + 1)?);
            rows += 1;
        }
        debug!(source = source_name, rows, "loaded observation records");
        Ok(())
    }

    /// Append one observation (never overwrites).
    pub fn insert(&mut self, record: ObservationRecord) {
        self.rows
            .entry(record.context)
            .or_default()
            .entry(record.actions)
            .or_default()
            .push(record.reward);
    }

    /// Append every sample of `other`, keeping duplicates.
    pub fn merge(&mut self, other: RewardTable) {
        for (ctx, by_actions) in other.rows {
            let dst = self.rows.entry(ctx).or_default();
            for (actions, mut samples) in by_actions {
                dst.entry(actions).or_default().append(&mut samples);
            }
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of stored samples across all keys.
    pub fn sample_count(&self) -> usize {
        self.rows
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Smallest and largest stored sample, or `None` for an empty table.
    pub fn reward_bounds(&self) -> Option<(f64, f64)> {
        self.rows
            .values()
            .flat_map(BTreeMap::values)
            .flatten()
            .fold(None, |acc, &r| match acc {
                None => Some((r, r)),
                Some((lo, hi)) => Some((f64::min(lo, r), f64::max(hi, r))),
            })
    }

    /// All samples under a key, in load order (empty when unseen).
    pub fn samples(&self, context: &Context, actions: &ActionTuple) -> &[f64] {
        self.rows
            .get(context)
            .and_then(|m| m.get(actions))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate `(context, actions, samples)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Context, &ActionTuple, &[f64])> + '_ {
        self.rows.iter().flat_map(|(ctx, m)| {
            m.iter()
                .map(move |(actions, samples)| (ctx, actions, samples.as_slice()))
        })
    }

    /// First recorded sample, or `0.0` when unseen.
    pub fn first_sample(&self, context: &Context, actions: &ActionTuple) -> f64 {
        self.samples(context, actions).first().copied().unwrap_or(0.0)
    }

    /// Mean of all samples, or `0.0` when unseen.
    pub fn mean_reward(&self, context: &Context, actions: &ActionTuple) -> f64 {
        mean(self.samples(context, actions))
    }

    /// Lookup under an explicit policy.
    pub fn lookup(&self, context: &Context, actions: &ActionTuple, policy: SamplePolicy) -> f64 {
        match policy {
            SamplePolicy::First => self.first_sample(context, actions),
            SamplePolicy::Mean => self.mean_reward(context, actions),
        }
    }

    /// Distinct labels observed in action dimension `dim` (0, 1 or 2), lexicographically sorted.
    pub fn unique_actions(&self, dim: usize) -> Result<Vec<String>, ConfigError> {
        if dim >= 3 {
            return Err(ConfigError::DimensionOutOfRange(dim));
        }
        let set: BTreeSet<&String> = self
            .rows
            .values()
            .flat_map(BTreeMap::keys)
            .map(|a| &a[dim])
            .collect();
        Ok(set.into_iter().cloned().collect())
    }

    /// One sample per key: the mean of that key's samples.
    pub fn averaged(&self) -> RewardTable {
        let rows = self
            .rows
            .iter()
            .map(|(ctx, m)| {
                let m = m
                    .iter()
                    .map(|(actions, samples)| (actions.clone(), vec![mean(samples)]))
                    .collect();
                (*ctx, m)
            })
            .collect();
        RewardTable { rows }
    }

    /// Write the averaged table in the record format (readable by [`RewardTable::load_reader`]).
    pub fn write_averaged<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{AVERAGED_HEADER}")?;
        for (ctx, actions, samples) in self.iter() {
            writeln!(
                out,
                "{},{},{},{},{},{},{}",
                ctx.platform,
                ctx.connection,
                ctx.region,
                actions[0],
                actions[1],
                actions[2],
                mean(samples)
            )?;
        }
        Ok(())
    }

    /// Best observed action tuple for `context` under `objective`.
    ///
    /// Only keys with at least one sample compete; `None` when the context has none.
    pub fn optimum(
        &self,
        context: &Context,
        objective: Objective,
        policy: SamplePolicy,
    ) -> Option<Optimum> {
        let mut best: Option<Optimum> = None;
        for actions in self.rows.get(context)?.keys() {
            let value = self.lookup(context, actions, policy);
            if best
                .as_ref()
                .map(|b| objective.better(value, b.value))
                .unwrap_or(true)
            {
                best = Some(Optimum {
                    actions: actions.clone(),
                    value,
                });
            }
        }
        best
    }

    /// Mean value over the observed keys of `context` (`0.0` when none).
    pub fn context_mean(&self, context: &Context, policy: SamplePolicy) -> f64 {
        let values: Vec<f64> = self
            .rows
            .get(context)
            .map(|m| m.keys().map(|a| self.lookup(context, a, policy)).collect())
            .unwrap_or_default();
        mean(&values)
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}
