//! Z-score outlier detection and replacement by group mean

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

use crate::config::OutlierConfig;
use crate::models::NodeKey;
use crate::resolver::ItemCostIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub group: String,
    pub value: Decimal,
}

/// Groups that still hold outliers once replacement stopped
#[derive(Debug, Clone, PartialEq)]
pub struct RemainingOutliers {
    pub group: String,
    pub count: usize,
    /// Mean of |value - group mean| / group mean, in percent
    pub mean_deviation_pct: f64,
    pub values: Vec<Decimal>,
    pub group_mean: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlierSummary {
    pub initial_outliers: usize,
    pub replaced_outliers: usize,
    pub remaining_outliers: usize,
    pub iterations: usize,
    pub remaining: Vec<RemainingOutliers>,
}

impl fmt::Display for OutlierSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Outliers ===")?;
        writeln!(f, "Detected initially:    {}", self.initial_outliers)?;
        writeln!(f, "Replaced by mean:      {}", self.replaced_outliers)?;
        writeln!(f, "Remaining:             {}", self.remaining_outliers)?;
        for group in &self.remaining {
            writeln!(
                f,
                "  {}: {} outliers, mean {:.2}, deviation {:.1}%",
                group.group, group.count, group.group_mean, group.mean_deviation_pct
            )?;
        }
        Ok(())
    }
}

/// Result of [`OutlierAdjuster::process`], values in input order
#[derive(Debug, Clone)]
pub struct Adjusted {
    pub values: Vec<Decimal>,
    pub is_outlier: Vec<bool>,
    pub summary: OutlierSummary,
}

pub struct OutlierAdjuster {
    config: OutlierConfig,
}

impl OutlierAdjuster {
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    /// Flag values whose |z| within their group exceeds the threshold
    ///
    /// Uses the sample standard deviation. Groups of one value or with no
    /// spread have no outliers.
    pub fn detect(&self, observations: &[Observation]) -> Vec<bool> {
        let mut flags = vec![false; observations.len()];

        for (group, members) in group_indices(observations) {
            if members.len() < 2 {
                continue;
            }
            let values: Vec<f64> = members
                .iter()
                .map(|&i| observations[i].value.to_f64().unwrap_or(0.0))
                .collect();
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let std = variance.sqrt();

            if std == 0.0 {
                debug!(group, "no spread in values");
                continue;
            }

            for (&i, v) in members.iter().zip(&values) {
                flags[i] = ((v - mean) / std).abs() > self.config.z_score;
            }
        }

        flags
    }

    /// Replace outliers by the mean of their group's other values until few
    /// enough remain or the iteration limit is hit
    pub fn process(&self, observations: &[Observation]) -> Adjusted {
        let mut current: Vec<Observation> = observations.to_vec();
        let mut flags = self.detect(&current);
        let initial = count(&flags);
        let mut remaining = initial;
        let mut iterations = 0;

        while remaining > self.config.min_outliers && iterations < self.config.max_iterations {
            iterations += 1;

            let clean_means = group_means(&current, |i| !flags[i]);
            for (i, obs) in current.iter_mut().enumerate() {
                if flags[i] {
                    if let Some(mean) = clean_means.get(obs.group.as_str()) {
                        obs.value = *mean;
                    }
                }
            }

            flags = self.detect(&current);
            remaining = count(&flags);
            debug!(iteration = iterations, remaining, "outlier replacement pass");
        }

        let summary = OutlierSummary {
            initial_outliers: initial,
            replaced_outliers: initial.saturating_sub(remaining),
            remaining_outliers: remaining,
            iterations,
            remaining: remaining_groups(&current, &flags),
        };
        info!(
            initial = summary.initial_outliers,
            replaced = summary.replaced_outliers,
            remaining = summary.remaining_outliers,
            "outlier processing finished"
        );

        Adjusted {
            values: current.into_iter().map(|o| o.value).collect(),
            is_outlier: flags,
            summary,
        }
    }

    /// Run the adjuster over resolved costs grouped by item id
    ///
    /// Returns only the nodes whose cost changed, ready to be fed back to
    /// the resolver as overrides.
    pub fn corrected_costs(&self, index: &ItemCostIndex) -> (BTreeMap<NodeKey, Decimal>, OutlierSummary) {
        let keys: Vec<&NodeKey> = index.iter().map(|(k, _)| k).collect();
        let observations: Vec<Observation> = index
            .iter()
            .map(|(k, v)| Observation {
                group: k.item_id.clone(),
                value: *v,
            })
            .collect();

        let adjusted = self.process(&observations);
        let changed = keys
            .into_iter()
            .zip(observations.iter().zip(&adjusted.values))
            .filter(|(_, (before, after))| before.value != **after)
            .map(|(key, (_, after))| (key.clone(), *after))
            .collect();

        (changed, adjusted.summary)
    }
}

fn count(flags: &[bool]) -> usize {
    flags.iter().filter(|f| **f).count()
}

fn group_indices(observations: &[Observation]) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, obs) in observations.iter().enumerate() {
        groups.entry(obs.group.as_str()).or_default().push(i);
    }
    groups
}

fn group_means(observations: &[Observation], include: impl Fn(usize) -> bool) -> BTreeMap<String, Decimal> {
    let mut sums: BTreeMap<&str, (Decimal, u32)> = BTreeMap::new();
    for (i, obs) in observations.iter().enumerate() {
        if include(i) {
            let entry = sums.entry(obs.group.as_str()).or_insert((Decimal::ZERO, 0));
            entry.0 += obs.value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(group, (sum, n))| (group.to_string(), sum / Decimal::from(n)))
        .collect()
}

fn remaining_groups(observations: &[Observation], flags: &[bool]) -> Vec<RemainingOutliers> {
    let means = group_means(observations, |_| true);
    let mut out: BTreeMap<&str, RemainingOutliers> = BTreeMap::new();

    for (i, obs) in observations.iter().enumerate() {
        if !flags[i] {
            continue;
        }
        let group_mean = means.get(obs.group.as_str()).copied().unwrap_or(Decimal::ZERO);
        let entry = out.entry(obs.group.as_str()).or_insert_with(|| RemainingOutliers {
            group: obs.group.clone(),
            count: 0,
            mean_deviation_pct: 0.0,
            values: Vec::new(),
            group_mean,
        });
        entry.count += 1;
        entry.values.push(obs.value);
    }

    out.into_values()
        .map(|mut group| {
            let mean = group.group_mean.to_f64().unwrap_or(0.0);
            if mean != 0.0 {
                let total: f64 = group
                    .values
                    .iter()
                    .map(|v| ((v.to_f64().unwrap_or(0.0) - mean) / mean).abs() * 100.0)
                    .sum();
                group.mean_deviation_pct = total / group.values.len() as f64;
            }
            group
        })
        .collect()
}
