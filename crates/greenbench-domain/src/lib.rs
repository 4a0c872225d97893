//! Domain logic for greenbench.
//!
//! This crate is intentionally I/O-free: it does math and policy. The
//! pipeline is aggregate -> percent deltas -> green capacity, with carbon
//! estimation on the side.

use greenbench_types::{
    AggregateRow, BASELINE_VARIANT, CarbonEstimate, CarbonParams, GcRow, Metric, PdRow, RunRecord,
};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("no records to aggregate")]
    NoRecords,
}

/// Groups records by (task, variant) and takes per-metric means.
///
/// Absent flops/energy values are ignored, not treated as zero; a group
/// where no run carried the value aggregates to an absent mean. The
/// group's correctness is the AND over its runs. Output rows come back
/// sorted by task then variant.
pub fn aggregate(records: &[RunRecord]) -> Result<Vec<AggregateRow>, DomainError> {
    if records.is_empty() {
        return Err(DomainError::NoRecords);
    }

    let mut groups: BTreeMap<(&str, &str), Vec<&RunRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.task_id.as_str(), record.variant.as_str()))
            .or_default()
            .push(record);
    }

    let rows = groups
        .into_iter()
        .map(|((task_id, variant), group)| {
            let runs = group.len() as f64;
            AggregateRow {
                task_id: task_id.to_string(),
                variant: variant.to_string(),
                runs: group.len() as u32,
                mean_runtime_s: group.iter().map(|r| r.runtime_s).sum::<f64>() / runs,
                mean_mem_kib: group.iter().map(|r| r.mem_kib).sum::<f64>() / runs,
                mean_flops: mean_present(&group, Metric::Flops),
                mean_energy_j: mean_present(&group, Metric::Energy),
                correct: group.iter().all(|r| r.correct),
            }
        })
        .collect();

    Ok(rows)
}

fn mean_present(group: &[&RunRecord], metric: Metric) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for record in group {
        if let Some(v) = record.metric(metric) {
            sum += v;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Scores every aggregate row against its task's `baseline` row.
///
/// pd = (baseline - candidate) / baseline, so positive is an improvement
/// for these lower-is-better metrics. Undefined ratios (zero, absent, or
/// non-finite baseline; absent or non-finite candidate) score exactly 0,
/// as does every metric of a variant that failed validation. The baseline
/// row itself scores exactly 0 across the board.
pub fn delta_rows(aggregates: &[AggregateRow]) -> Vec<PdRow> {
    let baselines: BTreeMap<&str, &AggregateRow> = aggregates
        .iter()
        .filter(|row| row.variant == BASELINE_VARIANT)
        .map(|row| (row.task_id.as_str(), row))
        .collect();

    aggregates
        .iter()
        .map(|row| pd_row(row, baselines.get(row.task_id.as_str()).copied()))
        .collect()
}

fn pd_row(row: &AggregateRow, baseline: Option<&AggregateRow>) -> PdRow {
    let pd = |metric: Metric| -> f64 {
        if row.variant == BASELINE_VARIANT || !row.correct {
            return 0.0;
        }
        let Some(base) = baseline.and_then(|b| b.mean(metric)) else {
            return 0.0;
        };
        let Some(cand) = row.mean(metric) else {
            return 0.0;
        };
        if base == 0.0 || !base.is_finite() || !cand.is_finite() {
            return 0.0;
        }
        (base - cand) / base
    };

    PdRow {
        task_id: row.task_id.clone(),
        variant: row.variant.clone(),
        pd_runtime: pd(Metric::Runtime),
        pd_memory: pd(Metric::Memory),
        pd_flops: pd(Metric::Flops),
        pd_energy: pd(Metric::Energy),
        correct: row.correct,
    }
}

/// Green capacity: the credit-only sum of a row's percent deltas.
///
/// Regressions clip to zero instead of cancelling improvements, so gc is
/// never negative.
pub fn green_capacity(pd_rows: &[PdRow]) -> Vec<GcRow> {
    pd_rows
        .iter()
        .map(|row| GcRow {
            task_id: row.task_id.clone(),
            variant: row.variant.clone(),
            gc: Metric::ALL.iter().map(|m| row.pd(*m).max(0.0)).sum(),
            correct: row.correct,
        })
        .collect()
}

/// Converts measured Joules into kWh and kg CO2e under the given context.
pub fn carbon_estimate(energy_j: f64, params: &CarbonParams) -> CarbonEstimate {
    let kwh = energy_j * params.pue / 3.6e6;
    let kg_co2e = kwh * params.grid_intensity_g_per_kwh / 1000.0;
    CarbonEstimate { kwh, kg_co2e }
}
