//! CarbonUseCase - datacenter-contextualized energy summaries.
//!
//! Sums each (task, variant) group's measured Joules and converts them to
//! kWh and kg CO2e. Groups where no run carried an energy reading are left
//! out rather than reported as zero consumption.

use greenbench_domain::carbon_estimate;
use greenbench_types::{CarbonParams, CarbonRow, RunRecord};
use std::collections::BTreeMap;

pub struct CarbonUseCase;

impl CarbonUseCase {
    pub fn execute(records: &[RunRecord], params: &CarbonParams) -> Vec<CarbonRow> {
        let mut totals: BTreeMap<(&str, &str), Option<f64>> = BTreeMap::new();
        for record in records {
            let slot = totals
                .entry((record.task_id.as_str(), record.variant.as_str()))
                .or_default();
            if let Some(j) = record.energy_j {
                *slot = Some(slot.unwrap_or(0.0) + j);
            }
        }

        totals
            .into_iter()
            .filter_map(|((task_id, variant), energy_j)| {
                let energy_j = energy_j?;
                let estimate = carbon_estimate(energy_j, params);
                Some(CarbonRow {
                    task_id: task_id.to_string(),
                    variant: variant.to_string(),
                    energy_j,
                    kwh: estimate.kwh,
                    kg_co2e: estimate.kg_co2e,
                })
            })
            .collect()
    }
}
