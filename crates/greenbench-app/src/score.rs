//! ScoreUseCase - the aggregate -> percent-delta -> green-capacity pass.
//!
//! A pure, re-runnable reduction over the full run store snapshot. The only
//! fatal condition is an empty store.

use anyhow::Context;
use greenbench_domain::{aggregate, delta_rows, green_capacity};
use greenbench_types::{AggregateRow, GcRow, PdRow, RunRecord};

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub aggregates: Vec<AggregateRow>,
    pub pd_rows: Vec<PdRow>,
    pub gc_rows: Vec<GcRow>,
}

pub struct ScoreUseCase;

impl ScoreUseCase {
    pub fn execute(records: &[RunRecord]) -> anyhow::Result<ScoreOutcome> {
        let aggregates = aggregate(records).context("scoring needs at least one stored run")?;
        let pd_rows = delta_rows(&aggregates);
        let gc_rows = green_capacity(&pd_rows);
        Ok(ScoreOutcome {
            aggregates,
            pd_rows,
            gc_rows,
        })
    }
}
