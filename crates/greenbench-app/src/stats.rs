//! StatsUseCase - significance testing over the run store.
//!
//! Thin driver around the significance crate. Infallible by design: every
//! degenerate comparison is already data in the result rows.

use greenbench_significance::{omnibus_results, pairwise_results};
use greenbench_types::{OmnibusResult, PairwiseResult, RunRecord};

#[derive(Debug, Clone)]
pub struct StatsOutcome {
    pub pairwise: Vec<PairwiseResult>,
    pub omnibus: Vec<OmnibusResult>,
}

pub struct StatsUseCase;

impl StatsUseCase {
    pub fn execute(records: &[RunRecord]) -> StatsOutcome {
        StatsOutcome {
            pairwise: pairwise_results(records),
            omnibus: omnibus_results(records),
        }
    }
}
