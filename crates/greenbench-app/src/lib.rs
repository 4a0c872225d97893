//! Application layer for greenbench.
//!
//! The app layer coordinates adapters and domain logic: it runs workloads
//! under instrumentation, appends records to the run store, and drives the
//! scoring and significance passes. It does not parse CLI flags and it does
//! not decide file paths.

use anyhow::Context;
use greenbench_adapters::{CounterProbe, EnergyCsv, alloc::MemProbe};
use greenbench_store::RunStore;
use greenbench_types::{
    HostInfo, MEASURE_SCHEMA_V1, MeasureReceipt, RunMeta, RunRecord, ToolInfo,
};
use std::time::Instant;

mod carbon;
mod registry;
mod score;
mod stats;

pub use carbon::CarbonUseCase;
pub use registry::{RegistryError, Validator, Workload, WorkloadRegistry, WorkloadResolver};
pub use score::{ScoreOutcome, ScoreUseCase};
pub use stats::{StatsOutcome, StatsUseCase};

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

/// Where a run's energy reading comes from.
#[derive(Debug)]
pub enum EnergyPlan {
    /// No energy source configured; `energy_j` stays absent.
    None,

    /// Sample a profiler energy event around a child execution.
    Perf { event: String },

    /// Look the reading up in an external per-run table.
    Csv(EnergyCsv),
}

#[derive(Debug)]
pub struct MeasureRequest {
    pub task_id: String,
    pub impl_ref: String,
    pub variant: String,

    /// Logged runs. Warmup executions come on top of these.
    pub runs: u32,
    pub warmup: u32,

    /// Hardware counter sampled for per-run FLOP counts; `None` disables
    /// counter sampling entirely.
    pub flops_event: Option<String>,

    pub energy: EnergyPlan,

    /// Child argv equivalent to one workload execution. This is what the
    /// external profiler is pointed at; without it, counter and perf-energy
    /// sampling degrade to absent.
    pub profile_target: Option<Vec<String>>,
}

/// A warmup execution: observed, reported, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct WarmupObservation {
    pub runtime_s: f64,
    pub mem_kib: f64,
}

#[derive(Debug)]
pub struct MeasureOutcome {
    pub receipt: MeasureReceipt,
    pub warmups: Vec<WarmupObservation>,
}

/// The metric collector. Runs a workload `warmup + runs` times, measures
/// each execution, and appends one record per logged run.
///
/// Correctness is evaluated once per implementation, before the timed
/// section, and stamped onto every persisted row. A probe that cannot
/// deliver its signal degrades that one reading to absent; an unknown
/// task or implementation aborts the whole invocation.
pub struct MeasureUseCase<M: MemProbe, P: CounterProbe, C: Clock> {
    mem: M,
    counter: P,
    clock: C,
    tool: ToolInfo,
}

impl<M: MemProbe, P: CounterProbe, C: Clock> MeasureUseCase<M, P, C> {
    pub fn new(mem: M, counter: P, clock: C, tool: ToolInfo) -> Self {
        Self {
            mem,
            counter,
            clock,
            tool,
        }
    }

    pub fn execute<R, S>(
        &self,
        registry: &R,
        store: &mut S,
        req: MeasureRequest,
    ) -> anyhow::Result<MeasureOutcome>
    where
        R: WorkloadResolver + Validator,
        S: RunStore,
    {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = self.clock.now_rfc3339();

        let mut workload = registry
            .resolve(&req.task_id, &req.impl_ref)
            .with_context(|| format!("no workload for task `{}`", req.task_id))?;

        // Validation may do arbitrary work of its own, so it happens once,
        // outside the timed section.
        let correct = registry
            .validate(&req.task_id, &req.impl_ref)
            .with_context(|| format!("no validator for task `{}`", req.task_id))?;

        let mut warmups = Vec::new();
        let mut records = Vec::new();

        let total = req.warmup + req.runs;
        for i in 0..total {
            self.mem.reset();
            let start = Instant::now();
            workload();
            let runtime_s = start.elapsed().as_secs_f64();
            let mem_kib = self.mem.peak_kib();

            if i < req.warmup {
                warmups.push(WarmupObservation { runtime_s, mem_kib });
                continue;
            }
            let run_idx = i - req.warmup;

            let flops = match (&req.flops_event, &req.profile_target) {
                (Some(event), Some(target)) => self
                    .counter
                    .sample(event, target)
                    .filter(|v| *v >= 0.0)
                    .map(|v| v as u64),
                _ => None,
            };

            let energy_j = match &req.energy {
                EnergyPlan::None => None,
                EnergyPlan::Perf { event } => req
                    .profile_target
                    .as_ref()
                    .and_then(|target| self.counter.sample(event, target)),
                EnergyPlan::Csv(table) => table.get(run_idx as usize),
            };

            let record = RunRecord {
                task_id: req.task_id.clone(),
                impl_ref: req.impl_ref.clone(),
                variant: req.variant.clone(),
                run_idx,
                runtime_s,
                mem_kib,
                flops,
                energy_j,
                correct,
            };
            store
                .append(&record)
                .with_context(|| format!("failed to persist run {run_idx}"))?;
            records.push(record);
        }

        let ended_at = self.clock.now_rfc3339();
        let receipt = MeasureReceipt {
            schema: MEASURE_SCHEMA_V1.to_string(),
            tool: self.tool.clone(),
            run: RunMeta {
                id: run_id,
                started_at,
                ended_at,
                host: HostInfo {
                    os: std::env::consts::OS.to_string(),
                    arch: std::env::consts::ARCH.to_string(),
                },
            },
            task_id: req.task_id,
            impl_ref: req.impl_ref,
            variant: req.variant,
            runs: req.runs,
            warmup: req.warmup,
            correct,
            records,
        };

        Ok(MeasureOutcome { receipt, warmups })
    }
}
