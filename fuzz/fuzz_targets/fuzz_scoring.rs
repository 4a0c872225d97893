#![no_main]

use arbitrary::Arbitrary;
use greenbench_domain::{aggregate, delta_rows, green_capacity};
use greenbench_types::{BASELINE_VARIANT, RunRecord};
use libfuzzer_sys::fuzz_target;

// Structure-aware mirror of a run record. Small identifier spaces so
// variants collide into real groups instead of a sea of singletons.
#[derive(Arbitrary, Debug)]
struct FuzzRun {
    task: u8,
    variant: u8,
    is_baseline: bool,
    run_idx: u8,
    runtime_s: f64,
    mem_kib: f64,
    flops: Option<u32>,
    energy_j: Option<f64>,
    correct: bool,
}

impl FuzzRun {
    fn to_record(&self) -> RunRecord {
        let sanitize = |v: f64| if v.is_finite() { v } else { 0.0 };
        let variant = if self.is_baseline {
            BASELINE_VARIANT.to_string()
        } else {
            format!("v{}", self.variant % 4)
        };
        RunRecord {
            task_id: format!("task{}", self.task % 4),
            impl_ref: "fuzz".to_string(),
            variant,
            run_idx: u32::from(self.run_idx),
            runtime_s: sanitize(self.runtime_s),
            mem_kib: sanitize(self.mem_kib),
            flops: self.flops.map(u64::from),
            energy_j: self.energy_j.map(sanitize),
            correct: self.correct,
        }
    }
}

fuzz_target!(|runs: Vec<FuzzRun>| {
    let records: Vec<RunRecord> = runs.iter().take(256).map(FuzzRun::to_record).collect();

    let Ok(aggregates) = aggregate(&records) else {
        assert!(records.is_empty());
        return;
    };

    let pd_rows = delta_rows(&aggregates);
    let gc_rows = green_capacity(&pd_rows);
    assert_eq!(pd_rows.len(), gc_rows.len());

    for pd in &pd_rows {
        let fields = [pd.pd_runtime, pd.pd_memory, pd.pd_flops, pd.pd_energy];
        if pd.variant == BASELINE_VARIANT || !pd.correct {
            assert!(fields.iter().all(|f| *f == 0.0), "gated row has credit: {pd:?}");
        }
    }

    for (pd, gc) in pd_rows.iter().zip(&gc_rows) {
        assert_eq!((pd.task_id.as_str(), pd.variant.as_str()), (gc.task_id.as_str(), gc.variant.as_str()));
        assert!(gc.gc >= 0.0, "negative green capacity: {gc:?}");
        let expected: f64 = [pd.pd_runtime, pd.pd_memory, pd.pd_flops, pd.pd_energy]
            .iter()
            .filter(|f| **f > 0.0)
            .sum();
        assert!((gc.gc - expected).abs() < 1e-9, "gc {} != positive-sum {}", gc.gc, expected);
    }
});
