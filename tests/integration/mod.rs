//! Workspace integration tests driving the full scoring pipeline through
//! the library crates: store -> aggregate -> deltas -> green capacity,
//! plus the significance layer over the same records.

use greenbench_app::{Validator, WorkloadResolver};
use greenbench_domain::{aggregate, delta_rows, green_capacity};
use greenbench_significance::{omnibus_results, pairwise_results, welch_t};
use greenbench_store::{CsvStore, RunStore};
use greenbench_tasks::builtin_registry;
use greenbench_types::{BASELINE_VARIANT, RunRecord, TestOutcome};

fn run(task: &str, variant: &str, run_idx: u32, runtime_s: f64, correct: bool) -> RunRecord {
    RunRecord {
        task_id: task.to_string(),
        impl_ref: format!("{task}::x"),
        variant: variant.to_string(),
        run_idx,
        runtime_s,
        mem_kib: 100.0,
        flops: None,
        energy_j: None,
        correct,
    }
}

#[test]
fn halved_runtime_earns_half_a_point_of_green_capacity() {
    let records = vec![
        run("sort", BASELINE_VARIANT, 0, 1.0, true),
        run("sort", BASELINE_VARIANT, 1, 1.0, true),
        run("sort", "fast", 0, 0.5, true),
        run("sort", "fast", 1, 0.5, true),
    ];

    let aggregates = aggregate(&records).unwrap();
    let baseline = aggregates
        .iter()
        .find(|a| a.variant == BASELINE_VARIANT)
        .unwrap();
    let fast = aggregates.iter().find(|a| a.variant == "fast").unwrap();
    assert_eq!(baseline.mean_runtime_s, 1.0);
    assert_eq!(fast.mean_runtime_s, 0.5);

    let pds = delta_rows(&aggregates);
    let fast_pd = pds.iter().find(|p| p.variant == "fast").unwrap();
    assert_eq!(fast_pd.pd_runtime, 0.5);

    let gcs = green_capacity(&pds);
    let fast_gc = gcs.iter().find(|g| g.variant == "fast").unwrap();
    assert!(fast_gc.gc >= 0.5);
}

#[test]
fn incorrect_variant_loses_all_credit_despite_faster_runs() {
    let records = vec![
        run("sort", BASELINE_VARIANT, 0, 1.0, true),
        run("sort", BASELINE_VARIANT, 1, 1.0, true),
        run("sort", "fast", 0, 0.5, false),
        run("sort", "fast", 1, 0.5, false),
    ];

    let aggregates = aggregate(&records).unwrap();
    let pds = delta_rows(&aggregates);
    let fast = pds.iter().find(|p| p.variant == "fast").unwrap();
    assert!(!fast.correct);
    assert_eq!(fast.pd_runtime, 0.0);
    assert_eq!(fast.pd_memory, 0.0);
    assert_eq!(fast.pd_flops, 0.0);
    assert_eq!(fast.pd_energy, 0.0);

    let gcs = green_capacity(&pds);
    assert_eq!(gcs.iter().find(|g| g.variant == "fast").unwrap().gc, 0.0);
}

#[test]
fn baseline_rows_always_carry_zero_deltas() {
    let records = vec![
        run("sort", BASELINE_VARIANT, 0, 1.0, true),
        run("sort", "fast", 0, 0.5, true),
    ];
    let pds = delta_rows(&aggregate(&records).unwrap());
    let base = pds.iter().find(|p| p.variant == BASELINE_VARIANT).unwrap();
    assert_eq!(
        (base.pd_runtime, base.pd_memory, base.pd_flops, base.pd_energy),
        (0.0, 0.0, 0.0, 0.0)
    );

    let gcs = green_capacity(&pds);
    let base_gc = gcs.iter().find(|g| g.variant == BASELINE_VARIANT).unwrap();
    assert_eq!(base_gc.gc, 0.0);
}

#[test]
fn zero_runtime_baseline_produces_zero_deltas_not_nan() {
    let records = vec![
        run("t", BASELINE_VARIANT, 0, 0.0, true),
        run("t", "fast", 0, 1.0, true),
    ];
    let pds = delta_rows(&aggregate(&records).unwrap());
    for pd in &pds {
        assert!(pd.pd_runtime.is_finite());
        assert_eq!(pd.pd_runtime, 0.0);
    }
}

#[test]
fn green_capacity_sums_only_non_negative_deltas() {
    // A variant faster on runtime but heavier on memory keeps only the
    // runtime credit.
    let mut baseline = run("sort", BASELINE_VARIANT, 0, 1.0, true);
    baseline.mem_kib = 100.0;
    let mut slow_mem = run("sort", "fast", 0, 0.7, true);
    slow_mem.mem_kib = 150.0;

    let pds = delta_rows(&aggregate(&[baseline, slow_mem]).unwrap());
    let fast = pds.iter().find(|p| p.variant == "fast").unwrap();
    assert!(fast.pd_runtime > 0.0);
    assert!(fast.pd_memory < 0.0);

    let gcs = green_capacity(&pds);
    let gc = gcs.iter().find(|g| g.variant == "fast").unwrap().gc;
    assert!((gc - fast.pd_runtime).abs() < 1e-12);
    assert!(gc >= 0.0);
}

#[test]
fn identical_groups_compare_as_statistic_zero_p_one() {
    let group = [1.0, 1.0, 1.0];
    assert_eq!(welch_t(&group, &group), TestOutcome::defined(0.0, 1.0));
}

#[test]
fn constant_versus_varying_group_never_panics() {
    let outcome = welch_t(&[1.0, 1.0, 1.0], &[0.9, 1.1, 1.3]);
    if let TestOutcome::Defined { statistic, p_value } = outcome {
        assert!(statistic.is_finite());
        assert!((0.0..=1.0).contains(&p_value));
    }
}

#[test]
fn omnibus_needs_at_least_two_variants() {
    let records = vec![
        run("sort", BASELINE_VARIANT, 0, 1.0, true),
        run("sort", BASELINE_VARIANT, 1, 1.1, true),
    ];
    assert!(omnibus_results(&records).is_empty());
    assert!(pairwise_results(&records).is_empty());
}

#[test]
fn round_trip_through_the_csv_store_preserves_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.csv");

    let mut store = CsvStore::new(&path);
    for record in [
        run("sort", BASELINE_VARIANT, 0, 1.0, true),
        run("sort", BASELINE_VARIANT, 1, 1.0, true),
        run("sort", "fast", 0, 0.5, true),
        run("sort", "fast", 1, 0.5, true),
    ] {
        store.append(&record).unwrap();
    }

    let records = store.read_all().unwrap();
    assert_eq!(records.len(), 4);

    let pds = delta_rows(&aggregate(&records).unwrap());
    let fast = pds.iter().find(|p| p.variant == "fast").unwrap();
    assert_eq!(fast.pd_runtime, 0.5);
}

#[test]
fn every_builtin_implementation_runs_and_validates() {
    let registry = builtin_registry();
    for task in registry.task_ids() {
        for impl_ref in registry.impls(task) {
            let mut workload = registry.resolve(task, impl_ref).unwrap();
            workload();
            assert!(
                registry.validate(task, impl_ref).unwrap(),
                "{task}/{impl_ref} failed validation"
            );
        }
    }
}
