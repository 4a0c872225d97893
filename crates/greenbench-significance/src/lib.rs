//! Statistical significance tests over run records.
//!
//! Three tests: Welch's t (unequal variances), Mann-Whitney U (rank-based,
//! tie-corrected normal approximation), and one-way ANOVA. None of them
//! panic or error on degenerate input; everything that has no defined
//! answer comes back as [`TestOutcome::Undefined`].
//!
//! The batch drivers work over the correct records only. A run that failed
//! validation says nothing about the distribution being compared.

use greenbench_types::{Metric, OmnibusResult, PairwiseResult, RunRecord, TestOutcome};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use std::collections::BTreeMap;

/// Fewer samples than this on either side and a test is not attempted.
pub const MIN_SAMPLES: usize = 2;

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sample_variance(xs: &[f64], m: f64) -> f64 {
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Welch's unequal-variance t-test, two-sided.
///
/// When both groups are constant the statistic degenerates: equal means
/// give `(0, 1)`, unequal means give a signed infinite statistic with
/// p = 0, which is the limit the finite formula approaches.
pub fn welch_t(a: &[f64], b: &[f64]) -> TestOutcome {
    if a.len() < MIN_SAMPLES || b.len() < MIN_SAMPLES {
        return TestOutcome::Undefined;
    }

    let ma = mean(a);
    let mb = mean(b);
    let va = sample_variance(a, ma);
    let vb = sample_variance(b, mb);

    if va == 0.0 && vb == 0.0 {
        return if ma == mb {
            TestOutcome::defined(0.0, 1.0)
        } else {
            TestOutcome::defined((ma - mb).signum() * f64::INFINITY, 0.0)
        };
    }

    let na = a.len() as f64;
    let nb = b.len() as f64;
    let se2 = va / na + vb / nb;
    if !se2.is_finite() || se2 <= 0.0 {
        return TestOutcome::Undefined;
    }

    let t = (ma - mb) / se2.sqrt();
    let df = se2.powi(2) / ((va / na).powi(2) / (na - 1.0) + (vb / nb).powi(2) / (nb - 1.0));
    if !t.is_finite() || !df.is_finite() || df <= 0.0 {
        return TestOutcome::Undefined;
    }

    let Ok(dist) = StudentsT::new(0.0, 1.0, df) else {
        return TestOutcome::Undefined;
    };
    let p = (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0);
    TestOutcome::defined(t, p)
}

/// Mann-Whitney U, two-sided, normal approximation with tie correction
/// and continuity correction. The statistic reported is U for group `a`.
///
/// The approximation is used at every sample size, so very small untied
/// groups report a smaller p than the exact permutation method would
/// (n = 2 vs 2 gives ~0.245 here against 1/3 exact).
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> TestOutcome {
    if a.len() < MIN_SAMPLES || b.len() < MIN_SAMPLES {
        return TestOutcome::Undefined;
    }
    if a.iter().chain(b).any(|x| x.is_nan()) {
        return TestOutcome::Undefined;
    }

    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let n = n1 + n2;

    let mut pooled: Vec<(f64, bool)> = a
        .iter()
        .map(|&x| (x, true))
        .chain(b.iter().map(|&x| (x, false)))
        .collect();
    pooled.sort_by(|x, y| x.0.total_cmp(&y.0));

    // Average ranks over tie blocks, accumulating the tie correction term.
    let mut rank_sum_a = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < pooled.len() {
        let mut j = i + 1;
        while j < pooled.len() && pooled[j].0 == pooled[i].0 {
            j += 1;
        }
        let rank = (i + 1 + j) as f64 / 2.0;
        let ties = (j - i) as f64;
        tie_term += ties.powi(3) - ties;
        for entry in &pooled[i..j] {
            if entry.1 {
                rank_sum_a += rank;
            }
        }
        i = j;
    }

    let u1 = rank_sum_a - n1 * (n1 + 1.0) / 2.0;
    let mean_u = n1 * n2 / 2.0;
    let var_u = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if !var_u.is_finite() || var_u <= 0.0 {
        return TestOutcome::Undefined;
    }

    let d = u1 - mean_u;
    let z = if d == 0.0 {
        0.0
    } else {
        (d - 0.5 * d.signum()) / var_u.sqrt()
    };

    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return TestOutcome::Undefined;
    };
    let p = (2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0);
    TestOutcome::defined(u1, p)
}

/// One-way ANOVA F-test across two or more groups.
///
/// Zero within-group variance leaves the F ratio without a finite scale,
/// so fully constant groups come back undefined rather than infinite.
pub fn anova_f(groups: &[Vec<f64>]) -> TestOutcome {
    if groups.len() < 2 || groups.iter().any(|g| g.len() < MIN_SAMPLES) {
        return TestOutcome::Undefined;
    }

    let k = groups.len() as f64;
    let n = groups.iter().map(Vec::len).sum::<usize>() as f64;

    let grand_mean = groups.iter().flatten().sum::<f64>() / n;
    let mut ssb = 0.0;
    let mut ssw = 0.0;
    for group in groups {
        let gm = mean(group);
        ssb += group.len() as f64 * (gm - grand_mean).powi(2);
        ssw += group.iter().map(|x| (x - gm).powi(2)).sum::<f64>();
    }

    let df1 = k - 1.0;
    let df2 = n - k;
    if df2 <= 0.0 || ssw == 0.0 {
        return TestOutcome::Undefined;
    }

    let f = (ssb / df1) / (ssw / df2);
    if !f.is_finite() {
        return TestOutcome::Undefined;
    }

    let Ok(dist) = FisherSnedecor::new(df1, df2) else {
        return TestOutcome::Undefined;
    };
    let p = (1.0 - dist.cdf(f)).clamp(0.0, 1.0);
    TestOutcome::defined(f, p)
}

fn samples(records: &[&RunRecord], metric: Metric) -> Vec<f64> {
    records.iter().filter_map(|r| r.metric(metric)).collect()
}

/// Welch + Mann-Whitney for every variant pair of every task.
///
/// Output order is deterministic: tasks ascending, metrics in
/// [`Metric::ALL`] order, pairs lexicographic by variant label. Pairs
/// where either side has fewer than [`MIN_SAMPLES`] values for the metric
/// produce no row at all.
pub fn pairwise_results(records: &[RunRecord]) -> Vec<PairwiseResult> {
    let mut tasks: BTreeMap<&str, BTreeMap<&str, Vec<&RunRecord>>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.correct) {
        tasks
            .entry(record.task_id.as_str())
            .or_default()
            .entry(record.variant.as_str())
            .or_default()
            .push(record);
    }

    let mut results = Vec::new();
    for (task_id, variants) in &tasks {
        let labels: Vec<&str> = variants.keys().copied().collect();
        for metric in Metric::ALL {
            for (i, &va) in labels.iter().enumerate() {
                for &vb in &labels[i + 1..] {
                    let a = samples(&variants[va], metric);
                    let b = samples(&variants[vb], metric);
                    if a.len() < MIN_SAMPLES || b.len() < MIN_SAMPLES {
                        continue;
                    }
                    results.push(PairwiseResult {
                        task_id: (*task_id).to_string(),
                        metric,
                        variant_a: va.to_string(),
                        variant_b: vb.to_string(),
                        n_a: a.len() as u32,
                        n_b: b.len() as u32,
                        welch: welch_t(&a, &b),
                        mann_whitney: mann_whitney_u(&a, &b),
                    });
                }
            }
        }
    }
    results
}

/// One-way ANOVA across every task's variants, per metric.
///
/// Group labels keep the order they first appear in the records. The test
/// only proceeds when at least two variants are present and every
/// variant's sample set for the metric reaches [`MIN_SAMPLES`]; a single
/// under-sampled variant suppresses the whole row for that task/metric.
pub fn omnibus_results(records: &[RunRecord]) -> Vec<OmnibusResult> {
    let mut tasks: BTreeMap<&str, Vec<(&str, Vec<&RunRecord>)>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.correct) {
        let groups = tasks.entry(record.task_id.as_str()).or_default();
        match groups
            .iter_mut()
            .find(|(label, _)| *label == record.variant.as_str())
        {
            Some((_, rs)) => rs.push(record),
            None => groups.push((record.variant.as_str(), vec![record])),
        }
    }

    let mut results = Vec::new();
    for (task_id, groups) in &tasks {
        for metric in Metric::ALL {
            let mut labels = Vec::new();
            let mut data = Vec::new();
            for (label, rs) in groups {
                labels.push((*label).to_string());
                data.push(samples(rs, metric));
            }
            if labels.len() < 2 || data.iter().any(|xs| xs.len() < MIN_SAMPLES) {
                continue;
            }
            results.push(OmnibusResult {
                task_id: (*task_id).to_string(),
                metric,
                groups: labels,
                anova: anova_f(&data),
            });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn defined(outcome: TestOutcome) -> (f64, f64) {
        match outcome {
            TestOutcome::Defined { statistic, p_value } => (statistic, p_value),
            TestOutcome::Undefined => panic!("expected a defined outcome"),
        }
    }

    #[test]
    fn welch_matches_reference_values() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 3.0, 4.0, 5.0];
        let (t, p) = defined(welch_t(&a, &b));
        assert_abs_diff_eq!(t, -1.095445, epsilon = 1e-5);
        assert_abs_diff_eq!(p, 0.315335, epsilon = 1e-4);
    }

    #[test]
    fn welch_identical_constant_groups_are_equal() {
        let a = [2.0, 2.0, 2.0];
        let b = [2.0, 2.0];
        assert_eq!(welch_t(&a, &b), TestOutcome::defined(0.0, 1.0));
    }

    #[test]
    fn welch_distinct_constant_groups_separate_with_certainty() {
        let (t, p) = defined(welch_t(&[3.0, 3.0], &[1.0, 1.0]));
        assert_eq!(t, f64::INFINITY);
        assert_eq!(p, 0.0);

        let (t, p) = defined(welch_t(&[1.0, 1.0], &[3.0, 3.0]));
        assert_eq!(t, f64::NEG_INFINITY);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn welch_needs_two_samples_per_side() {
        assert_eq!(welch_t(&[1.0], &[1.0, 2.0]), TestOutcome::Undefined);
        assert_eq!(welch_t(&[1.0, 2.0], &[]), TestOutcome::Undefined);
    }

    #[test]
    fn welch_nan_input_is_undefined() {
        assert_eq!(welch_t(&[1.0, f64::NAN], &[1.0, 2.0]), TestOutcome::Undefined);
    }

    #[test]
    fn mann_whitney_matches_reference_values() {
        let a = [1.0, 2.0];
        let b = [10.0, 20.0];
        let (u, p) = defined(mann_whitney_u(&a, &b));
        assert_eq!(u, 0.0);
        assert_abs_diff_eq!(p, 0.245278, epsilon = 1e-3);
    }

    #[test]
    fn mann_whitney_handles_ties_across_groups() {
        let a = [1.0, 2.0, 2.0];
        let b = [2.0, 3.0, 4.0];
        let (u, p) = defined(mann_whitney_u(&a, &b));
        // Ranks: 1, then a three-way tie on 2 at average rank 3, then 5, 6.
        assert_eq!(u, 1.0);
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn mann_whitney_all_identical_is_undefined() {
        assert_eq!(
            mann_whitney_u(&[5.0, 5.0], &[5.0, 5.0, 5.0]),
            TestOutcome::Undefined
        );
    }

    #[test]
    fn mann_whitney_balanced_groups_center_on_zero_z() {
        // Perfectly interleaved: U equals its mean, z is pinned to 0.
        let a = [1.0, 4.0];
        let b = [2.0, 3.0];
        let (u, p) = defined(mann_whitney_u(&a, &b));
        assert_eq!(u, 2.0);
        assert_eq!(p, 1.0);
    }

    #[test]
    fn anova_matches_reference_values() {
        let groups = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![2.0, 3.0, 4.0, 5.0],
            vec![3.0, 4.0, 5.0, 6.0],
        ];
        let (f, p) = defined(anova_f(&groups));
        assert_abs_diff_eq!(f, 2.4, epsilon = 1e-9);
        // Survival of F(2, 9) at 2.4 has the closed form (1 + 2f/9)^(-9/2).
        assert_abs_diff_eq!(p, 1.5333333333333334f64.powf(-4.5), epsilon = 1e-6);
    }

    #[test]
    fn anova_identical_groups_report_no_effect() {
        let groups = vec![vec![1.0, 2.0], vec![1.0, 2.0]];
        assert_eq!(anova_f(&groups), TestOutcome::defined(0.0, 1.0));
    }

    #[test]
    fn anova_constant_groups_are_undefined() {
        let groups = vec![vec![1.0, 1.0], vec![2.0, 2.0]];
        assert_eq!(anova_f(&groups), TestOutcome::Undefined);
    }

    #[test]
    fn anova_needs_two_groups_of_two() {
        assert_eq!(anova_f(&[vec![1.0, 2.0]]), TestOutcome::Undefined);
        assert_eq!(
            anova_f(&[vec![1.0], vec![2.0, 3.0]]),
            TestOutcome::Undefined
        );
    }

    fn record(task: &str, variant: &str, run_idx: u32, runtime_s: f64, correct: bool) -> RunRecord {
        RunRecord {
            task_id: task.to_string(),
            impl_ref: "impl".to_string(),
            variant: variant.to_string(),
            run_idx,
            runtime_s,
            mem_kib: 100.0 + runtime_s,
            flops: None,
            energy_j: None,
            correct,
        }
    }

    fn sample_store() -> Vec<RunRecord> {
        let mut records = Vec::new();
        // Stored with zeta first so first-seen order differs from sorted.
        for (i, r) in [2.0, 2.1, 1.9].into_iter().enumerate() {
            records.push(record("sort", "zeta", i as u32, r, true));
        }
        for (i, r) in [1.0, 1.1, 0.9].into_iter().enumerate() {
            records.push(record("sort", "alpha", i as u32, r, true));
        }
        records
    }

    #[test]
    fn pairwise_orders_variants_lexicographically() {
        let results = pairwise_results(&sample_store());
        // runtime + memory rows for the one pair; flops and energy are absent.
        assert_eq!(results.len(), 2);
        for row in &results {
            assert_eq!(row.variant_a, "alpha");
            assert_eq!(row.variant_b, "zeta");
            assert_eq!(row.n_a, 3);
            assert_eq!(row.n_b, 3);
            assert!(row.welch.is_defined());
            assert!(row.mann_whitney.is_defined());
        }
        assert_eq!(results[0].metric, Metric::Runtime);
        assert_eq!(results[1].metric, Metric::Memory);
    }

    #[test]
    fn omnibus_keeps_first_seen_group_order() {
        let results = omnibus_results(&sample_store());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].groups, vec!["zeta".to_string(), "alpha".to_string()]);
        assert!(results[0].anova.is_defined());
    }

    #[test]
    fn incorrect_records_are_invisible_to_the_tests() {
        let mut records = sample_store();
        for r in &mut records {
            if r.variant == "zeta" {
                r.correct = false;
            }
        }
        assert!(pairwise_results(&records).is_empty());
        assert!(omnibus_results(&records).is_empty());
    }

    #[test]
    fn under_sampled_pairs_emit_no_pairwise_rows() {
        let mut records = sample_store();
        records.push(record("sort", "solo", 0, 1.5, true));
        let results = pairwise_results(&records);
        // The well-sampled pair still compares; no pair touches "solo".
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.variant_a != "solo" && r.variant_b != "solo"));
    }

    #[test]
    fn one_under_sampled_variant_suppresses_the_omnibus_row() {
        let mut records = sample_store();
        records.push(record("sort", "solo", 0, 1.5, true));
        // Two variants have three runs each, but a single-run third variant
        // means the omnibus test is not attempted for the task at all.
        assert!(omnibus_results(&records).is_empty());
    }

    #[test]
    fn absent_metrics_emit_no_rows() {
        let results = pairwise_results(&sample_store());
        assert!(results.iter().all(|r| r.metric != Metric::Flops));
        assert!(results.iter().all(|r| r.metric != Metric::Energy));
    }

    #[test]
    fn energy_rows_appear_once_recorded() {
        let mut records = sample_store();
        for r in &mut records {
            r.energy_j = Some(10.0 + r.runtime_s);
        }
        let results = pairwise_results(&records);
        assert!(results.iter().any(|r| r.metric == Metric::Energy));
    }

    #[test]
    fn tasks_come_out_sorted() {
        let mut records = sample_store();
        for mut r in sample_store() {
            r.task_id = "apply".to_string();
            records.push(r);
        }
        let results = pairwise_results(&records);
        assert_eq!(results.first().map(|r| r.task_id.as_str()), Some("apply"));
        assert_eq!(results.last().map(|r| r.task_id.as_str()), Some("sort"));
    }

    #[test]
    fn reruns_are_byte_identical() {
        let records = sample_store();
        assert_eq!(pairwise_results(&records), pairwise_results(&records));
        assert_eq!(omnibus_results(&records), omnibus_results(&records));
    }
}
