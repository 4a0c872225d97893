#![no_main]

use arbitrary::Arbitrary;
use greenbench_significance::{anova_f, mann_whitney_u, welch_t};
use greenbench_types::TestOutcome;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct SignificanceInput {
    a: Vec<f64>,
    b: Vec<f64>,
    groups: Vec<Vec<f64>>,
}

// Every test must come back Defined or Undefined on arbitrary samples,
// NaN and infinities included; a defined p-value is a probability.
fuzz_target!(|input: SignificanceInput| {
    let a = truncate(input.a);
    let b = truncate(input.b);

    if let TestOutcome::Defined { p_value, .. } = welch_t(&a, &b) {
        assert!((0.0..=1.0).contains(&p_value));
    }

    if let TestOutcome::Defined { statistic, p_value } = mann_whitney_u(&a, &b) {
        assert!((0.0..=1.0).contains(&p_value));
        assert!(statistic >= 0.0);
        assert!(statistic <= (a.len() * b.len()) as f64);
    }

    let groups: Vec<Vec<f64>> = input.groups.into_iter().take(6).map(truncate).collect();
    if let TestOutcome::Defined { statistic, p_value } = anova_f(&groups) {
        assert!((0.0..=1.0).contains(&p_value));
        assert!(statistic >= 0.0 || statistic.is_nan());
    }
});

fn truncate(mut xs: Vec<f64>) -> Vec<f64> {
    xs.truncate(64);
    xs
}
