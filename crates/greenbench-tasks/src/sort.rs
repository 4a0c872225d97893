//! `inefficient_sort`: sort a seeded random integer array.
//!
//! `sort::insertion` is the quadratic strawman; `sort::std` is the
//! standard-library sort of the same input.

use crate::XorShift;
use greenbench_app::WorkloadRegistry;
use std::hint::black_box;

pub const TASK_ID: &str = "inefficient_sort";

const BENCH_N: usize = 2_000;
const BENCH_SEED: u64 = 42;
const PROBE_N: usize = 300;
const PROBE_SEED: u64 = 7;

fn input(n: usize, seed: u64) -> Vec<u32> {
    let mut rng = XorShift::new(seed);
    (0..n).map(|_| rng.below(10_001) as u32).collect()
}

pub fn run_insertion(n: usize, seed: u64) -> Vec<u32> {
    let mut arr = input(n, seed);
    for i in 1..arr.len() {
        let key = arr[i];
        let mut j = i;
        while j > 0 && arr[j - 1] > key {
            arr[j] = arr[j - 1];
            j -= 1;
        }
        arr[j] = key;
    }
    arr
}

pub fn run_std(n: usize, seed: u64) -> Vec<u32> {
    let mut arr = input(n, seed);
    arr.sort_unstable();
    arr
}

fn valid(out: &[u32]) -> bool {
    out.len() == PROBE_N && out.windows(2).all(|w| w[0] <= w[1])
}

pub fn register(registry: &mut WorkloadRegistry) {
    registry.register(
        TASK_ID,
        "sort::insertion",
        || {
            Box::new(|| {
                black_box(run_insertion(BENCH_N, BENCH_SEED));
            })
        },
        || valid(&run_insertion(PROBE_N, PROBE_SEED)),
    );
    registry.register(
        TASK_ID,
        "sort::std",
        || {
            Box::new(|| {
                black_box(run_std(BENCH_N, BENCH_SEED));
            })
        },
        || valid(&run_std(PROBE_N, PROBE_SEED)),
    );
}
