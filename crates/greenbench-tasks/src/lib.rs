//! Built-in benchmark task suite.
//!
//! Each task registers two implementations: a deliberately naive baseline
//! and an efficient rewrite of the same job. Inputs come from a fixed-seed
//! generator so every run measures identical work. Validators run a smaller
//! probe input and check the output against an independent expectation.

use greenbench_app::WorkloadRegistry;

pub mod logs;
pub mod records;
pub mod sort;

/// Registry with every built-in task and implementation.
pub fn builtin_registry() -> WorkloadRegistry {
    let mut registry = WorkloadRegistry::new();
    sort::register(&mut registry);
    logs::register(&mut registry);
    records::register(&mut registry);
    registry
}

/// xorshift64*. Small, seedable, and identical on every platform, which is
/// all the workload inputs need.
#[derive(Debug, Clone)]
pub(crate) struct XorShift {
    state: u64,
}

impl XorShift {
    pub(crate) fn new(seed: u64) -> Self {
        XorShift {
            state: seed.max(1),
        }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    pub(crate) fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}
