//! Shared types for greenbench.
//!
//! Design goal: versioned, explicit, boring.
//! These structs are used for the run store, derived score tables, measure
//! receipts, and the TOML config file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MEASURE_SCHEMA_V1: &str = "greenbench.measure.v1";

/// Reserved variant label that delta scoring compares against.
pub const BASELINE_VARIANT: &str = "baseline";

/// Column order of the run store, and of every [`RunRecord`] row.
pub const RUN_STORE_HEADER: [&str; 9] = [
    "task_id", "impl", "variant", "run_idx", "runtime_s", "mem_kib", "flops", "energy_j", "correct",
];

pub const DEFAULT_RUNS: u32 = 10;
pub const DEFAULT_WARMUP: u32 = 2;

/// Hardware counter sampled for FLOP counts when none is configured.
pub const DEFAULT_FLOPS_EVENT: &str = "fp_arith_inst_retired.scalar_double";

/// RAPL package-energy event sampled when the energy source is `perf`.
pub const DEFAULT_ENERGY_EVENT: &str = "power/energy-pkg/";

/// Power usage effectiveness applied to carbon estimates.
pub const DEFAULT_PUE: f64 = 1.2;

/// Grid carbon intensity in grams CO2e per kWh (global average).
pub const DEFAULT_GRID_INTENSITY_G_PER_KWH: f64 = 475.0;

/// Serializes correctness flags as `0`/`1` integers.
///
/// The run store is CSV and every surface that carries a correctness flag
/// keeps the same `0`/`1` encoding so rows can be diffed across formats.
pub mod run_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(serde::de::Error::custom(format!(
                "correct flag must be 0 or 1, got {other}"
            ))),
        }
    }
}

/// One logged benchmark run. The unit of everything downstream.
///
/// `flops` and `energy_j` are absent when the corresponding probe was
/// disabled or failed; absence is data, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RunRecord {
    pub task_id: String,

    /// Which implementation produced the run (e.g. `sort::insertion`).
    #[serde(rename = "impl")]
    pub impl_ref: String,

    /// Scoring group label. `baseline` is reserved for the reference.
    pub variant: String,

    /// Zero-based index among the logged (non-warmup) runs of one invocation.
    pub run_idx: u32,

    pub runtime_s: f64,
    pub mem_kib: f64,
    pub flops: Option<u64>,
    pub energy_j: Option<f64>,

    #[serde(with = "run_flag")]
    #[schemars(with = "u8")]
    pub correct: bool,
}

impl RunRecord {
    /// Value of `metric` for this run, if the probe recorded one.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Runtime => Some(self.runtime_s),
            Metric::Memory => Some(self.mem_kib),
            Metric::Flops => self.flops.map(|f| f as f64),
            Metric::Energy => self.energy_j,
        }
    }
}

#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Runtime,
    Memory,
    Flops,
    Energy,
}

impl Metric {
    /// Fixed metric order used by every table and report.
    pub const ALL: [Metric; 4] = [Metric::Runtime, Metric::Memory, Metric::Flops, Metric::Energy];

    /// Run-store column name.
    pub fn key(self) -> &'static str {
        match self {
            Metric::Runtime => "runtime_s",
            Metric::Memory => "mem_kib",
            Metric::Flops => "flops",
            Metric::Energy => "energy_j",
        }
    }

    /// Column name in the percent-delta table.
    pub fn pd_key(self) -> &'static str {
        match self {
            Metric::Runtime => "pd_runtime",
            Metric::Memory => "pd_memory",
            Metric::Flops => "pd_flops",
            Metric::Energy => "pd_energy",
        }
    }

    pub fn display_unit(self) -> &'static str {
        match self {
            Metric::Runtime => "s",
            Metric::Memory => "KiB",
            Metric::Flops => "ops",
            Metric::Energy => "J",
        }
    }
}

/// Per-(task, variant) means over the run store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AggregateRow {
    pub task_id: String,
    pub variant: String,

    /// Number of runs in the group.
    pub runs: u32,

    pub mean_runtime_s: f64,
    pub mean_mem_kib: f64,

    /// Mean over runs where the value was present; absent when none were.
    pub mean_flops: Option<f64>,
    pub mean_energy_j: Option<f64>,

    /// True only if every run in the group was correct.
    #[serde(with = "run_flag")]
    #[schemars(with = "u8")]
    pub correct: bool,
}

impl AggregateRow {
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Runtime => Some(self.mean_runtime_s),
            Metric::Memory => Some(self.mean_mem_kib),
            Metric::Flops => self.mean_flops,
            Metric::Energy => self.mean_energy_j,
        }
    }
}

/// Percent deltas of one variant against the task's `baseline` variant.
///
/// Positive means the variant improved on the baseline. Rows for incorrect
/// variants are zeroed, as are metrics where no defined ratio exists.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PdRow {
    pub task_id: String,
    pub variant: String,
    pub pd_runtime: f64,
    pub pd_memory: f64,
    pub pd_flops: f64,
    pub pd_energy: f64,

    #[serde(with = "run_flag")]
    #[schemars(with = "u8")]
    pub correct: bool,
}

impl PdRow {
    pub fn pd(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Runtime => self.pd_runtime,
            Metric::Memory => self.pd_memory,
            Metric::Flops => self.pd_flops,
            Metric::Energy => self.pd_energy,
        }
    }
}

/// Green capacity: sum of positive percent deltas. Never negative.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GcRow {
    pub task_id: String,
    pub variant: String,
    pub gc: f64,

    #[serde(with = "run_flag")]
    #[schemars(with = "u8")]
    pub correct: bool,
}

// ----------------------------
// Significance results
// ----------------------------

/// Result of one statistical test.
///
/// `Undefined` is a first-class outcome: degenerate inputs (too few samples,
/// zero variance where the statistic needs spread, non-finite intermediates)
/// land here rather than in a panic or a silent zero.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Defined { statistic: f64, p_value: f64 },
    Undefined,
}

impl TestOutcome {
    pub fn defined(statistic: f64, p_value: f64) -> Self {
        TestOutcome::Defined { statistic, p_value }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, TestOutcome::Defined { .. })
    }

    pub fn statistic(self) -> Option<f64> {
        match self {
            TestOutcome::Defined { statistic, .. } => Some(statistic),
            TestOutcome::Undefined => None,
        }
    }

    pub fn p_value(self) -> Option<f64> {
        match self {
            TestOutcome::Defined { p_value, .. } => Some(p_value),
            TestOutcome::Undefined => None,
        }
    }

    /// Table encoding: undefined outcomes surface as NaN cells.
    pub fn statistic_or_nan(self) -> f64 {
        self.statistic().unwrap_or(f64::NAN)
    }

    pub fn p_value_or_nan(self) -> f64 {
        self.p_value().unwrap_or(f64::NAN)
    }
}

/// Welch and Mann-Whitney outcomes for one ordered variant pair.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PairwiseResult {
    pub task_id: String,
    pub metric: Metric,

    /// Lexicographically first variant of the pair.
    pub variant_a: String,
    pub variant_b: String,

    pub n_a: u32,
    pub n_b: u32,

    pub welch: TestOutcome,
    pub mann_whitney: TestOutcome,
}

/// One-way ANOVA outcome across all of a task's variants.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct OmnibusResult {
    pub task_id: String,
    pub metric: Metric,

    /// Group labels in first-seen store order.
    pub groups: Vec<String>,

    pub anova: TestOutcome,
}

/// Flat CSV row for the pairwise stats table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PairwiseStatsRow {
    pub task_id: String,
    pub metric: String,
    pub variant_a: String,
    pub variant_b: String,
    pub n_a: u32,
    pub n_b: u32,
    pub welch_t: f64,
    pub welch_p: f64,
    pub mw_u: f64,
    pub mw_p: f64,
}

impl From<&PairwiseResult> for PairwiseStatsRow {
    fn from(r: &PairwiseResult) -> Self {
        PairwiseStatsRow {
            task_id: r.task_id.clone(),
            metric: r.metric.key().to_string(),
            variant_a: r.variant_a.clone(),
            variant_b: r.variant_b.clone(),
            n_a: r.n_a,
            n_b: r.n_b,
            welch_t: r.welch.statistic_or_nan(),
            welch_p: r.welch.p_value_or_nan(),
            mw_u: r.mann_whitney.statistic_or_nan(),
            mw_p: r.mann_whitney.p_value_or_nan(),
        }
    }
}

/// Flat CSV row for the omnibus (ANOVA) stats table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct OmnibusStatsRow {
    pub task_id: String,
    pub metric: String,

    /// Group labels joined with `|`, in first-seen store order.
    pub groups: String,

    pub group_count: u32,
    pub anova_f: f64,
    pub anova_p: f64,
}

impl From<&OmnibusResult> for OmnibusStatsRow {
    fn from(r: &OmnibusResult) -> Self {
        OmnibusStatsRow {
            task_id: r.task_id.clone(),
            metric: r.metric.key().to_string(),
            groups: r.groups.join("|"),
            group_count: r.groups.len() as u32,
            anova_f: r.anova.statistic_or_nan(),
            anova_p: r.anova.p_value_or_nan(),
        }
    }
}

// ----------------------------
// Carbon estimates
// ----------------------------

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CarbonParams {
    /// Power usage effectiveness multiplier applied to measured energy.
    pub pue: f64,

    /// Grid carbon intensity in grams CO2e per kWh.
    pub grid_intensity_g_per_kwh: f64,
}

impl Default for CarbonParams {
    fn default() -> Self {
        CarbonParams {
            pue: DEFAULT_PUE,
            grid_intensity_g_per_kwh: DEFAULT_GRID_INTENSITY_G_PER_KWH,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CarbonEstimate {
    pub kwh: f64,
    pub kg_co2e: f64,
}

/// Per-(task, variant) carbon summary row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CarbonRow {
    pub task_id: String,
    pub variant: String,

    /// Total measured energy over the group's runs, Joules.
    pub energy_j: f64,

    pub kwh: f64,
    pub kg_co2e: f64,
}

// ----------------------------
// Measure receipt
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunMeta {
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub host: HostInfo,
}

/// Receipt for one `measure` invocation: what ran, and the records appended.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MeasureReceipt {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunMeta,

    pub task_id: String,

    #[serde(rename = "impl")]
    pub impl_ref: String,

    pub variant: String,
    pub runs: u32,
    pub warmup: u32,

    /// Validation result stamped across every record of this invocation.
    #[serde(with = "run_flag")]
    #[schemars(with = "u8")]
    pub correct: bool,

    pub records: Vec<RunRecord>,
}

// ----------------------------
// Optional config file schema
// ----------------------------

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnergySource {
    #[default]
    None,
    Perf,
    Csv,
}

impl EnergySource {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(EnergySource::None),
            "perf" => Some(EnergySource::Perf),
            "csv" => Some(EnergySource::Csv),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EnergySource::None => "none",
            EnergySource::Perf => "perf",
            EnergySource::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfigFile>,
}

impl ConfigFile {
    /// Per-task override block, if the config carries one for `task_id`.
    pub fn task(&self, task_id: &str) -> Option<&TaskConfigFile> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup: Option<u32>,

    /// Run store path (stringified).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,

    /// Directory for derived score and stats tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flops_event: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_source: Option<EnergySource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_event: Option<String>,

    /// Energy CSV path, consulted when `energy_source = "csv"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_csv: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf_bin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pue: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_intensity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TaskConfigFile {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RunRecord {
        RunRecord {
            task_id: "inefficient_sort".to_string(),
            impl_ref: "sort::std".to_string(),
            variant: "candidate".to_string(),
            run_idx: 0,
            runtime_s: 0.125,
            mem_kib: 512.0,
            flops: Some(1_000_000),
            energy_j: None,
            correct: true,
        }
    }

    #[test]
    fn correct_flag_serializes_as_integer() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["correct"], serde_json::json!(1));
        assert_eq!(json["impl"], serde_json::json!("sort::std"));
        assert!(json["energy_j"].is_null());
    }

    #[test]
    fn correct_flag_rejects_other_integers() {
        let json = r#"{
            "task_id": "t", "impl": "i", "variant": "baseline", "run_idx": 0,
            "runtime_s": 1.0, "mem_kib": 1.0, "flops": null, "energy_j": null,
            "correct": 2
        }"#;
        let err = serde_json::from_str::<RunRecord>(json).unwrap_err();
        assert!(err.to_string().contains("must be 0 or 1"));
    }

    #[test]
    fn run_record_round_trips_through_json() {
        let json = serde_json::to_string(&record()).unwrap();
        let back: RunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn metric_keys_match_store_columns() {
        for metric in Metric::ALL {
            assert!(RUN_STORE_HEADER.contains(&metric.key()));
        }
    }

    #[test]
    fn test_outcome_serde_is_tagged() {
        let defined = serde_json::to_value(TestOutcome::defined(1.5, 0.25)).unwrap();
        assert_eq!(defined["status"], serde_json::json!("defined"));
        assert_eq!(defined["statistic"], serde_json::json!(1.5));

        let undefined = serde_json::to_value(TestOutcome::Undefined).unwrap();
        assert_eq!(undefined["status"], serde_json::json!("undefined"));
    }

    #[test]
    fn undefined_outcome_maps_to_nan_cells() {
        let row = PairwiseStatsRow::from(&PairwiseResult {
            task_id: "t".to_string(),
            metric: Metric::Runtime,
            variant_a: "baseline".to_string(),
            variant_b: "candidate".to_string(),
            n_a: 3,
            n_b: 3,
            welch: TestOutcome::defined(f64::INFINITY, 0.0),
            mann_whitney: TestOutcome::Undefined,
        });
        assert!(row.welch_t.is_infinite());
        assert_eq!(row.welch_p, 0.0);
        assert!(row.mw_u.is_nan());
        assert!(row.mw_p.is_nan());
        assert_eq!(row.metric, "runtime_s");
    }

    #[test]
    fn config_file_parses_from_toml() {
        let doc = r#"
            [defaults]
            runs = 5
            warmup = 1
            store = "results/runs.csv"
            energy_source = "perf"

            [[task]]
            id = "inefficient_sort"
            runs = 20
        "#;
        let config: ConfigFile = toml::from_str(doc).unwrap();
        assert_eq!(config.defaults.runs, Some(5));
        assert_eq!(config.defaults.energy_source, Some(EnergySource::Perf));
        assert_eq!(config.task("inefficient_sort").and_then(|t| t.runs), Some(20));
        assert!(config.task("unknown").is_none());
    }

    #[test]
    fn empty_config_defaults_cleanly() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn label() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_:-]{1,20}".prop_map(|s| s)
    }

    fn run_record_strategy() -> impl Strategy<Value = RunRecord> {
        (
            label(),
            label(),
            label(),
            0u32..100,
            0.0f64..1000.0,
            0.0f64..1e6,
            proptest::option::of(0u64..u64::MAX / 2),
            proptest::option::of(0.0f64..1e4),
            any::<bool>(),
        )
            .prop_map(
                |(task_id, impl_ref, variant, run_idx, runtime_s, mem_kib, flops, energy_j, correct)| {
                    RunRecord {
                        task_id,
                        impl_ref,
                        variant,
                        run_idx,
                        runtime_s,
                        mem_kib,
                        flops,
                        energy_j,
                        correct,
                    }
                },
            )
    }

    // Shortest-round-trip float formatting makes JSON exact for finite
    // values, so whole-struct equality is the right assertion here.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn run_record_json_round_trip(record in run_record_strategy()) {
            let json = serde_json::to_string(&record).unwrap();
            let back: RunRecord = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, record);
        }

        #[test]
        fn correct_flag_is_always_zero_or_one(record in run_record_strategy()) {
            let json = serde_json::to_value(&record).unwrap();
            let flag = json["correct"].as_u64().unwrap();
            prop_assert!(flag == 0 || flag == 1);
        }
    }
}
