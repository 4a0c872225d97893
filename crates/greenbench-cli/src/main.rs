use anyhow::Context;
use clap::{Parser, Subcommand};
use greenbench_adapters::alloc::{AllocProbe, TrackingAllocator};
use greenbench_adapters::{EnergyCsv, PerfStatProbe, StdProcessRunner};
use greenbench_app::{
    CarbonUseCase, EnergyPlan, MeasureRequest, MeasureUseCase, ScoreUseCase, StatsUseCase,
    SystemClock, WorkloadResolver,
};
use greenbench_store::{CsvStore, RunStore, write_table};
use greenbench_tasks::builtin_registry;
use greenbench_types::{
    CarbonParams, ConfigFile, DEFAULT_ENERGY_EVENT, DEFAULT_FLOPS_EVENT, DEFAULT_RUNS,
    DEFAULT_WARMUP, EnergySource, OmnibusStatsRow, PairwiseStatsRow, RunRecord, ToolInfo,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// Peak-memory numbers come from allocation tracking, so the binary that
// executes workloads must install the wrapper itself.
#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator::new();

const DEFAULT_STORE: &str = "greenbench_runs.csv";
const DEFAULT_OUT_DIR: &str = "greenbench_out";
const CONFIG_FILE: &str = "greenbench.toml";

#[derive(Debug, Parser)]
#[command(
    name = "greenbench",
    version,
    about = "Runtime, memory, FLOP, and energy benchmarking with green-capacity scoring"
)]
struct Cli {
    /// Config file (default: ./greenbench.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Measure one task implementation and append runs to the store.
    Measure {
        /// Task identifier (see `greenbench tasks`)
        #[arg(long = "task")]
        task_id: String,

        /// Implementation reference, e.g. `sort::std`
        #[arg(long = "impl")]
        impl_ref: String,

        /// Variant label for scoring; `baseline` is the reference
        #[arg(long, default_value = "candidate")]
        variant: String,

        /// Measured (logged) runs
        #[arg(long)]
        runs: Option<u32>,

        /// Warmup executions, observed but never persisted
        #[arg(long)]
        warmup: Option<u32>,

        /// Run store path
        #[arg(long)]
        store: Option<PathBuf>,

        /// Disable hardware FLOP-counter sampling
        #[arg(long, default_value_t = false)]
        no_flops: bool,

        /// Profiler event for FLOP counts
        #[arg(long)]
        flops_event: Option<String>,

        /// Energy source: none | perf | csv
        #[arg(long)]
        energy: Option<String>,

        /// Profiler event for energy when the source is `perf`
        #[arg(long)]
        energy_event: Option<String>,

        /// Per-run energy table when the source is `csv`
        #[arg(long)]
        energy_csv: Option<PathBuf>,

        /// Profiler binary
        #[arg(long)]
        perf_bin: Option<String>,

        /// Write a JSON measure receipt here
        #[arg(long)]
        receipt: Option<PathBuf>,

        /// Pretty-print the receipt
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// Run one workload once; the profiler target for counter sampling.
    #[command(hide = true)]
    Exec {
        #[arg(long = "task")]
        task_id: String,

        #[arg(long = "impl")]
        impl_ref: String,
    },

    /// Aggregate the store and write percent-delta and green-capacity tables.
    Score {
        #[arg(long)]
        store: Option<PathBuf>,

        /// Directory for derived tables
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Run pairwise and omnibus significance tests over the store.
    Stats {
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Summarize stored energy as kWh and kg CO2e per task and variant.
    Carbon {
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Power usage effectiveness multiplier
        #[arg(long)]
        pue: Option<f64>,

        /// Grid carbon intensity in gCO2e/kWh
        #[arg(long)]
        grid_intensity: Option<f64>,
    },

    /// List registered tasks and implementations.
    Tasks,
}

fn main() -> ExitCode {
    if let Err(err) = real_main() {
        eprintln!("{err:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Measure {
            task_id,
            impl_ref,
            variant,
            runs,
            warmup,
            store,
            no_flops,
            flops_event,
            energy,
            energy_event,
            energy_csv,
            perf_bin,
            receipt,
            pretty,
        } => {
            let task_cfg = config.task(&task_id);
            let runs = runs
                .or(task_cfg.and_then(|t| t.runs))
                .or(config.defaults.runs)
                .unwrap_or(DEFAULT_RUNS);
            let warmup = warmup
                .or(task_cfg.and_then(|t| t.warmup))
                .or(config.defaults.warmup)
                .unwrap_or(DEFAULT_WARMUP);
            let store_path = store_path(store, &config);

            let flops_event = if no_flops {
                None
            } else {
                Some(
                    flops_event
                        .or_else(|| config.defaults.flops_event.clone())
                        .unwrap_or_else(|| DEFAULT_FLOPS_EVENT.to_string()),
                )
            };

            let energy_source = match energy.as_deref() {
                Some(name) => EnergySource::from_name(name)
                    .with_context(|| format!("invalid energy source `{name}` (expected none|perf|csv)"))?,
                None => config.defaults.energy_source.unwrap_or_default(),
            };
            let energy_plan = match energy_source {
                EnergySource::None => EnergyPlan::None,
                EnergySource::Perf => EnergyPlan::Perf {
                    event: energy_event
                        .or_else(|| config.defaults.energy_event.clone())
                        .unwrap_or_else(|| DEFAULT_ENERGY_EVENT.to_string()),
                },
                EnergySource::Csv => {
                    let path = energy_csv
                        .or_else(|| config.defaults.energy_csv.clone().map(PathBuf::from))
                        .context("energy source `csv` needs --energy-csv or a config entry")?;
                    EnergyPlan::Csv(
                        EnergyCsv::load(&path)
                            .with_context(|| format!("failed to load {}", path.display()))?,
                    )
                }
            };

            let perf_bin = perf_bin
                .or_else(|| config.defaults.perf_bin.clone())
                .unwrap_or_else(|| "perf".to_string());

            let profile_target = std::env::current_exe().ok().map(|exe| {
                vec![
                    exe.to_string_lossy().into_owned(),
                    "exec".to_string(),
                    "--task".to_string(),
                    task_id.clone(),
                    "--impl".to_string(),
                    impl_ref.clone(),
                ]
            });

            let registry = builtin_registry();
            let usecase = MeasureUseCase::new(
                AllocProbe,
                PerfStatProbe::new(StdProcessRunner, perf_bin),
                SystemClock,
                tool_info(),
            );
            let mut store = CsvStore::new(&store_path);

            let outcome = usecase.execute(
                &registry,
                &mut store,
                MeasureRequest {
                    task_id,
                    impl_ref,
                    variant,
                    runs,
                    warmup,
                    flops_event,
                    energy: energy_plan,
                    profile_target,
                },
            )?;

            for (i, w) in outcome.warmups.iter().enumerate() {
                eprintln!(
                    "warmup {i}: {:.6} s, {:.1} KiB (discarded)",
                    w.runtime_s, w.mem_kib
                );
            }
            for record in &outcome.receipt.records {
                println!("run {}: {}", record.run_idx, format_record(record));
            }
            println!(
                "{} runs of {}/{} appended to {}",
                outcome.receipt.records.len(),
                outcome.receipt.task_id,
                outcome.receipt.impl_ref,
                store_path.display()
            );

            if let Some(path) = receipt {
                write_json(&path, &outcome.receipt, pretty)?;
            }

            Ok(())
        }

        Command::Exec { task_id, impl_ref } => {
            let registry = builtin_registry();
            let mut workload = registry
                .resolve(&task_id, &impl_ref)
                .with_context(|| format!("no workload for task `{task_id}`"))?;
            workload();
            Ok(())
        }

        Command::Score { store, out_dir } => {
            let store_path = store_path(store, &config);
            let out_dir = out_dir_path(out_dir, &config);
            let records = read_store(&store_path)?;

            let outcome = ScoreUseCase::execute(&records)?;
            write_table(&out_dir.join("pd_table.csv"), &outcome.pd_rows)?;
            write_table(&out_dir.join("gc_table.csv"), &outcome.gc_rows)?;

            for (agg, gc) in outcome.aggregates.iter().zip(&outcome.gc_rows) {
                println!(
                    "{}/{}: gc={:.4} correct={} runs={}",
                    gc.task_id,
                    gc.variant,
                    gc.gc,
                    u8::from(gc.correct),
                    agg.runs
                );
            }
            println!(
                "wrote {} and {}",
                out_dir.join("pd_table.csv").display(),
                out_dir.join("gc_table.csv").display()
            );
            Ok(())
        }

        Command::Stats { store, out_dir } => {
            let store_path = store_path(store, &config);
            let out_dir = out_dir_path(out_dir, &config);
            let records = read_store(&store_path)?;

            let outcome = StatsUseCase::execute(&records);
            let pairwise: Vec<PairwiseStatsRow> =
                outcome.pairwise.iter().map(PairwiseStatsRow::from).collect();
            let omnibus: Vec<OmnibusStatsRow> =
                outcome.omnibus.iter().map(OmnibusStatsRow::from).collect();

            write_table(&out_dir.join("pairwise_stats.csv"), &pairwise)?;
            write_table(&out_dir.join("anova_stats.csv"), &omnibus)?;

            println!(
                "{} pairwise comparisons, {} omnibus tests -> {}",
                pairwise.len(),
                omnibus.len(),
                out_dir.display()
            );
            Ok(())
        }

        Command::Carbon {
            store,
            out_dir,
            pue,
            grid_intensity,
        } => {
            let store_path = store_path(store, &config);
            let out_dir = out_dir_path(out_dir, &config);
            let records = read_store(&store_path)?;

            let params = CarbonParams {
                pue: pue.or(config.defaults.pue).unwrap_or(CarbonParams::default().pue),
                grid_intensity_g_per_kwh: grid_intensity
                    .or(config.defaults.grid_intensity)
                    .unwrap_or(CarbonParams::default().grid_intensity_g_per_kwh),
            };

            let rows = CarbonUseCase::execute(&records, &params);
            if rows.is_empty() {
                println!("no stored runs carry energy readings");
                return Ok(());
            }

            write_table(&out_dir.join("carbon_table.csv"), &rows)?;
            for row in &rows {
                println!(
                    "{}/{}: {:.3} J = {:.9} kWh = {:.9} kgCO2e",
                    row.task_id, row.variant, row.energy_j, row.kwh, row.kg_co2e
                );
            }
            Ok(())
        }

        Command::Tasks => {
            let registry = builtin_registry();
            let tasks: Vec<String> = registry.task_ids().map(str::to_string).collect();
            for task in &tasks {
                println!("{task}");
                for impl_ref in registry.impls(task) {
                    println!("  {impl_ref}");
                }
            }
            Ok(())
        }
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "greenbench".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ConfigFile> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(CONFIG_FILE), false),
    };
    if !path.exists() {
        if required {
            anyhow::bail!("config file {} not found", path.display());
        }
        return Ok(ConfigFile::default());
    }
    let text =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

fn store_path(flag: Option<PathBuf>, config: &ConfigFile) -> PathBuf {
    flag.or_else(|| config.defaults.store.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE))
}

fn out_dir_path(flag: Option<PathBuf>, config: &ConfigFile) -> PathBuf {
    flag.or_else(|| config.defaults.out_dir.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR))
}

fn read_store(path: &Path) -> anyhow::Result<Vec<RunRecord>> {
    let records = CsvStore::new(path)
        .read_all()
        .with_context(|| format!("failed to read run store {}", path.display()))?;
    Ok(records)
}

fn format_record(record: &RunRecord) -> String {
    let flops = record
        .flops
        .map(|f| f.to_string())
        .unwrap_or_else(|| "-".to_string());
    let energy = record
        .energy_j
        .map(|j| format!("{j:.3} J"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:.6} s, {:.1} KiB, flops {}, energy {}, correct {}",
        record.runtime_s,
        record.mem_kib,
        flops,
        energy,
        u8::from(record.correct)
    )
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    atomic_write(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = parent.to_path_buf();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
