//! Integration tests for `greenbench score`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn greenbench() -> Command {
    Command::cargo_bin("greenbench").expect("failed to find greenbench binary")
}

const HEADER: &str = "task_id,impl,variant,run_idx,runtime_s,mem_kib,flops,energy_j,correct";

fn seed_store(path: &Path, rows: &[&str]) {
    let mut text = HEADER.to_string();
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    fs::write(path, text).unwrap();
}

#[test]
fn score_writes_pd_and_gc_tables() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("runs.csv");
    let out = dir.path().join("out");
    seed_store(
        &store,
        &[
            "sort,sort::insertion,baseline,0,1.0,100.0,,,1",
            "sort,sort::insertion,baseline,1,1.0,100.0,,,1",
            "sort,sort::std,fast,0,0.5,100.0,,,1",
            "sort,sort::std,fast,1,0.5,100.0,,,1",
        ],
    );

    greenbench()
        .arg("score")
        .arg("--store")
        .arg(&store)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("sort/fast: gc=0.5000 correct=1 runs=2"))
        .stdout(predicate::str::contains("sort/baseline: gc=0.0000"));

    let pd = fs::read_to_string(out.join("pd_table.csv")).unwrap();
    assert!(pd.starts_with("task_id,variant,pd_runtime,pd_memory,pd_flops,pd_energy,correct"));
    assert!(pd.contains("sort,fast,0.5,0.0,0.0,0.0,1"));
    assert!(pd.contains("sort,baseline,0.0,0.0,0.0,0.0,1"));

    let gc = fs::read_to_string(out.join("gc_table.csv")).unwrap();
    assert!(gc.starts_with("task_id,variant,gc,correct"));
    assert!(gc.contains("sort,fast,0.5,1"));
}

#[test]
fn incorrect_variant_scores_zero_despite_faster_runs() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("runs.csv");
    let out = dir.path().join("out");
    seed_store(
        &store,
        &[
            "sort,sort::insertion,baseline,0,1.0,100.0,,,1",
            "sort,sort::insertion,baseline,1,1.0,100.0,,,1",
            "sort,sort::std,fast,0,0.5,100.0,,,0",
            "sort,sort::std,fast,1,0.5,100.0,,,0",
        ],
    );

    greenbench()
        .arg("score")
        .arg("--store")
        .arg(&store)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("sort/fast: gc=0.0000 correct=0"));

    let gc = fs::read_to_string(out.join("gc_table.csv")).unwrap();
    assert!(gc.contains("sort,fast,0.0,0"));
}

#[test]
fn zero_runtime_baseline_never_divides() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("runs.csv");
    let out = dir.path().join("out");
    seed_store(
        &store,
        &[
            "t,i,baseline,0,0.0,0.0,,,1",
            "t,i,fast,0,1.0,1.0,,,1",
        ],
    );

    greenbench()
        .arg("score")
        .arg("--store")
        .arg(&store)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success();

    let pd = fs::read_to_string(out.join("pd_table.csv")).unwrap();
    assert!(pd.contains("t,fast,0.0,0.0,0.0,0.0,1"));
    assert!(!pd.contains("NaN"));
}

#[test]
fn score_on_a_missing_store_is_fatal() {
    let dir = tempdir().unwrap();
    greenbench()
        .arg("score")
        .arg("--store")
        .arg(dir.path().join("absent.csv"))
        .arg("--out-dir")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to read run store"));
}

#[test]
fn score_is_idempotent_across_reruns() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("runs.csv");
    let out = dir.path().join("out");
    seed_store(
        &store,
        &[
            "sort,i,baseline,0,2.0,100.0,,,1",
            "sort,i,fast,0,1.0,50.0,,,1",
        ],
    );

    let run = || {
        greenbench()
            .arg("score")
            .arg("--store")
            .arg(&store)
            .arg("--out-dir")
            .arg(&out)
            .assert()
            .success();
        fs::read_to_string(out.join("gc_table.csv")).unwrap()
    };
    assert_eq!(run(), run());
}
