//! `json_data_normalizer`: flatten nested order records into flat rows.
//!
//! Each input record carries `id`, `timestamp`, a nested `user`, and an
//! `items` array; the output is one row per item. `records::reparse` is
//! the wasteful serialize-and-parse baseline, `records::direct` extracts
//! fields in place.

use crate::XorShift;
use greenbench_app::WorkloadRegistry;
use serde_json::{Value, json};
use std::hint::black_box;

pub const TASK_ID: &str = "json_data_normalizer";

const BENCH_RECORDS: usize = 2_000;
const BENCH_SEED: u64 = 42;
const PROBE_RECORDS: usize = 100;
const PROBE_SEED: u64 = 7;

fn input(n: usize, seed: u64) -> Vec<Value> {
    let mut rng = XorShift::new(seed);
    (0..n)
        .map(|i| {
            let item_count = rng.below(4);
            let items: Vec<Value> = (0..item_count)
                .map(|k| {
                    json!({
                        "sku": format!("SKU-{:04}", rng.below(500)),
                        "qty": 1 + rng.below(9),
                        "note": format!("line {k}"),
                    })
                })
                .collect();
            json!({
                "id": i,
                "timestamp": format!("2026-01-01T00:{:02}:{:02}", i % 60, rng.below(60)),
                "user": { "id": rng.below(1000), "name": format!("user{}", rng.below(50)) },
                "items": items,
            })
        })
        .collect()
}

/// Baseline: round-trips every record and item through a JSON string
/// before reading any field out of it.
pub fn normalize_reparse(data: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for rec in data {
        let rec: Value =
            serde_json::from_str(&serde_json::to_string(rec).unwrap_or_default())
                .unwrap_or(Value::Null);
        let items = rec.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        for item in items {
            let item: Value =
                serde_json::from_str(&serde_json::to_string(&item).unwrap_or_default())
                    .unwrap_or(Value::Null);
            out.push(json!({
                "record_id": rec.get("id").cloned().unwrap_or(Value::Null),
                "timestamp": rec.get("timestamp").cloned().unwrap_or(Value::Null),
                "user_id": rec.pointer("/user/id").cloned().unwrap_or(Value::Null),
                "user_name": rec.pointer("/user/name").cloned().unwrap_or(Value::Null),
                "sku": item.get("sku").cloned().unwrap_or(Value::Null),
                "qty": item.get("qty").cloned().unwrap_or(Value::Null),
            }));
        }
    }
    out
}

/// Direct extraction: one pass, no intermediate encodings.
pub fn normalize_direct(data: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for rec in data {
        let Some(items) = rec.get("items").and_then(Value::as_array) else {
            continue;
        };
        let record_id = rec.get("id").cloned().unwrap_or(Value::Null);
        let timestamp = rec.get("timestamp").cloned().unwrap_or(Value::Null);
        let user_id = rec.pointer("/user/id").cloned().unwrap_or(Value::Null);
        let user_name = rec.pointer("/user/name").cloned().unwrap_or(Value::Null);
        for item in items {
            out.push(json!({
                "record_id": record_id.clone(),
                "timestamp": timestamp.clone(),
                "user_id": user_id.clone(),
                "user_name": user_name.clone(),
                "sku": item.get("sku").cloned().unwrap_or(Value::Null),
                "qty": item.get("qty").cloned().unwrap_or(Value::Null),
            }));
        }
    }
    out
}

fn valid(rows: &[Value], data: &[Value]) -> bool {
    let expected: usize = data
        .iter()
        .filter_map(|rec| rec.get("items").and_then(Value::as_array))
        .map(Vec::len)
        .sum();
    rows.len() == expected
        && rows.iter().all(|row| {
            row.get("record_id").is_some()
                && row.get("sku").map(Value::is_string).unwrap_or(false)
                && row.get("qty").map(Value::is_u64).unwrap_or(false)
        })
}

pub fn register(registry: &mut WorkloadRegistry) {
    registry.register(
        TASK_ID,
        "records::reparse",
        || {
            let data = input(BENCH_RECORDS, BENCH_SEED);
            Box::new(move || {
                black_box(normalize_reparse(&data));
            })
        },
        || {
            let data = input(PROBE_RECORDS, PROBE_SEED);
            valid(&normalize_reparse(&data), &data)
        },
    );
    registry.register(
        TASK_ID,
        "records::direct",
        || {
            let data = input(BENCH_RECORDS, BENCH_SEED);
            Box::new(move || {
                black_box(normalize_direct(&data));
            })
        },
        || {
            let data = input(PROBE_RECORDS, PROBE_SEED);
            valid(&normalize_direct(&data), &data)
        },
    );
}
