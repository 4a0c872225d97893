//! `log_file_parser`: group ERROR lines by their error code.
//!
//! Input is synthetic log text with INFO/WARN noise and `ERROR E<code>:`
//! lines. `logs::char_scan` walks every character of every line;
//! `logs::split` takes the single-split fast path.

use crate::XorShift;
use greenbench_app::WorkloadRegistry;
use std::collections::BTreeMap;
use std::hint::black_box;

pub const TASK_ID: &str = "log_file_parser";

const BENCH_LINES: usize = 20_000;
const BENCH_SEED: u64 = 42;
const PROBE_LINES: usize = 500;
const PROBE_SEED: u64 = 7;

pub type ErrorGroups = BTreeMap<String, Vec<String>>;

fn log_lines(n: usize, seed: u64) -> Vec<String> {
    let mut rng = XorShift::new(seed);
    (0..n)
        .map(|i| match rng.below(4) {
            0 => format!("2026-01-{:02}T10:{:02}:00 INFO request {} served", 1 + i % 28, i % 60, i),
            1 => format!("2026-01-{:02}T10:{:02}:00 WARN queue depth {}", 1 + i % 28, i % 60, rng.below(100)),
            2 => format!(
                "2026-01-{:02}T10:{:02}:00 ERROR E{:03}: upstream timeout on request {}",
                1 + i % 28,
                i % 60,
                rng.below(8),
                i
            ),
            _ => format!("2026-01-{:02}T10:{:02}:00 DEBUG heartbeat {}", 1 + i % 28, i % 60, i),
        })
        .collect()
}

/// Naive pass: scans every character of every line looking for the ERROR
/// marker, rebuilding candidate tokens as it goes.
pub fn parse_char_scan(lines: &[String]) -> ErrorGroups {
    let mut groups = ErrorGroups::new();
    for line in lines {
        let chars: Vec<char> = line.chars().collect();
        let marker: Vec<char> = "ERROR ".chars().collect();
        let mut at = None;
        for start in 0..chars.len() {
            let mut matched = true;
            for (k, m) in marker.iter().enumerate() {
                if chars.get(start + k) != Some(m) {
                    matched = false;
                    break;
                }
            }
            if matched {
                at = Some(start + marker.len());
                break;
            }
        }
        let Some(mut pos) = at else { continue };
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        let mut code = String::new();
        while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
            code.push(chars[pos]);
            pos += 1;
        }
        if code.starts_with('E') && code.len() > 1 {
            groups.entry(code).or_default().push(line.clone());
        }
    }
    groups
}

/// Single split around the ERROR marker, then one bounded token scan.
pub fn parse_split(lines: &[String]) -> ErrorGroups {
    let mut groups = ErrorGroups::new();
    for line in lines {
        let Some((_, after)) = line.split_once("ERROR ") else {
            continue;
        };
        let after = after.trim_start();
        let code: String = after
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if code.starts_with('E') && code.len() > 1 {
            groups.entry(code).or_default().push(line.clone());
        }
    }
    groups
}

fn valid(groups: &ErrorGroups, lines: &[String]) -> bool {
    let error_lines = lines.iter().filter(|l| l.contains("ERROR E")).count();
    let grouped: usize = groups.values().map(Vec::len).sum();
    grouped == error_lines
        && groups.keys().all(|code| code.starts_with('E'))
        && groups
            .iter()
            .all(|(code, ls)| ls.iter().all(|l| l.contains(&format!("ERROR {code}"))))
}

pub fn register(registry: &mut WorkloadRegistry) {
    registry.register(
        TASK_ID,
        "logs::char_scan",
        || {
            let lines = log_lines(BENCH_LINES, BENCH_SEED);
            Box::new(move || {
                black_box(parse_char_scan(&lines));
            })
        },
        || {
            let lines = log_lines(PROBE_LINES, PROBE_SEED);
            valid(&parse_char_scan(&lines), &lines)
        },
    );
    registry.register(
        TASK_ID,
        "logs::split",
        || {
            let lines = log_lines(BENCH_LINES, BENCH_SEED);
            Box::new(move || {
                black_box(parse_split(&lines));
            })
        },
        || {
            let lines = log_lines(PROBE_LINES, PROBE_SEED);
            valid(&parse_split(&lines), &lines)
        },
    );
}
