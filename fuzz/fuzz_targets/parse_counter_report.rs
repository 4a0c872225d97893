#![no_main]

use libfuzzer_sys::fuzz_target;

// Profiler stderr is attacker-shaped text as far as the parser is
// concerned: arbitrary lines, locales, and counter names. The first input
// line doubles as the event name; the rest is the report. Parsing must
// never panic, and a miss comes back as None rather than garbage.
fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let (event, report) = s.split_once('\n').unwrap_or(("energy-pkg", s));
        if let Some(value) = greenbench_adapters::parse_counter_report(report, event) {
            assert!(!value.is_nan());
        }
    }
});
