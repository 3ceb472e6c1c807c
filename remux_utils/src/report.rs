//! Report Module
//!
//! End-of-run summaries. Printed to stdout so they survive any log filtering.

use crate::batch::BatchResult;
use std::time::Duration;

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

pub fn print_summary_report(result: &BatchResult, wall_time: Duration, operation_name: &str) {
    let finished = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  📊 {:<56} ║", format!("{} Summary Report", operation_name));
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  📁 Files Found:        {:>10}                           ║", result.total);
    println!("║  ✅ Succeeded:          {:>10}                           ║", result.succeeded);
    println!("║  ❌ Failed:             {:>10}                           ║", result.failed);
    println!(
        "║  📈 Success Rate:       {:>9.1}%                           ║",
        result.success_rate()
    );
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  ⏱️  Wall Time:          {:>10}                           ║",
        format_duration(wall_time)
    );
    if result.total > 0 {
        let avg_time = wall_time.as_secs_f64() / result.total as f64;
        println!(
            "║  ⏱️  Avg Time/File:      {:>9.2}s                           ║",
            avg_time
        );
    }
    println!("║  🕒 Finished:  {:>19}                           ║", finished);
    println!("╚══════════════════════════════════════════════════════════════╝");
}

/// One-line summary of the job statistics counters.
pub fn format_stats_line(
    attempted: u64,
    succeeded: u64,
    failed: u64,
    processing_time: Duration,
) -> String {
    format!(
        "attempted={} succeeded={} failed={} processing_time={}",
        attempted,
        succeeded,
        failed,
        format_duration(processing_time)
    )
}
