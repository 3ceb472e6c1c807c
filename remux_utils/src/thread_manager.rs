//! Worker budget for batch runs
//!
//! Each remux job is a single ffmpeg process doing stream copy, which is I/O
//! bound. One core is left for the orchestrator and the rest of the system.

/// `max(1, logical_cpus - 1)`
pub fn default_worker_count() -> usize {
    worker_count_for(num_cpus::get())
}

pub fn worker_count_for(cpu_count: usize) -> usize {
    cpu_count.saturating_sub(1).max(1)
}

/// Honors an explicit cap when it is positive, otherwise falls back to the default.
pub fn resolve_worker_count(requested: Option<usize>) -> usize {
    match requested {
        Some(n) if n > 0 => n,
        _ => default_worker_count(),
    }
}
