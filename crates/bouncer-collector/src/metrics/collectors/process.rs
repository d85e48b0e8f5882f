use std::sync::Arc;

use bouncer_common::error::Result;

use crate::metrics::registry::{GaugeMetric, MetricsRegistry};

// USER_HZ. The kernel reports `/proc/<pid>/stat` times in these units and
// it is 100 on every mainstream Linux target.
const CLOCK_TICKS_PER_SECOND: f64 = 100.0;

/// Standard `process_*` metrics read from `/proc`, refreshed before each
/// render.
pub struct ProcessMetrics {
    cpu_seconds: Arc<GaugeMetric>,
    start_time: Arc<GaugeMetric>,
    resident_memory_bytes: Arc<GaugeMetric>,
    virtual_memory_bytes: Arc<GaugeMetric>,
    threads: Arc<GaugeMetric>,
    open_fds: Arc<GaugeMetric>,
    max_fds: Arc<GaugeMetric>,
}

impl ProcessMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        Ok(Self {
            cpu_seconds: registry.register_float_counter(
                "process_cpu_seconds_total",
                "Total user and system CPU time spent in seconds.",
                &[],
            )?,
            start_time: registry.register_gauge(
                "process_start_time_seconds",
                "Start time of the process since unix epoch in seconds.",
                &[],
            )?,
            resident_memory_bytes: registry.register_gauge(
                "process_resident_memory_bytes",
                "Resident memory size in bytes.",
                &[],
            )?,
            virtual_memory_bytes: registry.register_gauge(
                "process_virtual_memory_bytes",
                "Virtual memory size in bytes.",
                &[],
            )?,
            threads: registry.register_gauge(
                "process_threads",
                "Number of OS threads in the process.",
                &[],
            )?,
            open_fds: registry.register_gauge(
                "process_open_fds",
                "Number of open file descriptors.",
                &[],
            )?,
            max_fds: registry.register_gauge(
                "process_max_fds",
                "Maximum number of open file descriptors.",
                &[],
            )?,
        })
    }

    pub fn refresh(&self) {
        if let Some(stat) = read_stat() {
            self.cpu_seconds.set(&[], stat.cpu_seconds());
            if let Some(boot_time) = read_boot_time() {
                self.start_time.set(&[], stat.start_time_seconds(boot_time));
            }
        }

        let status = read_status();
        if let Some(bytes) = status.resident_bytes {
            self.resident_memory_bytes.set(&[], bytes as f64);
        }
        if let Some(bytes) = status.virtual_bytes {
            self.virtual_memory_bytes.set(&[], bytes as f64);
        }
        if let Some(threads) = status.threads {
            self.threads.set(&[], threads as f64);
        }
        if let Some(fds) = count_open_fds() {
            self.open_fds.set(&[], fds as f64);
        }
        if let Some(limit) = read_max_fds() {
            self.max_fds.set(&[], limit as f64);
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct ProcStatus {
    resident_bytes: Option<u64>,
    virtual_bytes: Option<u64>,
    threads: Option<u64>,
}

/// Clock tick counters from `/proc/self/stat`.
#[derive(Debug, PartialEq)]
struct ProcStat {
    utime_ticks: u64,
    stime_ticks: u64,
    start_ticks: u64,
}

impl ProcStat {
    fn cpu_seconds(&self) -> f64 {
        self.utime_ticks.saturating_add(self.stime_ticks) as f64 / CLOCK_TICKS_PER_SECOND
    }

    fn start_time_seconds(&self, boot_time: u64) -> f64 {
        boot_time as f64 + self.start_ticks as f64 / CLOCK_TICKS_PER_SECOND
    }
}

#[cfg(target_os = "linux")]
fn read_status() -> ProcStatus {
    std::fs::read_to_string("/proc/self/status")
        .map(|status| parse_status(&status))
        .unwrap_or_default()
}

#[cfg(not(target_os = "linux"))]
fn read_status() -> ProcStatus {
    ProcStatus::default()
}

#[cfg(target_os = "linux")]
fn read_stat() -> Option<ProcStat> {
    parse_stat(&std::fs::read_to_string("/proc/self/stat").ok()?)
}

#[cfg(not(target_os = "linux"))]
fn read_stat() -> Option<ProcStat> {
    None
}

#[cfg(target_os = "linux")]
fn read_boot_time() -> Option<u64> {
    parse_boot_time(&std::fs::read_to_string("/proc/stat").ok()?)
}

#[cfg(not(target_os = "linux"))]
fn read_boot_time() -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn read_max_fds() -> Option<u64> {
    parse_max_fds(&std::fs::read_to_string("/proc/self/limits").ok()?)
}

#[cfg(not(target_os = "linux"))]
fn read_max_fds() -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn count_open_fds() -> Option<usize> {
    std::fs::read_dir("/proc/self/fd")
        .ok()
        .map(|entries| entries.count())
}

#[cfg(not(target_os = "linux"))]
fn count_open_fds() -> Option<usize> {
    None
}

fn parse_status(status: &str) -> ProcStatus {
    let mut parsed = ProcStatus::default();
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            parsed.resident_bytes = first_number(rest).and_then(|kb| kb.checked_mul(1024));
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            parsed.virtual_bytes = first_number(rest).and_then(|kb| kb.checked_mul(1024));
        } else if let Some(rest) = line.strip_prefix("Threads:") {
            parsed.threads = first_number(rest);
        }
    }
    parsed
}

// The command name may contain spaces and parentheses, so fields are
// counted from the last `)`. Index 0 is the state (field 3).
fn parse_stat(stat: &str) -> Option<ProcStat> {
    let (_, rest) = stat.rsplit_once(')')?;
    let fields = rest.split_whitespace().collect::<Vec<_>>();
    let field = |index: usize| fields.get(index)?.parse::<u64>().ok();

    Some(ProcStat {
        utime_ticks: field(11)?,
        stime_ticks: field(12)?,
        start_ticks: field(19)?,
    })
}

fn parse_boot_time(stat: &str) -> Option<u64> {
    stat.lines()
        .find_map(|line| line.strip_prefix("btime"))
        .and_then(first_number)
}

// Soft limit of the `Max open files` row. `unlimited` yields `None`.
fn parse_max_fds(limits: &str) -> Option<u64> {
    limits
        .lines()
        .find_map(|line| line.strip_prefix("Max open files"))
        .and_then(first_number)
}

fn first_number(rest: &str) -> Option<u64> {
    rest.split_whitespace()
        .next()
        .and_then(|value| value.parse::<u64>().ok())
}
