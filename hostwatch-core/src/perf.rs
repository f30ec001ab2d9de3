use crate::csv_log::CsvLog;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, ProcessRefreshKind, RefreshKind, System};

pub const PERFORMANCE_LOG_HEADER: &[&str] = &[
    "timestamp",
    "cpu_percent",
    "memory_percent",
    "disk_percent",
    "load_1",
    "load_5",
    "load_15",
    "uptime_secs",
    "process_count",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub timestamp: DateTime<Local>,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
    pub load_1: f64,
    pub load_5: f64,
    pub load_15: f64,
    pub uptime_secs: u64,
    pub process_count: usize,
}

impl PerformanceSample {
    /// Plain-text status block printed on every sample.
    pub fn status_report(&self) -> String {
        let uptime = self.uptime_secs;
        let (days, rem) = (uptime / 86_400, uptime % 86_400);
        let (hours, minutes, seconds) = (rem / 3600, (rem % 3600) / 60, rem % 60);
        let uptime = if days > 0 {
            format!("{days} days, {hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{hours}:{minutes:02}:{seconds:02}")
        };

        let mut report = format!(
            "--- System Status Report {} ---\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        report.push_str(&format!("Uptime: {uptime}\n"));
        report.push_str(&format!(
            "Load Average: {:.2}, {:.2}, {:.2}\n",
            self.load_1, self.load_5, self.load_15
        ));
        report.push_str(&format!("Total Processes: {}\n", self.process_count));
        report.push_str(&format!(
            "CPU: {:.1}% | Mem: {:.1}% | Disk: {:.1}%\n",
            self.cpu_percent, self.memory_percent, self.disk_percent
        ));
        report
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.1}", self.cpu_percent),
            format!("{:.1}", self.memory_percent),
            format!("{:.1}", self.disk_percent),
            format!("{:.2}", self.load_1),
            format!("{:.2}", self.load_5),
            format!("{:.2}", self.load_15),
            self.uptime_secs.to_string(),
            self.process_count.to_string(),
        ]
    }
}

/// Samples host-wide CPU, memory, disk and process figures.
pub struct PerformanceTracker {
    system: System,
    disks: Disks,
    mount_point: PathBuf,
}

impl PerformanceTracker {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::everything()),
        );

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            mount_point: mount_point.into(),
        }
    }

    /// Take one sample. Blocks for about [`sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`]
    /// so that CPU usage is measured over a real interval.
    pub fn sample(&mut self) -> PerformanceSample {
        self.system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        // A fresh process table avoids counting processes that already exited.
        let processes = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new()),
        );

        self.disks.refresh();

        let load = System::load_average();

        PerformanceSample {
            timestamp: Local::now(),
            cpu_percent: self.system.global_cpu_usage(),
            memory_percent: percent(self.system.used_memory(), self.system.total_memory()),
            disk_percent: self.disk_percent(),
            load_1: load.one,
            load_5: load.five,
            load_15: load.fifteen,
            uptime_secs: System::uptime(),
            process_count: processes.processes().len(),
        }
    }

    fn disk_percent(&self) -> f32 {
        self.disks
            .iter()
            .find(|disk| disk.mount_point() == self.mount_point.as_path())
            .map(|disk| {
                let total = disk.total_space();
                percent(total.saturating_sub(disk.available_space()), total)
            })
            .unwrap_or(0.0)
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new("/")
    }
}

fn percent(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 100.0) as f32
    }
}

/// Appends performance samples to a CSV log.
#[derive(Debug, Clone)]
pub struct PerformanceLog {
    log: CsvLog,
}

impl PerformanceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            log: CsvLog::new(path, PERFORMANCE_LOG_HEADER),
        }
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    pub fn append(&self, sample: &PerformanceSample) -> Result<()> {
        self.log
            .append_rows([sample.row()])
            .with_context(|| format!("Failed to append to {}", self.log.path().display()))
    }
}
