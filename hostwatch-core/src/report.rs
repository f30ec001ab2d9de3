//! Summary report built from the performance log and the directory event log.

use crate::csv_log::CsvTable;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

const PLOT_WIDTH: usize = 60;
const PLOT_HEIGHT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl Stats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, avg, max })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    /// Rows whose `event_type` is none of the three known kinds.
    pub other: usize,
}

impl EventCounts {
    fn record(&mut self, event_type: &str) {
        match event_type.trim().to_lowercase().as_str() {
            "created" => self.created += 1,
            "modified" => self.modified += 1,
            "deleted" => self.deleted += 1,
            _ => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.modified + self.deleted + self.other
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Local>,
    /// Performance rows with a usable `cpu_percent` value.
    pub samples: usize,
    /// Performance rows left out of `samples` because they could not be parsed.
    pub skipped_rows: usize,
    pub first_sample: Option<String>,
    pub last_sample: Option<String>,
    pub cpu: Option<Stats>,
    pub memory: Option<Stats>,
    pub disk: Option<Stats>,
    pub events: EventCounts,
    #[serde(skip)]
    cpu_series: Vec<f64>,
    #[serde(skip)]
    memory_series: Vec<f64>,
}

impl Report {
    /// Build a report from the two CSV logs. Missing logs count as empty.
    pub fn generate(performance_log: &Path, event_log: &Path) -> Result<Self> {
        let performance = CsvTable::read(performance_log)
            .with_context(|| format!("Failed to read {}", performance_log.display()))?;
        let events = CsvTable::read(event_log)
            .with_context(|| format!("Failed to read {}", event_log.display()))?;
        Ok(Self::from_tables(&performance, &events))
    }

    pub fn from_tables(performance: &CsvTable, events: &CsvTable) -> Self {
        let cpu_series = numeric_column(performance, "cpu_percent");
        let memory_series = numeric_column(performance, "memory_percent");
        let disk_series = numeric_column(performance, "disk_percent");

        let timestamps: Vec<&str> = performance
            .column("timestamp")
            .map(|idx| {
                performance
                    .rows
                    .iter()
                    .filter_map(|row| row.get(idx).map(String::as_str))
                    .collect()
            })
            .unwrap_or_default();

        let mut counts = EventCounts::default();
        match events.column("event_type") {
            Some(idx) => {
                for row in &events.rows {
                    match row.get(idx) {
                        Some(event_type) => counts.record(event_type),
                        None => warn!("Skipping event row with {} fields", row.len()),
                    }
                }
            }
            None if !events.rows.is_empty() => {
                warn!("Event log has no event_type column, ignoring {} rows", events.rows.len())
            }
            None => {}
        }

        Self {
            generated_at: Local::now(),
            samples: cpu_series.len(),
            skipped_rows: performance.rows.len().saturating_sub(cpu_series.len()),
            first_sample: timestamps.first().map(|s| s.to_string()),
            last_sample: timestamps.last().map(|s| s.to_string()),
            cpu: Stats::from_values(&cpu_series),
            memory: Stats::from_values(&memory_series),
            disk: Stats::from_values(&disk_series),
            events: counts,
            cpu_series,
            memory_series,
        }
    }

    /// Flat text summary including CPU and memory time-series plots.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Host Monitoring Summary ===\n");
        out.push_str(&format!(
            "Generated: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));

        out.push_str("-- System Performance --\n");
        out.push_str(&format!("Samples: {}\n", self.samples));
        if self.skipped_rows > 0 {
            out.push_str(&format!("Skipped rows: {}\n", self.skipped_rows));
        }
        if let (Some(first), Some(last)) = (&self.first_sample, &self.last_sample) {
            out.push_str(&format!("Period: {first} .. {last}\n"));
        }
        for (label, stats) in [("CPU", self.cpu), ("Memory", self.memory), ("Disk", self.disk)] {
            match stats {
                Some(s) => out.push_str(&format!(
                    "{label:<7} min {:>5.1}%  avg {:>5.1}%  max {:>5.1}%\n",
                    s.min, s.avg, s.max
                )),
                None => out.push_str(&format!("{label:<7} no data\n")),
            }
        }

        out.push_str("\n-- Directory Events --\n");
        out.push_str(&format!("Created:  {}\n", self.events.created));
        out.push_str(&format!("Modified: {}\n", self.events.modified));
        out.push_str(&format!("Deleted:  {}\n", self.events.deleted));
        if self.events.other > 0 {
            out.push_str(&format!("Other:    {}\n", self.events.other));
        }

        if !self.cpu_series.is_empty() {
            out.push('\n');
            out.push_str(&render_plot("CPU usage (%)", &self.cpu_series, PLOT_WIDTH, PLOT_HEIGHT));
        }
        if !self.memory_series.is_empty() {
            out.push('\n');
            out.push_str(&render_plot(
                "Memory usage (%)",
                &self.memory_series,
                PLOT_WIDTH,
                PLOT_HEIGHT,
            ));
        }

        out
    }

    pub fn write_summary(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.render_text())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn numeric_column(table: &CsvTable, name: &str) -> Vec<f64> {
    let Some(idx) = table.column(name) else {
        return Vec::new();
    };

    table
        .rows
        .iter()
        .filter_map(|row| {
            let value = row.get(idx)?;
            match value.trim().parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Skipping malformed {} value {:?}", name, value);
                    None
                }
            }
        })
        .collect()
}

/// Column chart of a percentage series, scaled 0..100 and bucketed to `width` columns.
pub fn render_plot(title: &str, values: &[f64], width: usize, height: usize) -> String {
    let width = width.max(1);
    let height = height.max(1);

    let buckets: Vec<f64> = if values.len() <= width {
        values.to_vec()
    } else {
        (0..width)
            .map(|i| {
                let start = i * values.len() / width;
                let end = ((i + 1) * values.len() / width).max(start + 1);
                let chunk = &values[start..end];
                chunk.iter().sum::<f64>() / chunk.len() as f64
            })
            .collect()
    };

    let mut out = format!("{title}\n");
    for level in (0..height).rev() {
        let threshold = (level as f64 + 0.5) * 100.0 / height as f64;
        let axis = match level {
            l if l == height - 1 => "100 |".to_string(),
            0 => "  0 |".to_string(),
            _ => "    |".to_string(),
        };
        let line: String = buckets
            .iter()
            .map(|v| if *v >= threshold { '#' } else { ' ' })
            .collect();
        out.push_str(&axis);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.push_str("    +");
    out.push_str(&"-".repeat(buckets.len()));
    out.push('\n');
    out
}
