//! Aggregate performance metrics computed over completed tasks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ExecutionLocation, Task};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationStats {
    pub count: u64,
    pub avg_latency_s: f64,
    pub avg_energy_j: f64,
    pub deadline_met_rate: f64,
}

/// Summary of one evaluation run or episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsReport {
    pub tasks_completed: u64,
    pub deadline_met_rate: f64,
    pub avg_latency_s: f64,
    pub p50_latency_s: f64,
    pub p95_latency_s: f64,
    pub p99_latency_s: f64,
    pub avg_energy_j: f64,
    pub total_energy_j: f64,
    /// Data moved off-device over the mobile link, both directions.
    pub network_usage_kb: f64,
    pub per_location: BTreeMap<String, LocationStats>,
}

impl MetricsReport {
    /// Fold completed tasks into a report, skipping tasks that started
    /// before the warmup cutoff.
    pub fn from_tasks<'a, I>(tasks: I, warmup_s: f64) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut latencies = Vec::new();
        let mut report = MetricsReport::default();
        let mut met: u64 = 0;
        let mut buckets: BTreeMap<String, (u64, f64, f64, u64)> = BTreeMap::new();

        for task in tasks {
            let (Some(latency), Some(energy), Some(location)) =
                (task.latency_s, task.energy_j, task.location)
            else {
                continue;
            };
            if task.start_time < warmup_s {
                continue;
            }
            report.tasks_completed += 1;
            report.total_energy_j += energy;
            latencies.push(latency);
            if task.deadline_met() {
                met += 1;
            }
            if location != ExecutionLocation::Local {
                report.network_usage_kb += task.input_kb + task.output_kb;
            }
            let bucket = buckets.entry(location.label()).or_default();
            bucket.0 += 1;
            bucket.1 += latency;
            bucket.2 += energy;
            if task.deadline_met() {
                bucket.3 += 1;
            }
        }

        if report.tasks_completed == 0 {
            return report;
        }
        let n = report.tasks_completed as f64;
        latencies.sort_by(|a, b| a.total_cmp(b));
        report.deadline_met_rate = met as f64 / n;
        report.avg_latency_s = latencies.iter().sum::<f64>() / n;
        report.p50_latency_s = percentile(&latencies, 50.0);
        report.p95_latency_s = percentile(&latencies, 95.0);
        report.p99_latency_s = percentile(&latencies, 99.0);
        report.avg_energy_j = report.total_energy_j / n;
        for (label, (count, latency_sum, energy_sum, met)) in buckets {
            report.per_location.insert(
                label,
                LocationStats {
                    count,
                    avg_latency_s: latency_sum / count as f64,
                    avg_energy_j: energy_sum / count as f64,
                    deadline_met_rate: met as f64 / count as f64,
                },
            );
        }
        report
    }

    pub fn csv_header() -> &'static str {
        "strategy,tasks,deadline_met_rate,avg_latency_s,p50_latency_s,p95_latency_s,\
         p99_latency_s,avg_energy_j,total_energy_j,network_usage_kb"
    }

    pub fn csv_row(&self, strategy: &str) -> String {
        format!(
            "{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.1}",
            strategy,
            self.tasks_completed,
            self.deadline_met_rate,
            self.avg_latency_s,
            self.p50_latency_s,
            self.p95_latency_s,
            self.p99_latency_s,
            self.avg_energy_j,
            self.total_energy_j,
            self.network_usage_kb,
        )
    }

    /// Human-readable summary block.
    pub fn render(&self, strategy: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("=== {strategy} ===\n"));
        out.push_str(&format!("  tasks completed:   {}\n", self.tasks_completed));
        out.push_str(&format!(
            "  deadline met:      {:.1}%\n",
            self.deadline_met_rate * 100.0
        ));
        out.push_str(&format!(
            "  latency avg/p95:   {:.3}s / {:.3}s\n",
            self.avg_latency_s, self.p95_latency_s
        ));
        out.push_str(&format!(
            "  energy avg/total:  {:.3}J / {:.1}J\n",
            self.avg_energy_j, self.total_energy_j
        ));
        out.push_str(&format!(
            "  network usage:     {:.1} KB\n",
            self.network_usage_kb
        ));
        for (label, stats) in &self.per_location {
            out.push_str(&format!(
                "  {:<10} {:>6} tasks, avg {:.3}s, met {:.1}%\n",
                label,
                stats.count,
                stats.avg_latency_s,
                stats.deadline_met_rate * 100.0
            ));
        }
        out
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(start: f64, latency: f64, deadline: f64, location: ExecutionLocation) -> Task {
        let mut task = Task::new(0, 0, 100.0, 50.0, 5.0, deadline, start);
        task.complete(location, latency, 0.5);
        task
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&samples, 50.0), 5.0);
        assert_eq!(percentile(&samples, 95.0), 10.0);
        assert_eq!(percentile(&samples, 99.0), 10.0);
        assert_eq!(percentile(&samples, 100.0), 10.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_report_basic_aggregates() {
        let tasks = vec![
            completed(0.0, 1.0, 2.0, ExecutionLocation::Local),
            completed(1.0, 3.0, 2.0, ExecutionLocation::Edge(0)),
            completed(2.0, 2.0, 5.0, ExecutionLocation::Cloud),
        ];
        let report = MetricsReport::from_tasks(&tasks, 0.0);
        assert_eq!(report.tasks_completed, 3);
        assert!((report.deadline_met_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.avg_latency_s - 2.0).abs() < 1e-12);
        assert_eq!(report.per_location.len(), 3);
        // Only offloaded tasks count toward network usage.
        assert!((report.network_usage_kb - 2.0 * 55.0).abs() < 1e-12);
    }

    #[test]
    fn test_warmup_excludes_early_tasks() {
        let tasks = vec![
            completed(0.5, 1.0, 2.0, ExecutionLocation::Local),
            completed(10.0, 4.0, 2.0, ExecutionLocation::Local),
        ];
        let report = MetricsReport::from_tasks(&tasks, 1.0);
        assert_eq!(report.tasks_completed, 1);
        assert!((report.avg_latency_s - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_report_is_zeroed() {
        let report = MetricsReport::from_tasks(std::iter::empty::<&Task>(), 0.0);
        assert_eq!(report.tasks_completed, 0);
        assert_eq!(report.avg_latency_s, 0.0);
    }
}
