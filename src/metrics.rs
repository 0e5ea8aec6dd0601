//! Performance metrics and statistics tracking for the scoring pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Distribution buckets; totals past the last bucket are counted in it
const QUAL_BUCKETS: usize = 6;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Total comments scored
    pub comments_scored: AtomicU64,
    /// Comments whose scoring failed
    pub comments_failed: AtomicU64,
    /// Jobs that delivered a completion
    pub jobs_completed: AtomicU64,
    /// Jobs that ended in a failure message
    pub jobs_failed: AtomicU64,
    /// Per-comment scoring times (in microseconds)
    comment_times: RwLock<Vec<u64>>,
    /// Model inference times (in microseconds)
    model_times: RwLock<HashMap<String, Vec<u64>>>,
    /// QuAL score distribution
    qual_buckets: RwLock<[u64; QUAL_BUCKETS]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            comments_scored: AtomicU64::new(0),
            comments_failed: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            comment_times: RwLock::new(Vec::with_capacity(1000)),
            model_times: RwLock::new(HashMap::new()),
            qual_buckets: RwLock::new([0; QUAL_BUCKETS]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored comment
    pub fn record_comment(&self, scoring_time: Duration, qual: u8) {
        self.comments_scored.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.comment_times.write() {
            times.push(scoring_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = usize::from(qual).min(QUAL_BUCKETS - 1);
        if let Ok(mut buckets) = self.qual_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a comment that could not be scored
    pub fn record_comment_failure(&self) {
        self.comments_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record model inference time
    pub fn record_model_time(&self, model_name: &str, duration: Duration) {
        if let Ok(mut times) = self.model_times.write() {
            let model_times = times.entry(model_name.to_string()).or_default();
            model_times.push(duration.as_micros() as u64);
            // Keep only last 1000 per model
            if model_times.len() > 1000 {
                model_times.drain(0..500);
            }
        }
    }

    /// Record the end of a job
    pub fn record_job(&self, succeeded: bool) {
        if succeeded {
            self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get per-comment scoring time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.comment_times.read() else {
            return ProcessingStats::default();
        };
        percentiles(&times)
    }

    /// Get model performance stats
    pub fn get_model_stats(&self) -> HashMap<String, ProcessingStats> {
        let Ok(times) = self.model_times.read() else {
            return HashMap::new();
        };

        times
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(model, samples)| (model.clone(), percentiles(samples)))
            .collect()
    }

    /// Get current throughput (comments per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.comments_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get QuAL score distribution
    pub fn get_qual_distribution(&self) -> [u64; QUAL_BUCKETS] {
        self.qual_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.comments_scored.load(Ordering::Relaxed);
        let failed = self.comments_failed.load(Ordering::Relaxed);
        let jobs_ok = self.jobs_completed.load(Ordering::Relaxed);
        let jobs_failed = self.jobs_failed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            comments_scored = scored,
            comments_failed = failed,
            jobs_completed = jobs_ok,
            jobs_failed = jobs_failed,
            throughput = format!("{:.2} comments/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "Scoring metrics summary"
        );

        let distribution = self.get_qual_distribution();
        let total: u64 = distribution.iter().sum();
        for (qual, &count) in distribution.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = (count as f64 / total as f64) * 100.0;
            info!(qual = qual, count = count, "QuAL {}: {:.1}%", qual, pct);
        }

        for (model, stats) in &self.get_model_stats() {
            info!(
                model = %model,
                calls = stats.count,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "Model inference times"
            );
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentiles(samples: &[u64]) -> ProcessingStats {
    if samples.is_empty() {
        return ProcessingStats::default();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_unstable();

    let count = sorted.len();
    let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

    ProcessingStats {
        count: count as u64,
        mean_us: sorted.iter().sum::<u64>() / count as u64,
        p50_us: at(0.50),
        p95_us: at(0.95),
        p99_us: at(0.99),
        max_us: sorted[count - 1],
    }
}

/// Timing statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
