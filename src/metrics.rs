//! Request and scoring statistics for the churn service.

use crate::types::prediction::{PredictionResult, RiskLevel};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector shared by request tasks
pub struct ServiceMetrics {
    /// Total requests answered
    pub requests_handled: AtomicU64,
    /// Requests answered with an error envelope
    pub requests_failed: AtomicU64,
    /// Requests per route suffix
    requests_by_route: RwLock<HashMap<String, u64>>,
    /// Errors per error code
    errors_by_code: RwLock<HashMap<String, u64>>,
    /// Scored users per risk tier
    predictions_by_tier: RwLock<HashMap<RiskLevel, u64>>,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Churn probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_handled: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            requests_by_route: RwLock::new(HashMap::new()),
            errors_by_code: RwLock::new(HashMap::new()),
            predictions_by_tier: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record an answered request
    pub fn record_request(&self, route: &str, latency: Duration) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_route) = self.requests_by_route.write() {
            *by_route.entry(route.to_string()).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    /// Record a request answered with an error
    pub fn record_error(&self, code: &str) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_code) = self.errors_by_code.write() {
            *by_code.entry(code.to_string()).or_insert(0) += 1;
        }
    }

    /// Record the outcome of scoring one user
    pub fn record_prediction(&self, prediction: &PredictionResult) {
        if let Ok(mut by_tier) = self.predictions_by_tier.write() {
            *by_tier.entry(prediction.risk_level).or_insert(0) += 1;
        }

        let bucket = (prediction.churn_probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_handled.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    pub fn get_predictions_by_tier(&self) -> HashMap<RiskLevel, u64> {
        self.predictions_by_tier
            .read()
            .map(|by_tier| by_tier.clone())
            .unwrap_or_default()
    }

    pub fn get_requests_by_route(&self) -> HashMap<String, u64> {
        self.requests_by_route
            .read()
            .map(|by_route| by_route.clone())
            .unwrap_or_default()
    }

    pub fn get_errors_by_code(&self) -> HashMap<String, u64> {
        self.errors_by_code
            .read()
            .map(|by_code| by_code.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let handled = self.requests_handled.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let error_rate = if handled > 0 {
            (failed as f64 / handled as f64) * 100.0
        } else {
            0.0
        };
        let latency = self.get_latency_stats();

        info!("==================== CHURN GUARD METRICS ====================");
        info!(
            "Requests: {:>8}  | Throughput: {:>6.1} req/s | Errors: {} ({:.1}%)",
            handled,
            self.get_throughput(),
            failed,
            error_rate
        );
        info!(
            "Latency (us): mean={} p50={} p95={} p99={} max={}",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us, latency.max_us
        );

        let mut routes: Vec<(String, u64)> = self.get_requests_by_route().into_iter().collect();
        routes.sort();
        for (route, count) in routes {
            info!("  route {:<14} {:>8}", route, count);
        }

        let by_tier = self.get_predictions_by_tier();
        let scored: u64 = by_tier.values().sum();
        for tier in [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low] {
            let count = by_tier.get(&tier).copied().unwrap_or(0);
            let pct = if scored > 0 {
                (count as f64 / scored as f64) * 100.0
            } else {
                0.0
            };
            info!("  tier  {:<14} {:>8} ({:>5.1}%)", tier.as_str(), count, pct);
        }

        let distribution = self.get_probability_distribution();
        let total: u64 = distribution.iter().sum();
        if total > 0 {
            info!("Churn probability distribution:");
            for (i, &count) in distribution.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                info!(
                    "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    "#".repeat(((pct / 2.0) as usize).min(20))
                );
            }
        }

        for (code, count) in self.get_errors_by_code() {
            info!("  error {:<24} {:>8}", code, count);
        }
        info!("=============================================================");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request latency statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(level: RiskLevel, probability: f64) -> PredictionResult {
        PredictionResult {
            is_churned: level == RiskLevel::High,
            churn_probability: probability,
            risk_level: level,
            recommendation: String::new(),
            primary_reason: "Healthy User".to_string(),
        }
    }

    #[test]
    fn test_request_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request("predict", Duration::from_micros(100));
        metrics.record_request("predict", Duration::from_micros(300));
        metrics.record_request("segments", Duration::from_micros(200));
        metrics.record_error("MODEL_UNAVAILABLE");

        assert_eq!(metrics.requests_handled.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.requests_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_requests_by_route()["predict"], 2);
        assert_eq!(metrics.get_errors_by_code()["MODEL_UNAVAILABLE"], 1);

        let latency = metrics.get_latency_stats();
        assert_eq!(latency.count, 3);
        assert_eq!(latency.mean_us, 200);
        assert_eq!(latency.p50_us, 200);
        assert_eq!(latency.max_us, 300);
    }

    #[test]
    fn test_prediction_buckets() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction(&prediction(RiskLevel::High, 1.0));
        metrics.record_prediction(&prediction(RiskLevel::Low, 0.05));
        metrics.record_prediction(&prediction(RiskLevel::Medium, 0.45));

        let distribution = metrics.get_probability_distribution();
        assert_eq!(distribution[9], 1);
        assert_eq!(distribution[0], 1);
        assert_eq!(distribution[4], 1);
        assert_eq!(metrics.get_predictions_by_tier()[&RiskLevel::High], 1);
    }

    #[test]
    fn test_empty_latency_stats() {
        assert_eq!(ServiceMetrics::new().get_latency_stats(), LatencyStats::default());
    }
}
