use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Per-service counters for the claim → process → persist loop (SPEC_FULL §5).
#[derive(Debug, Clone, Default)]
pub struct ServiceMetrics {
    pub batches_run: u64,
    pub items_claimed: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub lease_reclaims: u64,
    pub batch_latencies_us: VecDeque<u64>,
}

pub struct MetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    service: ServiceMetrics,
    max_history: usize,
}

impl MetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                service: ServiceMetrics::default(),
                max_history,
            })),
        }
    }

    pub fn record_batch(&self, latency_us: u64, claimed: u64, succeeded: u64, failed: u64) {
        let mut state = self.state.lock().unwrap();
        state.service.batches_run += 1;
        state.service.items_claimed += claimed;
        state.service.items_succeeded += succeeded;
        state.service.items_failed += failed;
        state.service.batch_latencies_us.push_back(latency_us);
        if state.service.batch_latencies_us.len() > state.max_history {
            state.service.batch_latencies_us.pop_front();
        }
    }

    pub fn record_lease_reclaim(&self) {
        let mut state = self.state.lock().unwrap();
        state.service.lease_reclaims += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock().unwrap();
        let s = &state.service;

        let mut sorted_latencies: Vec<u64> = s.batch_latencies_us.iter().copied().collect();
        sorted_latencies.sort_unstable();

        let p50 = percentile(&sorted_latencies, 50.0);
        let p95 = percentile(&sorted_latencies, 95.0);
        let p99 = percentile(&sorted_latencies, 99.0);

        let success_rate = if s.items_claimed > 0 {
            s.items_succeeded as f32 / s.items_claimed as f32
        } else {
            0.0
        };

        MetricsSnapshot {
            batches_run: s.batches_run,
            items_claimed: s.items_claimed,
            items_succeeded: s.items_succeeded,
            items_failed: s.items_failed,
            lease_reclaims: s.lease_reclaims,
            success_rate,
            p50_us: p50,
            p95_us: p95,
            p99_us: p99,
            history_count: s.batch_latencies_us.len(),
        }
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub batches_run: u64,
    pub items_claimed: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub lease_reclaims: u64,
    pub success_rate: f32,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub history_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_zero_before_any_batch() {
        let collector = MetricsCollector::new(100);
        assert_eq!(collector.snapshot().success_rate, 0.0);
    }

    #[test]
    fn record_batch_updates_counters_and_success_rate() {
        let collector = MetricsCollector::new(100);
        collector.record_batch(1_200, 10, 9, 1);
        let snap = collector.snapshot();
        assert_eq!(snap.batches_run, 1);
        assert_eq!(snap.items_claimed, 10);
        assert_eq!(snap.success_rate, 0.9);
        assert_eq!(snap.p50_us, 1_200);
    }

    #[test]
    fn history_is_capped_at_max_history() {
        let collector = MetricsCollector::new(3);
        for i in 0..5u64 {
            collector.record_batch(i, 1, 1, 0);
        }
        assert_eq!(collector.snapshot().history_count, 3);
    }

    #[test]
    fn lease_reclaims_accumulate_independently_of_batches() {
        let collector = MetricsCollector::new(10);
        collector.record_lease_reclaim();
        collector.record_lease_reclaim();
        assert_eq!(collector.snapshot().lease_reclaims, 2);
    }
}
