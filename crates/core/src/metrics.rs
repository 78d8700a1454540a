//! Thumbnail pipeline counters
//!
//! A [`MetricsSink`] is owned by whoever builds the pipeline and shared with
//! it through an `Arc`, so several pipelines can report into one sink or each
//! keep their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Monotonic pipeline counters
#[derive(Debug, Default)]
pub struct MetricsSink {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    source_fetches: AtomicU64,
    generated_count: AtomicU64,
    generated_duration_us: AtomicU64,
    max_generated_duration_us: AtomicU64,
    output_transforms: AtomicU64,
}

/// Point-in-time copy of a [`MetricsSink`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub source_fetches: u64,
    pub generated_count: u64,
    pub generated_duration_ms: f64,
    pub max_generated_duration_ms: f64,
    pub avg_generated_duration_ms: f64,
    pub output_transforms: u64,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_fetch(&self) {
        self.source_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one canonical rendition and its generation time
    pub fn record_generated(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.generated_count.fetch_add(1, Ordering::Relaxed);
        self.generated_duration_us.fetch_add(micros, Ordering::Relaxed);
        self.max_generated_duration_us.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn record_output_transform(&self) {
        self.output_transforms.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let generated_count = self.generated_count.load(Ordering::Relaxed);
        let total_us = self.generated_duration_us.load(Ordering::Relaxed);
        let avg_generated_duration_ms =
            if generated_count == 0 { 0.0 } else { total_us as f64 / generated_count as f64 / 1000.0 };

        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            source_fetches: self.source_fetches.load(Ordering::Relaxed),
            generated_count,
            generated_duration_ms: total_us as f64 / 1000.0,
            max_generated_duration_ms: self.max_generated_duration_us.load(Ordering::Relaxed) as f64 / 1000.0,
            avg_generated_duration_ms,
            output_transforms: self.output_transforms.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.cache_hits,
            &self.cache_misses,
            &self.source_fetches,
            &self.generated_count,
            &self.generated_duration_us,
            &self.max_generated_duration_us,
            &self.output_transforms,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_accumulate_and_track_max() {
        let sink = MetricsSink::new();
        sink.record_generated(Duration::from_millis(4));
        sink.record_generated(Duration::from_millis(10));

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.generated_count, 2);
        assert_eq!(snapshot.generated_duration_ms, 14.0);
        assert_eq!(snapshot.max_generated_duration_ms, 10.0);
        assert_eq!(snapshot.avg_generated_duration_ms, 7.0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let sink = MetricsSink::new();
        sink.record_request();
        sink.record_cache_hit();
        sink.record_cache_miss();
        sink.record_source_fetch();
        sink.record_output_transform();
        sink.record_generated(Duration::from_millis(1));
        assert_ne!(sink.snapshot(), MetricsSnapshot::default());

        sink.reset();
        assert_eq!(sink.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let sink = MetricsSink::new();
        sink.record_request();
        let json = serde_json::to_value(sink.snapshot()).unwrap();
        assert_eq!(json["requests"], 1);
        assert!(json.get("cacheHits").is_some());
        assert!(json.get("avgGeneratedDurationMs").is_some());
    }
}
