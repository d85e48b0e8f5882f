use std::{sync::Arc, time::Duration};

use bouncer_common::error::Result;

use crate::{
    exporter::NAME,
    metrics::{
        fq_name,
        registry::{CounterMetric, GaugeMetric, HistogramMetric, MetricsRegistry},
    },
};

/// Outcome of the most recent scrapes against the admin console.
pub struct ScrapeMetrics {
    up: Arc<GaugeMetric>,
    duration_seconds: Arc<HistogramMetric>,
    errors_total: Arc<CounterMetric>,
}

impl ScrapeMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        let up = registry.register_gauge(
            &fq_name(NAME, "", "up"),
            "Whether the last scrape of the pgbouncer admin console succeeded.",
            &[],
        )?;

        let duration_seconds = registry.register_histogram(
            &fq_name(NAME, "scrape", "duration_seconds"),
            "Duration of pgbouncer admin console scrapes in seconds.",
            &["outcome"],
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?;

        let errors_total = registry.register_counter(
            &fq_name(NAME, "scrape", "errors_total"),
            "Total number of failed pgbouncer admin console scrapes.",
            &["reason"],
        )?;

        Ok(Self {
            up,
            duration_seconds,
            errors_total,
        })
    }

    pub fn record_success(&self, duration: Duration) {
        self.up.set(&[], 1.0);
        self.duration_seconds
            .observe(&["success"], duration.as_secs_f64());
    }

    pub fn record_failure(&self, reason: &str, duration: Duration) {
        self.up.set(&[], 0.0);
        self.duration_seconds
            .observe(&["error"], duration.as_secs_f64());
        self.errors_total.inc_one(&[reason]);
    }

    pub fn up(&self) -> Option<f64> {
        self.up.get(&[])
    }

    pub fn errors(&self, reason: &str) -> u64 {
        self.errors_total.get(&[reason])
    }
}
