use std::sync::Arc;

use bouncer_common::error::Result;
use tokio::runtime::Handle;

use crate::{
    exporter::NAME,
    metrics::{
        fq_name,
        registry::{GaugeMetric, MetricsRegistry},
    },
};

/// Tokio scheduler gauges. Left unset when called outside a runtime.
pub struct RuntimeMetrics {
    workers: Arc<GaugeMetric>,
    alive_tasks: Arc<GaugeMetric>,
    global_queue_depth: Arc<GaugeMetric>,
}

impl RuntimeMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        Ok(Self {
            workers: registry.register_gauge(
                &fq_name(NAME, "runtime", "workers"),
                "Number of tokio worker threads.",
                &[],
            )?,
            alive_tasks: registry.register_gauge(
                &fq_name(NAME, "runtime", "alive_tasks"),
                "Number of tasks alive in the tokio runtime.",
                &[],
            )?,
            global_queue_depth: registry.register_gauge(
                &fq_name(NAME, "runtime", "global_queue_depth"),
                "Number of tasks waiting in the tokio global queue.",
                &[],
            )?,
        })
    }

    pub fn refresh(&self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let metrics = handle.metrics();
        self.workers.set(&[], metrics.num_workers() as f64);
        self.alive_tasks.set(&[], metrics.num_alive_tasks() as f64);
        self.global_queue_depth
            .set(&[], metrics.global_queue_depth() as f64);
    }
}
