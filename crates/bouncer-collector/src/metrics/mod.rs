pub mod collectors;
pub mod registry;
pub mod text;
pub mod types;

pub use collectors::{build::BuildInfo, process::ProcessMetrics, runtime::RuntimeMetrics, scrape::ScrapeMetrics};
pub use registry::{Collector, CounterMetric, GaugeMetric, HistogramMetric, MetricsRegistry};
pub use types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue};

/// Joins the non-empty parts with `_`.
pub fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
