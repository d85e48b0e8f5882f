pub mod bundle;
pub mod exporter;
pub mod metrics;
pub mod table;

pub use bundle::ResultBundle;
pub use exporter::{Exporter, NAME};
pub use metrics::{Collector, MetricsRegistry};
pub use table::{MetricResult, MetricSpec, build_metrics};
