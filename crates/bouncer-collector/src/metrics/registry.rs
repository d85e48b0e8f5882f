use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bouncer_common::error::{ExporterError, Result};

use crate::metrics::{
    text,
    types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue},
};

type LabelValues = Vec<String>;

/// A source of metric families that are produced at gather time.
///
/// `describe` must not perform I/O. It is called once at registration to
/// reserve names, and may be called again at any time.
#[async_trait]
pub trait Collector: Send + Sync {
    fn describe(&self) -> Vec<MetricDescriptor>;
    async fn collect(&self) -> Vec<CollectedMetric>;
}

trait RegisteredMetric: Send + Sync {
    fn descriptor(&self) -> MetricDescriptor;
    fn collect(&self) -> Vec<MetricSample>;
}

pub struct MetricsRegistry {
    names: Mutex<HashSet<String>>,
    metrics: RwLock<HashMap<String, Arc<dyn RegisteredMetric>>>,
    collectors: RwLock<Vec<Arc<dyn Collector>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(HashSet::new()),
            metrics: RwLock::new(HashMap::new()),
            collectors: RwLock::new(Vec::new()),
        }
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
    ) -> Result<Arc<CounterMetric>> {
        let metric = Arc::new(CounterMetric::new(name, help, variable_labels));
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        let metric = Arc::new(GaugeMetric::with_type(
            name,
            help,
            variable_labels,
            MetricType::Gauge,
        ));
        self.register(metric.clone())?;
        Ok(metric)
    }

    /// Counter whose running total is read from elsewhere, such as CPU time
    /// from `/proc`, and stored with `set`.
    pub fn register_float_counter(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        let metric = Arc::new(GaugeMetric::with_type(
            name,
            help,
            variable_labels,
            MetricType::Counter,
        ));
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
        buckets: &[f64],
    ) -> Result<Arc<HistogramMetric>> {
        let metric = Arc::new(HistogramMetric::new(name, help, variable_labels, buckets));
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn register_collector(&self, collector: Arc<dyn Collector>) -> Result<()> {
        let names = collector
            .describe()
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect::<Vec<_>>();
        self.claim_names(&names)?;

        self.collectors
            .write()
            .map_err(|_| lock_poisoned("collectors"))?
            .push(collector);
        Ok(())
    }

    /// Descriptors of everything registered, without collecting.
    pub fn describe_all(&self) -> Vec<MetricDescriptor> {
        let mut descriptors = match self.metrics.read() {
            Ok(guard) => guard.values().map(|metric| metric.descriptor()).collect(),
            Err(_) => Vec::new(),
        };
        for collector in self.collectors_snapshot() {
            descriptors.extend(collector.describe());
        }
        descriptors.sort_by(|left, right| left.name.cmp(&right.name));
        descriptors
    }

    /// Runs collectors before reading registered metrics, so values a
    /// collector sets while collecting show up in the same gather.
    pub async fn gather(&self) -> Vec<CollectedMetric> {
        let mut collected = Vec::new();
        for collector in self.collectors_snapshot() {
            collected.extend(collector.collect().await);
        }

        if let Ok(guard) = self.metrics.read() {
            collected.extend(guard.values().map(|metric| CollectedMetric {
                descriptor: metric.descriptor(),
                samples: metric.collect(),
            }));
        }

        collected.sort_by(|left, right| left.descriptor.name.cmp(&right.descriptor.name));
        collected
    }

    pub async fn render_prometheus(&self) -> String {
        text::encode(&self.gather().await)
    }

    fn collectors_snapshot(&self) -> Vec<Arc<dyn Collector>> {
        match self.collectors.read() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }

    fn claim_names(&self, names: &[String]) -> Result<()> {
        let mut claimed = self.names.lock().map_err(|_| lock_poisoned("names"))?;

        let mut seen = HashSet::new();
        for name in names {
            if claimed.contains(name) || !seen.insert(name.as_str()) {
                return Err(ExporterError::DuplicateMetric(name.clone()));
            }
        }

        claimed.extend(names.iter().cloned());
        Ok(())
    }

    fn register<M: RegisteredMetric + 'static>(&self, metric: Arc<M>) -> Result<()> {
        let name = metric.descriptor().name;
        self.claim_names(std::slice::from_ref(&name))?;

        self.metrics
            .write()
            .map_err(|_| lock_poisoned("metrics"))?
            .insert(name, metric);
        Ok(())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_poisoned(what: &str) -> ExporterError {
    ExporterError::InternalError(format!("metrics registry {what} lock poisoned"))
}

pub struct CounterMetric {
    descriptor: MetricDescriptor,
    series: RwLock<HashMap<LabelValues, Arc<AtomicU64>>>,
}

impl CounterMetric {
    fn new(name: &str, help: &str, variable_labels: &[&str]) -> Self {
        Self {
            descriptor: MetricDescriptor::new(name, help, MetricType::Counter)
                .with_labels(variable_labels),
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn inc(&self, labels: &[&str], value: u64) {
        let series = get_or_create_series(&self.descriptor, &self.series, labels, || {
            AtomicU64::new(0)
        });
        series.fetch_add(value, Ordering::Relaxed);
    }

    pub fn inc_one(&self, labels: &[&str]) {
        self.inc(labels, 1);
    }

    pub fn get(&self, labels: &[&str]) -> u64 {
        let key = normalize_labels(&self.descriptor, labels);
        self.series
            .read()
            .ok()
            .and_then(|guard| guard.get(&key).map(|value| value.load(Ordering::Relaxed)))
            .unwrap_or(0)
    }
}

impl RegisteredMetric for CounterMetric {
    fn descriptor(&self) -> MetricDescriptor {
        self.descriptor.clone()
    }

    fn collect(&self) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        series
            .iter()
            .map(|(label_values, value)| MetricSample {
                labels: materialize_labels(&self.descriptor, label_values),
                value: MetricValue::Counter(value.load(Ordering::Relaxed) as f64),
            })
            .collect()
    }
}

/// Settable `f64` series stored as raw bits. Rendered as a gauge, or as a
/// counter when registered through `register_float_counter`.
pub struct GaugeMetric {
    descriptor: MetricDescriptor,
    series: RwLock<HashMap<LabelValues, Arc<AtomicU64>>>,
}

impl GaugeMetric {
    fn with_type(
        name: &str,
        help: &str,
        variable_labels: &[&str],
        metric_type: MetricType,
    ) -> Self {
        Self {
            descriptor: MetricDescriptor::new(name, help, metric_type)
                .with_labels(variable_labels),
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, labels: &[&str], value: f64) {
        let series = get_or_create_series(&self.descriptor, &self.series, labels, || {
            AtomicU64::new(0f64.to_bits())
        });
        series.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        let key = normalize_labels(&self.descriptor, labels);
        self.series
            .read()
            .ok()?
            .get(&key)
            .map(|value| f64::from_bits(value.load(Ordering::Relaxed)))
    }
}

impl RegisteredMetric for GaugeMetric {
    fn descriptor(&self) -> MetricDescriptor {
        self.descriptor.clone()
    }

    fn collect(&self) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        series
            .iter()
            .map(|(label_values, value)| {
                let value = f64::from_bits(value.load(Ordering::Relaxed));
                MetricSample {
                    labels: materialize_labels(&self.descriptor, label_values),
                    value: match self.descriptor.metric_type {
                        MetricType::Counter => MetricValue::Counter(value),
                        _ => MetricValue::Gauge(value),
                    },
                }
            })
            .collect()
    }
}

pub struct HistogramMetric {
    descriptor: MetricDescriptor,
    buckets: Vec<f64>,
    series: RwLock<HashMap<LabelValues, Arc<HistogramSeries>>>,
}

struct HistogramSeries {
    bucket_counts: Vec<AtomicU64>,
    count: AtomicU64,
    sum: Mutex<f64>,
}

impl HistogramSeries {
    fn new(buckets: usize) -> Self {
        Self {
            bucket_counts: (0..buckets + 1).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum: Mutex::new(0.0),
        }
    }
}

impl HistogramMetric {
    fn new(name: &str, help: &str, variable_labels: &[&str], buckets: &[f64]) -> Self {
        let mut sorted_buckets = buckets.to_vec();
        sorted_buckets.sort_by(|left, right| left.total_cmp(right));

        Self {
            descriptor: MetricDescriptor::new(name, help, MetricType::Histogram)
                .with_labels(variable_labels),
            buckets: sorted_buckets,
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn observe(&self, labels: &[&str], value: f64) {
        let bucket_len = self.buckets.len();
        let series = get_or_create_series(&self.descriptor, &self.series, labels, || {
            HistogramSeries::new(bucket_len)
        });

        let bucket_index = self
            .buckets
            .iter()
            .position(|bucket| value <= *bucket)
            .unwrap_or(self.buckets.len());

        if let Some(bucket) = series.bucket_counts.get(bucket_index) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }

        series.count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut sum) = series.sum.lock() {
            *sum += value;
        }
    }

    pub fn count(&self, labels: &[&str]) -> u64 {
        let key = normalize_labels(&self.descriptor, labels);
        self.series
            .read()
            .ok()
            .and_then(|guard| guard.get(&key).map(|series| series.count.load(Ordering::Relaxed)))
            .unwrap_or(0)
    }
}

impl RegisteredMetric for HistogramMetric {
    fn descriptor(&self) -> MetricDescriptor {
        self.descriptor.clone()
    }

    fn collect(&self) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        series
            .iter()
            .map(|(label_values, entry)| {
                let mut buckets = self
                    .buckets
                    .iter()
                    .zip(&entry.bucket_counts)
                    .map(|(bound, count)| (*bound, count.load(Ordering::Relaxed)))
                    .collect::<Vec<_>>();

                let inf_count = entry.bucket_counts[self.buckets.len()].load(Ordering::Relaxed);
                buckets.push((f64::INFINITY, inf_count));

                let sum = match entry.sum.lock() {
                    Ok(value) => *value,
                    Err(_) => 0.0,
                };

                MetricSample {
                    labels: materialize_labels(&self.descriptor, label_values),
                    value: MetricValue::Histogram {
                        buckets,
                        count: entry.count.load(Ordering::Relaxed),
                        sum,
                    },
                }
            })
            .collect()
    }
}

fn get_or_create_series<T>(
    descriptor: &MetricDescriptor,
    series: &RwLock<HashMap<LabelValues, Arc<T>>>,
    labels: &[&str],
    init: impl FnOnce() -> T,
) -> Arc<T> {
    let label_values = normalize_labels(descriptor, labels);
    if let Ok(guard) = series.read()
        && let Some(existing) = guard.get(&label_values)
    {
        return existing.clone();
    }

    match series.write() {
        Ok(mut guard) => guard
            .entry(label_values)
            .or_insert_with(|| Arc::new(init()))
            .clone(),
        Err(_) => Arc::new(init()),
    }
}

fn normalize_labels(descriptor: &MetricDescriptor, labels: &[&str]) -> LabelValues {
    let expected = descriptor.variable_labels.len();
    (0..expected)
        .map(|index| labels.get(index).copied().unwrap_or_default().to_string())
        .collect()
}

fn materialize_labels(descriptor: &MetricDescriptor, values: &[String]) -> Vec<(String, String)> {
    descriptor
        .variable_labels
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bouncer_common::error::ExporterError;

    use super::{Collector, MetricsRegistry};
    use crate::metrics::types::{
        CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue,
    };

    struct StaticCollector {
        name: &'static str,
    }

    #[async_trait]
    impl Collector for StaticCollector {
        fn describe(&self) -> Vec<MetricDescriptor> {
            vec![MetricDescriptor::new(self.name, "static", MetricType::Gauge)]
        }

        async fn collect(&self) -> Vec<CollectedMetric> {
            vec![CollectedMetric {
                descriptor: self.describe().remove(0),
                samples: vec![MetricSample {
                    labels: Vec::new(),
                    value: MetricValue::Gauge(7.0),
                }],
            }]
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = MetricsRegistry::new();
        registry.register_gauge("a_metric", "help", &[]).unwrap();

        let err = registry.register_counter("a_metric", "help", &[]).err().unwrap();
        assert!(matches!(err, ExporterError::DuplicateMetric(name) if name == "a_metric"));

        let err = registry
            .register_collector(Arc::new(StaticCollector { name: "a_metric" }))
            .unwrap_err();
        assert!(matches!(err, ExporterError::DuplicateMetric(_)));
    }

    #[tokio::test]
    async fn gather_merges_collectors_and_sorts_by_name() {
        let registry = MetricsRegistry::new();
        registry.register_gauge("z_gauge", "last", &[]).unwrap().set(&[], 1.0);
        registry
            .register_collector(Arc::new(StaticCollector { name: "b_static" }))
            .unwrap();

        let names = registry
            .gather()
            .await
            .into_iter()
            .map(|metric| metric.descriptor.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["b_static", "z_gauge"]);
    }

    #[test]
    fn describe_all_does_not_collect() {
        let registry = MetricsRegistry::new();
        registry
            .register_collector(Arc::new(StaticCollector { name: "only_described" }))
            .unwrap();
        let descriptors = registry.describe_all();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "only_described");
    }

    #[test]
    fn missing_labels_are_padded() {
        let registry = MetricsRegistry::new();
        let counter = registry
            .register_counter("errors_total", "errors", &["reason", "category"])
            .unwrap();
        counter.inc_one(&["timeout"]);
        assert_eq!(counter.get(&["timeout", ""]), 1);
    }

    #[tokio::test]
    async fn float_counter_renders_as_counter() {
        let registry = MetricsRegistry::new();
        registry
            .register_float_counter("cpu_seconds_total", "cpu", &[])
            .unwrap()
            .set(&[], 1.25);

        let text = registry.render_prometheus().await;
        assert!(text.contains("# TYPE cpu_seconds_total counter\n"));
        assert!(text.contains("cpu_seconds_total 1.25\n"));
    }

    #[test]
    fn histogram_counts_observations() {
        let registry = MetricsRegistry::new();
        let histogram = registry
            .register_histogram("duration_seconds", "duration", &[], &[0.1, 1.0])
            .unwrap();
        histogram.observe(&[], 0.05);
        histogram.observe(&[], 5.0);
        assert_eq!(histogram.count(&[]), 2);
    }
}
