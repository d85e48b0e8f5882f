use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bouncer_common::{
    Category, ConstLabels, ExporterConfig,
    error::{ExporterError, Result},
};
use bouncer_store::{StatsStore, fetch_category};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::{
    bundle::ResultBundle,
    metrics::{
        CollectedMetric, Collector, MetricDescriptor, MetricSample, MetricValue, MetricsRegistry,
        ScrapeMetrics,
    },
    table::{MetricSpec, build_metrics},
};

pub const NAME: &str = "pgbouncer_exporter";

/// Turns admin console snapshots into metric families.
///
/// Scrapes are serialized. A scrape either yields every enabled family or,
/// when any fetch fails or the deadline passes, none of them.
pub struct Exporter {
    store: Arc<dyn StatsStore>,
    specs: Vec<MetricSpec>,
    const_labels: ConstLabels,
    timeout: Duration,
    scrape_lock: Mutex<()>,
    scrape_metrics: Option<ScrapeMetrics>,
}

impl Exporter {
    pub fn new(config: &ExporterConfig, store: Arc<dyn StatsStore>) -> Self {
        Self {
            store,
            specs: build_metrics(config)
                .into_iter()
                .filter(|spec| spec.enabled)
                .collect(),
            const_labels: config.const_labels(),
            timeout: config.store_timeout,
            scrape_lock: Mutex::new(()),
            scrape_metrics: None,
        }
    }

    pub fn with_scrape_metrics(mut self, scrape: ScrapeMetrics) -> Self {
        self.scrape_metrics = Some(scrape);
        self
    }

    /// Registers the exporter and its scrape health metrics.
    pub fn register(
        config: &ExporterConfig,
        store: Arc<dyn StatsStore>,
        registry: &MetricsRegistry,
    ) -> Result<Arc<Self>> {
        let scrape = ScrapeMetrics::register(registry)?;
        let exporter = Arc::new(Self::new(config, store).with_scrape_metrics(scrape));
        registry.register_collector(exporter.clone())?;
        Ok(exporter)
    }

    /// Categories referenced by at least one enabled entry, in fetch order.
    pub fn required_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| self.specs.iter().any(|spec| spec.category == *category))
            .collect()
    }

    /// One scrape: fetch, then evaluate every enabled entry.
    pub async fn scrape(&self) -> Result<Vec<CollectedMetric>> {
        let _guard = self.scrape_lock.lock().await;
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.fetch_bundle()).await {
            Ok(result) => result,
            Err(_) => Err(ExporterError::Timeout(self.timeout)),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(bundle) => {
                let families = self.evaluate(&bundle);
                if let Some(scrape) = &self.scrape_metrics {
                    scrape.record_success(elapsed);
                }
                debug!(
                    families = families.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "scrape completed"
                );
                Ok(families)
            }
            Err(err) => {
                if let Some(scrape) = &self.scrape_metrics {
                    scrape.record_failure(err.kind(), elapsed);
                }
                Err(err)
            }
        }
    }

    async fn fetch_bundle(&self) -> Result<ResultBundle> {
        let mut bundle = ResultBundle::default();
        for category in self.required_categories() {
            let rows = fetch_category(self.store.as_ref(), category).await?;
            debug!(%category, rows = rows.len(), "fetched category");
            bundle.insert(rows);
        }
        Ok(bundle)
    }

    fn evaluate(&self, bundle: &ResultBundle) -> Vec<CollectedMetric> {
        self.specs
            .iter()
            .map(|spec| CollectedMetric {
                descriptor: spec.descriptor(&self.const_labels),
                samples: spec
                    .evaluate(bundle)
                    .into_iter()
                    .map(|result| MetricSample {
                        labels: spec
                            .labels
                            .iter()
                            .map(|name| (*name).to_string())
                            .zip(result.labels)
                            .collect(),
                        value: MetricValue::Gauge(result.value),
                    })
                    .collect(),
            })
            .collect()
    }
}

#[async_trait]
impl Collector for Exporter {
    fn describe(&self) -> Vec<MetricDescriptor> {
        self.specs
            .iter()
            .map(|spec| spec.descriptor(&self.const_labels))
            .collect()
    }

    async fn collect(&self) -> Vec<CollectedMetric> {
        match self.scrape().await {
            Ok(families) => families,
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "pgbouncer scrape failed");
                Vec::new()
            }
        }
    }
}
