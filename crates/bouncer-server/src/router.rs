use std::{sync::Arc, time::Duration};

use axum::{Router, routing::get};
use bouncer_collector::{
    Exporter, MetricsRegistry,
    metrics::{BuildInfo, ProcessMetrics, RuntimeMetrics},
};
use bouncer_common::{ExporterConfig, HEALTH_PATH, error::Result};
use bouncer_store::StatsStore;
use tower_http::trace::TraceLayer;

use crate::handlers;

pub struct AppState {
    pub registry: Arc<MetricsRegistry>,
    pub store: Arc<dyn StatsStore>,
    pub process_metrics: ProcessMetrics,
    pub runtime_metrics: RuntimeMetrics,
    pub store_timeout: Duration,
    pub telemetry_path: String,
}

impl AppState {
    pub fn new(config: &ExporterConfig, store: Arc<dyn StatsStore>) -> Result<Self> {
        let registry = Arc::new(MetricsRegistry::new());
        BuildInfo::register(registry.as_ref())?;
        let process_metrics = ProcessMetrics::register(registry.as_ref())?;
        let runtime_metrics = RuntimeMetrics::register(registry.as_ref())?;
        Exporter::register(config, Arc::clone(&store), registry.as_ref())?;

        Ok(Self {
            registry,
            store,
            process_metrics,
            runtime_metrics,
            store_timeout: config.store_timeout,
            telemetry_path: config.telemetry_path.clone(),
        })
    }
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::landing::landing_page))
        .route(HEALTH_PATH, get(handlers::health::health))
        .route(
            &state.telemetry_path,
            get(handlers::metrics::prometheus_metrics),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use bouncer_common::{Category, ExporterConfig};
    use bouncer_store::{MockStore, Stat};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::{AppState, app_router};

    fn app(config: ExporterConfig, store: MockStore) -> (axum::Router, Arc<MockStore>) {
        let store = Arc::new(store);
        let state = AppState::new(&config, store.clone()).unwrap();
        (app_router(Arc::new(state)), store)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_text_format() {
        let store = MockStore::new().with_stats(vec![Stat {
            database: "xx".to_string(),
            total_requests: 20,
            ..Stat::default()
        }]);
        let (app, store) = app(ExporterConfig::default(), store);

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );

        let text = body_text(response).await;
        assert!(text.contains("pgbouncer_exporter_stats_total_requests{database=\"xx\"} 20\n"));
        assert!(text.contains("pgbouncer_exporter_build_info{version="));
        if cfg!(target_os = "linux") {
            assert!(text.contains("process_start_time_seconds "));
            assert!(text.contains("# TYPE process_cpu_seconds_total counter\n"));
            assert!(text.contains("process_max_fds "));
        }
        assert_eq!(store.calls(Category::Stats), 1);
    }

    #[tokio::test]
    async fn custom_telemetry_path() {
        let config = ExporterConfig {
            telemetry_path: "/stats".to_string(),
            ..ExporterConfig::default()
        };
        let (app, _) = app(config, MockStore::new());

        let response = app.clone().oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn landing_page_links_to_metrics() {
        let (app, store) = app(ExporterConfig::default(), MockStore::new());

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<a href=\"/metrics\">"));
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn health_reports_store_check() {
        let (app, store) = app(ExporterConfig::default(), MockStore::new());

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert!(store.check_called());
    }

    #[tokio::test]
    async fn health_is_unavailable_when_check_fails() {
        let (app, _) = app(ExporterConfig::default(), MockStore::new().failing_check());

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "unavailable");
        assert!(body["error"].as_str().unwrap().contains("injected failure"));
    }

    #[tokio::test]
    async fn failing_scrape_still_answers() {
        let store = MockStore::new().failing(Category::Pools);
        let (app, _) = app(ExporterConfig::default(), store);

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(response).await;
        assert!(text.contains("pgbouncer_exporter_up 0\n"));
        assert!(text.contains("pgbouncer_exporter_scrape_errors_total{reason=\"query\"} 1\n"));
    }
}
