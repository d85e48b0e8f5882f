use bouncer_common::error::Result;

use crate::{exporter::NAME, metrics::fq_name, metrics::registry::MetricsRegistry};

/// Constant `build_info` gauge carrying the crate version as a label.
pub struct BuildInfo;

impl BuildInfo {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        let gauge = registry.register_gauge(
            &fq_name(NAME, "", "build_info"),
            "A metric with a constant '1' value labeled by version from which pgbouncer_exporter was built.",
            &["version"],
        )?;
        gauge.set(&[env!("CARGO_PKG_VERSION")], 1.0);
        Ok(Self)
    }
}
