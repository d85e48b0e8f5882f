use std::{collections::BTreeMap, fmt, time::Duration};

use crate::error::{ExporterError, Result};

pub type ConstLabels = BTreeMap<String, String>;

/// Route of the liveness endpoint, reserved next to the landing page.
pub const HEALTH_PATH: &str = "/health";

/// One administrative listing of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Stats,
    Pools,
    Databases,
    Lists,
    Servers,
    Clients,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Stats,
        Self::Pools,
        Self::Databases,
        Self::Lists,
        Self::Servers,
        Self::Clients,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Pools => "pools",
            Self::Databases => "databases",
            Self::Lists => "lists",
            Self::Servers => "servers",
            Self::Clients => "clients",
        }
    }

    /// Metric name segment for entries fed by this category.
    pub fn subsystem(&self) -> &'static str {
        match self {
            Self::Databases => "database",
            other => other.as_str(),
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Self::Stats => "SHOW STATS",
            Self::Pools => "SHOW POOLS",
            Self::Databases => "SHOW DATABASES",
            Self::Lists => "SHOW LISTS",
            Self::Servers => "SHOW SERVERS",
            Self::Clients => "SHOW CLIENTS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_address: String,
    pub telemetry_path: String,
    pub database_url: String,
    pub store_timeout: Duration,
    pub export_stats: bool,
    pub export_pools: bool,
    pub export_databases: bool,
    pub export_lists: bool,
    pub export_servers: bool,
    pub export_clients: bool,
    pub default_labels: String,
}

impl ExporterConfig {
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Stats => self.export_stats,
            Category::Pools => self.export_pools,
            Category::Databases => self.export_databases,
            Category::Lists => self.export_lists,
            Category::Servers => self.export_servers,
            Category::Clients => self.export_clients,
        }
    }

    pub fn enabled_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| self.is_enabled(*category))
            .collect()
    }

    pub fn const_labels(&self) -> ConstLabels {
        parse_labels(&self.default_labels)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.telemetry_path.starts_with('/') {
            return Err(ExporterError::InvalidConfig(format!(
                "telemetry path must start with '/': {}",
                self.telemetry_path
            )));
        }
        if self.telemetry_path == "/" {
            return Err(ExporterError::InvalidConfig(
                "telemetry path cannot be the landing page".to_string(),
            ));
        }
        if self.telemetry_path == HEALTH_PATH {
            return Err(ExporterError::InvalidConfig(format!(
                "telemetry path cannot be the health endpoint {HEALTH_PATH}"
            )));
        }
        if self.store_timeout.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "store timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9127".to_string(),
            telemetry_path: "/metrics".to_string(),
            database_url: String::new(),
            store_timeout: Duration::from_secs(2),
            export_stats: true,
            export_pools: true,
            export_databases: true,
            export_lists: true,
            export_servers: false,
            export_clients: false,
            default_labels: String::new(),
        }
    }
}

/// Parses `key=value key2=value2`. Tokens without `=` are dropped, and so
/// are tokens whose key is not a usable Prometheus label name.
pub fn parse_labels(value: &str) -> ConstLabels {
    value
        .split(' ')
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.split_once('='))
        .filter(|(key, _)| is_label_name(key))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

// `[a-zA-Z_][a-zA-Z0-9_]*`, with the `__` prefix reserved for Prometheus.
fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let leading_ok = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    leading_ok
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !name.starts_with("__")
}

/// Parses Go style durations such as `2s`, `500ms`, `1m30s` or `100us`.
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(seconds) = input.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds)
            .map_err(|err| format!("invalid duration {input}: {err}"));
    }

    let mut nanos = 0.0_f64;
    let mut rest = input;
    while !rest.is_empty() {
        let unit_at = rest
            .find(|ch: char| !ch.is_ascii_digit() && ch != '.')
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(unit_at);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration: {input}"))?;

        let number_at = tail
            .find(|ch: char| ch.is_ascii_digit() || ch == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(number_at);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration {input}")),
            _ => return Err(format!("unknown duration unit {unit:?} in {input}")),
        };

        nanos += value * scale;
        rest = tail;
    }

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Err(format!("duration out of range: {input}"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Category, ExporterConfig, HEALTH_PATH, parse_duration, parse_labels};

    #[test]
    fn empty_label_string_yields_no_labels() {
        assert!(parse_labels("").is_empty());
    }

    #[test]
    fn token_without_separator_is_dropped() {
        assert!(parse_labels("key").is_empty());
    }

    #[test]
    fn blank_value_is_kept() {
        let labels = parse_labels("key=");
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get("key").map(String::as_str), Some(""));
    }

    #[test]
    fn multiple_labels_and_trailing_space() {
        for input in ["key=value key2=value2", "key=value key2=value2 "] {
            let labels = parse_labels(input);
            assert_eq!(labels.len(), 2);
            assert_eq!(labels["key"], "value");
            assert_eq!(labels["key2"], "value2");
        }
    }

    #[test]
    fn value_may_contain_separator() {
        let labels = parse_labels("dsn=a=b");
        assert_eq!(labels["dsn"], "a=b");
    }

    #[test]
    fn invalid_label_names_are_dropped() {
        let labels = parse_labels("my-env=prod 0zone=eu __reserved=x =empty env=prod _zone=eu");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["env"], "prod");
        assert_eq!(labels["_zone"], "eu");
    }

    #[test]
    fn durations_parse_with_units() {
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("3"), Ok(Duration::from_secs(3)));
        assert!(parse_duration("2d").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn compound_and_sub_millisecond_durations() {
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("100us"), Ok(Duration::from_micros(100)));
        assert_eq!(parse_duration("250ns"), Ok(Duration::from_nanos(250)));
        assert_eq!(parse_duration("1h2m3.5s"), Ok(Duration::from_millis(3_723_500)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert!(parse_duration("1m30").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("1x2s").is_err());
    }

    #[test]
    fn default_config_enables_original_categories() {
        let config = ExporterConfig::default();
        assert_eq!(
            config.enabled_categories(),
            vec![
                Category::Stats,
                Category::Pools,
                Category::Databases,
                Category::Lists
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn telemetry_path_must_be_absolute() {
        let config = ExporterConfig {
            telemetry_path: "metrics".to_string(),
            ..ExporterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn telemetry_path_cannot_shadow_health() {
        let config = ExporterConfig {
            telemetry_path: HEALTH_PATH.to_string(),
            ..ExporterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn databases_subsystem_is_singular() {
        assert_eq!(Category::Databases.subsystem(), "database");
        assert_eq!(Category::Servers.subsystem(), "servers");
    }
}
