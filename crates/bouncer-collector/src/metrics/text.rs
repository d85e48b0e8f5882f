//! Prometheus text exposition format, version 0.0.4.

use crate::metrics::types::{CollectedMetric, MetricDescriptor, MetricValue};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders families in the given order. Families without samples are left
/// out entirely, HELP and TYPE lines included.
pub fn encode(metrics: &[CollectedMetric]) -> String {
    let mut output = String::new();

    for metric in metrics.iter().filter(|metric| !metric.samples.is_empty()) {
        let name = &metric.descriptor.name;

        output.push_str("# HELP ");
        output.push_str(name);
        output.push(' ');
        output.push_str(&escape_help(&metric.descriptor.help));
        output.push('\n');

        output.push_str("# TYPE ");
        output.push_str(name);
        output.push(' ');
        output.push_str(metric.descriptor.metric_type.as_prometheus_type());
        output.push('\n');

        for sample in &metric.samples {
            let labels = with_const_labels(&metric.descriptor, &sample.labels);
            match &sample.value {
                MetricValue::Counter(value) | MetricValue::Gauge(value) => {
                    output.push_str(&render_sample_line(name, &labels, *value));
                }
                MetricValue::Histogram {
                    buckets,
                    count,
                    sum,
                } => {
                    let mut cumulative = 0_u64;
                    for (bound, bucket_count) in buckets {
                        cumulative = cumulative.saturating_add(*bucket_count);
                        let mut bucket_labels = labels.clone();
                        bucket_labels.push(("le".to_string(), format_bucket_bound(*bound)));
                        output.push_str(&render_sample_line(
                            &format!("{name}_bucket"),
                            &bucket_labels,
                            cumulative as f64,
                        ));
                    }

                    output.push_str(&render_sample_line(&format!("{name}_sum"), &labels, *sum));
                    output.push_str(&render_sample_line(
                        &format!("{name}_count"),
                        &labels,
                        *count as f64,
                    ));
                }
            }
        }
    }

    output
}

// Variable labels win over a constant label of the same name.
fn with_const_labels(
    descriptor: &MetricDescriptor,
    labels: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged = descriptor
        .const_labels
        .iter()
        .filter(|(key, _)| !labels.iter().any(|(name, _)| name == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect::<Vec<_>>();
    merged.extend(labels.iter().cloned());
    merged
}

fn render_sample_line(name: &str, labels: &[(String, String)], value: f64) -> String {
    let mut rendered = String::new();
    rendered.push_str(name);

    if !labels.is_empty() {
        rendered.push('{');
        for (index, (key, value)) in labels.iter().enumerate() {
            if index > 0 {
                rendered.push(',');
            }
            rendered.push_str(key);
            rendered.push_str("=\"");
            rendered.push_str(&escape_label_value(value));
            rendered.push('"');
        }
        rendered.push('}');
    }

    rendered.push(' ');
    rendered.push_str(&format_metric_value(value));
    rendered.push('\n');
    rendered
}

fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn format_bucket_bound(value: f64) -> String {
    if value.is_infinite() {
        "+Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use bouncer_common::ConstLabels;

    use super::encode;
    use crate::metrics::types::{
        CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue,
    };

    fn gauge(name: &str, labels: &[&str], samples: Vec<MetricSample>) -> CollectedMetric {
        CollectedMetric {
            descriptor: MetricDescriptor::new(name, "help text", MetricType::Gauge)
                .with_labels(labels),
            samples,
        }
    }

    fn sample(labels: &[(&str, &str)], value: f64) -> MetricSample {
        MetricSample {
            labels: labels
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            value: MetricValue::Gauge(value),
        }
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        let text = encode(&[gauge(
            "pgbouncer_exporter_stats_total_requests",
            &["database"],
            vec![sample(&[("database", "xx")], 20.0)],
        )]);

        assert_eq!(
            text,
            "# HELP pgbouncer_exporter_stats_total_requests help text\n\
             # TYPE pgbouncer_exporter_stats_total_requests gauge\n\
             pgbouncer_exporter_stats_total_requests{database=\"xx\"} 20\n"
        );
    }

    #[test]
    fn empty_families_are_skipped() {
        let text = encode(&[
            gauge("a_empty", &[], Vec::new()),
            gauge("b_full", &[], vec![sample(&[], 0.5)]),
        ]);
        assert!(!text.contains("a_empty"));
        assert!(text.contains("b_full 0.5\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        let text = encode(&[gauge(
            "m",
            &["application_name"],
            vec![sample(&[("application_name", "a\"b\\c\nd")], 1.0)],
        )]);
        assert!(text.contains(r#"m{application_name="a\"b\\c\nd"} 1"#));
    }

    #[test]
    fn special_values() {
        let text = encode(&[gauge(
            "m",
            &["k"],
            vec![
                sample(&[("k", "nan")], f64::NAN),
                sample(&[("k", "inf")], f64::INFINITY),
                sample(&[("k", "neg")], f64::NEG_INFINITY),
                sample(&[("k", "minus")], -3.0),
            ],
        )]);
        assert!(text.contains("m{k=\"nan\"} NaN\n"));
        assert!(text.contains("m{k=\"inf\"} +Inf\n"));
        assert!(text.contains("m{k=\"neg\"} -Inf\n"));
        assert!(text.contains("m{k=\"minus\"} -3\n"));
    }

    #[test]
    fn const_labels_lead_each_sample() {
        let mut const_labels = ConstLabels::new();
        const_labels.insert("env".to_string(), "prod".to_string());
        const_labels.insert("database".to_string(), "ignored".to_string());

        let mut metric = gauge("m", &["database"], vec![sample(&[("database", "xx")], 1.0)]);
        metric.descriptor = metric.descriptor.with_const_labels(const_labels);

        let text = encode(&[metric]);
        assert!(text.contains("m{env=\"prod\",database=\"xx\"} 1\n"));
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let metric = CollectedMetric {
            descriptor: MetricDescriptor::new("h", "hist", MetricType::Histogram),
            samples: vec![MetricSample {
                labels: Vec::new(),
                value: MetricValue::Histogram {
                    buckets: vec![(0.1, 1), (1.0, 2), (f64::INFINITY, 1)],
                    count: 4,
                    sum: 3.25,
                },
            }],
        };

        let text = encode(&[metric]);
        assert!(text.contains("h_bucket{le=\"0.1\"} 1\n"));
        assert!(text.contains("h_bucket{le=\"1\"} 3\n"));
        assert!(text.contains("h_bucket{le=\"+Inf\"} 4\n"));
        assert!(text.contains("h_sum 3.25\n"));
        assert!(text.contains("h_count 4\n"));
    }
}
