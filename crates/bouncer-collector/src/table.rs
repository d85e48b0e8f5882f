use std::sync::Arc;

use bouncer_common::{Category, ConstLabels, ExporterConfig};
use bouncer_store::{ConnectionSlot, Database, List, Pool, Stat};

use crate::{
    bundle::ResultBundle,
    exporter::NAME,
    metrics::{MetricDescriptor, MetricType, fq_name},
};

type Extract = Arc<dyn Fn(&ResultBundle) -> Vec<MetricResult> + Send + Sync>;

const STAT_LABELS: &[&str] = &["database"];
const POOL_LABELS: &[&str] = &["database", "user", "pool_mode"];
const DATABASE_LABELS: &[&str] = &["name", "pool_mode"];
const LIST_LABELS: &[&str] = &["list"];
const CONNECTION_LABELS: &[&str] = &["database", "user", "application_name", "ptr"];

/// One sample produced by a metric entry. Label values follow the entry's
/// label names positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult {
    pub labels: Vec<String>,
    pub value: f64,
}

/// A gauge family derived from one category of admin console rows.
#[derive(Clone)]
pub struct MetricSpec {
    pub category: Category,
    pub enabled: bool,
    pub name: String,
    pub help: &'static str,
    pub labels: &'static [&'static str],
    extract: Extract,
}

impl MetricSpec {
    fn new(
        category: Category,
        short: &str,
        help: &'static str,
        labels: &'static [&'static str],
        extract: Extract,
    ) -> Self {
        Self {
            category,
            enabled: true,
            name: fq_name(NAME, category.subsystem(), short),
            help,
            labels,
            extract,
        }
    }

    pub fn descriptor(&self, const_labels: &ConstLabels) -> MetricDescriptor {
        MetricDescriptor::new(self.name.clone(), self.help, MetricType::Gauge)
            .with_labels(self.labels)
            .with_const_labels(const_labels.clone())
    }

    pub fn evaluate(&self, bundle: &ResultBundle) -> Vec<MetricResult> {
        (self.extract)(bundle)
    }
}

impl std::fmt::Debug for MetricSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSpec")
            .field("category", &self.category)
            .field("enabled", &self.enabled)
            .field("name", &self.name)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

fn stat(short: &str, help: &'static str, value: fn(&Stat) -> i64) -> MetricSpec {
    MetricSpec::new(
        Category::Stats,
        short,
        help,
        STAT_LABELS,
        Arc::new(move |bundle| {
            bundle
                .stats()
                .iter()
                .map(|stat| MetricResult {
                    labels: vec![stat.database.clone()],
                    value: value(stat) as f64,
                })
                .collect()
        }),
    )
}

fn pool(short: &str, help: &'static str, value: fn(&Pool) -> i64) -> MetricSpec {
    MetricSpec::new(
        Category::Pools,
        short,
        help,
        POOL_LABELS,
        Arc::new(move |bundle| {
            bundle
                .pools()
                .iter()
                .map(|pool| MetricResult {
                    labels: vec![
                        pool.database.clone(),
                        pool.user.clone(),
                        pool.pool_mode.clone(),
                    ],
                    value: value(pool) as f64,
                })
                .collect()
        }),
    )
}

fn database(short: &str, help: &'static str, value: fn(&Database) -> i64) -> MetricSpec {
    MetricSpec::new(
        Category::Databases,
        short,
        help,
        DATABASE_LABELS,
        Arc::new(move |bundle| {
            bundle
                .databases()
                .iter()
                .map(|database| MetricResult {
                    labels: vec![database.name.clone(), database.pool_mode.clone()],
                    value: value(database) as f64,
                })
                .collect()
        }),
    )
}

fn list(short: &str, help: &'static str, value: fn(&List) -> i64) -> MetricSpec {
    MetricSpec::new(
        Category::Lists,
        short,
        help,
        LIST_LABELS,
        Arc::new(move |bundle| {
            bundle
                .lists()
                .iter()
                .map(|list| MetricResult {
                    labels: vec![list.list.clone()],
                    value: value(list) as f64,
                })
                .collect()
        }),
    )
}

fn connection_state(
    category: Category,
    short: &str,
    help: &'static str,
    state: &'static str,
) -> MetricSpec {
    MetricSpec::new(
        category,
        short,
        help,
        CONNECTION_LABELS,
        Arc::new(move |bundle| {
            let slots: &[ConnectionSlot] = match category {
                Category::Clients => bundle.clients(),
                _ => bundle.servers(),
            };
            slots
                .iter()
                .filter(|slot| slot.state == state)
                .map(|slot| MetricResult {
                    labels: vec![
                        slot.database.clone(),
                        slot.user.clone(),
                        slot.application_name.clone(),
                        slot.ptr.clone(),
                    ],
                    value: 1.0,
                })
                .collect()
        }),
    )
}

fn server_state(short: &str, help: &'static str, state: &'static str) -> MetricSpec {
    connection_state(Category::Servers, short, help, state)
}

fn client_state(short: &str, help: &'static str, state: &'static str) -> MetricSpec {
    connection_state(Category::Clients, short, help, state)
}

/// Every metric entry, flagged by whether its category is exported.
pub fn build_metrics(config: &ExporterConfig) -> Vec<MetricSpec> {
    let mut specs = vec![
        stat(
            "total_requests",
            "Total number of SQL requests pooled by pgbouncer.",
            |stat| stat.total_requests,
        ),
        stat(
            "total_received",
            "Total volume in bytes of network traffic received by pgbouncer.",
            |stat| stat.total_received,
        ),
        stat(
            "total_sent",
            "Total volume in bytes of network traffic sent by pgbouncer.",
            |stat| stat.total_sent,
        ),
        stat(
            "total_query_time",
            "Total number of microseconds spent by pgbouncer when actively connected to PostgreSQL.",
            |stat| stat.total_query_time,
        ),
        stat(
            "total_xact_time",
            "Total number of microseconds spent by pgbouncer when connected to PostgreSQL in a transaction, either idle in transaction or executing queries.",
            |stat| stat.total_xact_time,
        ),
        stat(
            "total_query_count",
            "Total number of SQL queries pooled by pgbouncer.",
            |stat| stat.total_query_count,
        ),
        stat(
            "total_xact_count",
            "Total number of SQL transactions pooled by pgbouncer.",
            |stat| stat.total_xact_count,
        ),
        stat(
            "total_wait_time",
            "Time spent by clients waiting for a server, in microseconds.",
            |stat| stat.total_wait_time,
        ),
        stat(
            "total_server_assignment_count",
            "Total times a server was assigned to a client.",
            |stat| stat.total_server_assignment_count,
        ),
        stat(
            "avg_query_time",
            "Average query duration, in microseconds.",
            |stat| stat.avg_query_time,
        ),
        stat(
            "avg_xact_time",
            "Average transaction duration, in microseconds.",
            |stat| stat.avg_xact_time,
        ),
        stat(
            "avg_wait_time",
            "Time spent by clients waiting for a server, in microseconds (average of the wait times for clients assigned a backend during the current stats period).",
            |stat| stat.avg_wait_time,
        ),
        pool(
            "active_clients",
            "Client connections that are linked to server connection and can process queries.",
            |pool| pool.cl_active,
        ),
        pool(
            "waiting_clients",
            "Client connections have sent queries but have not yet got a server connection.",
            |pool| pool.cl_waiting,
        ),
        pool(
            "active_server",
            "Server connections that are linked to a client.",
            |pool| pool.sv_active,
        ),
        pool(
            "idle_server",
            "Server connections that are unused and immediately usable for client queries.",
            |pool| pool.sv_idle,
        ),
        pool(
            "used_server",
            "Server connections that have been idle for more than server_check_delay, so they need server_check_query to run on them before they can be used again.",
            |pool| pool.sv_used,
        ),
        pool(
            "tested_server",
            "Server connections that are currently running either server_reset_query or server_check_query.",
            |pool| pool.sv_tested,
        ),
        pool(
            "login_server",
            "Server connections currently in the process of logging in.",
            |pool| pool.sv_login,
        ),
        pool(
            "max_wait",
            "How long the first (oldest) client in the queue has waited, in seconds. If this starts increasing, then the current pool of servers does not handle requests quickly enough. The reason may be either an overloaded server or just too small of a pool_size setting.",
            |pool| pool.max_wait,
        ),
        pool(
            "max_wait_us",
            "Microsecond part of the maximum waiting time.",
            |pool| pool.max_wait_us,
        ),
        database(
            "current_connections",
            "Current number of connections for this database.",
            |database| database.current_connections,
        ),
        database(
            "max_connections",
            "Maximum number of allowed connections for this database.",
            |database| database.max_connections,
        ),
        database(
            "pool_size",
            "Maximum number of server connections.",
            |database| database.pool_size,
        ),
        database(
            "min_pool_size",
            "Minimum number of server connections.",
            |database| database.min_pool_size,
        ),
        database(
            "reserve_pool_size",
            "Maximum number of additional connections for this database.",
            |database| database.reserve_pool_size,
        ),
        database(
            "paused",
            "1 if this database is currently paused, else 0.",
            |database| database.paused,
        ),
        database(
            "disabled",
            "1 if this database is currently disabled, else 0.",
            |database| database.disabled,
        ),
        database(
            "current_client_connections",
            "Current number of client connections for this database.",
            |database| database.current_client_connections,
        ),
        database(
            "max_client_connections",
            "Maximum number of allowed client connections for this database.",
            |database| database.max_client_connections,
        ),
        list("items", "List of internal pgbouncer information.", |list| {
            list.items
        }),
        server_state(
            "active",
            "Server connection linked to a client.",
            "active",
        ),
        server_state(
            "idle",
            "Server connection unused and immediately usable for client queries.",
            "idle",
        ),
        server_state(
            "used",
            "Server connection idle for more than server_check_delay.",
            "used",
        ),
        server_state(
            "tested",
            "Server connection running server_reset_query or server_check_query.",
            "tested",
        ),
        server_state(
            "login",
            "Server connection in the process of logging in.",
            "new",
        ),
        server_state(
            "active_cancel",
            "Server connection forwarding a cancel request.",
            "active_cancel",
        ),
        server_state(
            "being_canceled",
            "Server connection whose in-flight request is being canceled.",
            "being_canceled",
        ),
        client_state(
            "active",
            "Client connection linked to a server connection or idle with no queries waiting.",
            "active",
        ),
        client_state(
            "waiting",
            "Client connection that has sent queries but has not yet got a server connection.",
            "waiting",
        ),
        client_state(
            "active_cancel_req",
            "Client connection that has forwarded a cancel request to the server.",
            "active_cancel_req",
        ),
        client_state(
            "waiting_cancel_req",
            "Client connection with a cancel request not yet forwarded to the server.",
            "waiting_cancel_req",
        ),
    ];

    for spec in &mut specs {
        spec.enabled = config.is_enabled(spec.category);
    }
    specs
}
