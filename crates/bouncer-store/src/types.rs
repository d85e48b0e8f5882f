/// One `SHOW STATS` row. Counters are cumulative since PgBouncer start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    pub database: String,
    pub total_requests: i64,
    pub total_received: i64,
    pub total_sent: i64,
    pub total_query_time: i64,
    pub total_query_count: i64,
    pub total_xact_time: i64,
    pub total_xact_count: i64,
    pub total_wait_time: i64,
    pub total_server_assignment_count: i64,
    pub total_client_parse_count: i64,
    pub total_server_parse_count: i64,
    pub total_bind_count: i64,
    pub avg_requests: i64,
    pub avg_received: i64,
    pub avg_sent: i64,
    pub avg_query_time: i64,
    pub avg_query_count: i64,
    pub avg_xact_time: i64,
    pub avg_xact_count: i64,
    pub avg_wait_time: i64,
    pub avg_server_assignment_count: i64,
    pub avg_client_parse_count: i64,
    pub avg_server_parse_count: i64,
    pub avg_bind_count: i64,
}

/// One `SHOW POOLS` row, keyed by (database, user).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pool {
    pub database: String,
    pub user: String,
    pub cl_active: i64,
    pub cl_waiting: i64,
    pub cl_cancel_req: i64,
    pub cl_active_cancel_req: i64,
    pub cl_waiting_cancel_req: i64,
    pub sv_active: i64,
    pub sv_active_cancel: i64,
    pub sv_being_canceled: i64,
    pub sv_idle: i64,
    pub sv_used: i64,
    pub sv_tested: i64,
    pub sv_login: i64,
    pub max_wait: i64,
    pub max_wait_us: i64,
    pub pool_mode: String,
    pub load_balance_hosts: String,
}

/// One `SHOW DATABASES` row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    pub host: String,
    pub port: i64,
    pub database: String,
    pub force_user: String,
    pub pool_size: i64,
    pub min_pool_size: i64,
    pub reserve_pool_size: i64,
    pub server_lifetime: i64,
    pub pool_mode: String,
    pub load_balance_hosts: String,
    pub max_connections: i64,
    pub current_connections: i64,
    pub max_client_connections: i64,
    pub current_client_connections: i64,
    pub paused: i64,
    pub disabled: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct List {
    pub list: String,
    pub items: i64,
}

/// One `SHOW SERVERS` or `SHOW CLIENTS` row. Both listings share a layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSlot {
    pub kind: String,
    pub user: String,
    pub database: String,
    pub replication: String,
    pub state: String,
    pub addr: String,
    pub port: i64,
    pub local_addr: String,
    pub local_port: i64,
    pub connect_time: String,
    pub request_time: String,
    pub wait: i64,
    pub wait_us: i64,
    pub close_needed: i64,
    pub ptr: String,
    pub link: String,
    pub remote_pid: i64,
    pub tls: String,
    pub application_name: String,
    pub prepared_statements: i64,
    pub id: i64,
}

pub type Server = ConnectionSlot;
pub type Client = ConnectionSlot;
