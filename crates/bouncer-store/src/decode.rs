//! Column-driven decoding of admin console listings.
//!
//! Every record type owns a static column table mapping the column names it
//! understands (synonyms included) to a field setter. Column names are
//! resolved before any row is read: an unknown name fails the whole row set.

use bouncer_common::error::DecodeError;

use crate::types::{ConnectionSlot, Database, List, Pool, Stat};

/// Tabular result with a schema only known at runtime. Values are the text
/// form sent by the simple query protocol, `None` for NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row<S: Into<String>>(mut self, values: impl IntoIterator<Item = Option<S>>) -> Self {
        self.rows
            .push(values.into_iter().map(|value| value.map(Into::into)).collect());
        self
    }
}

enum Setter<R> {
    Int(fn(&mut R, i64)),
    Text(fn(&mut R, String)),
}

pub struct Column<R> {
    pub name: &'static str,
    setter: Setter<R>,
}

impl<R> Column<R> {
    pub const fn int(name: &'static str, set: fn(&mut R, i64)) -> Self {
        Self {
            name,
            setter: Setter::Int(set),
        }
    }

    pub const fn text(name: &'static str, set: fn(&mut R, String)) -> Self {
        Self {
            name,
            setter: Setter::Text(set),
        }
    }

    fn apply(&self, record: &mut R, value: Option<&str>) -> Result<(), DecodeError> {
        match &self.setter {
            Setter::Int(set) => {
                if let Some(raw) = value {
                    let parsed = raw
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| DecodeError::InvalidInteger {
                            column: self.name.to_string(),
                            value: raw.to_string(),
                        })?;
                    set(record, parsed);
                }
            }
            Setter::Text(set) => set(record, value.unwrap_or_default().to_string()),
        }
        Ok(())
    }
}

pub trait Record: Default + Sized + 'static {
    const COLUMNS: &'static [Column<Self>];

    fn column(name: &str) -> Option<&'static Column<Self>> {
        Self::COLUMNS.iter().find(|column| column.name == name)
    }
}

pub fn decode_rows<R: Record>(rows: &RowSet) -> Result<Vec<R>, DecodeError> {
    let columns = rows
        .columns
        .iter()
        .map(|name| R::column(name).ok_or_else(|| DecodeError::UnexpectedColumn(name.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    rows.rows
        .iter()
        .map(|values| {
            if values.len() != columns.len() {
                return Err(DecodeError::RowWidth {
                    expected: columns.len(),
                    actual: values.len(),
                });
            }

            let mut record = R::default();
            for (column, value) in columns.iter().zip(values) {
                column.apply(&mut record, value.as_deref())?;
            }
            Ok(record)
        })
        .collect()
}

impl Record for Stat {
    const COLUMNS: &'static [Column<Self>] = &[
        Column::text("database", |r, v| r.database = v),
        Column::int("total_requests", |r, v| r.total_requests = v),
        Column::int("total_received", |r, v| r.total_received = v),
        Column::int("total_sent", |r, v| r.total_sent = v),
        Column::int("total_query_time", |r, v| r.total_query_time = v),
        Column::int("total_query_count", |r, v| r.total_query_count = v),
        Column::int("total_xact_time", |r, v| r.total_xact_time = v),
        Column::int("total_xact_count", |r, v| r.total_xact_count = v),
        Column::int("total_wait_time", |r, v| r.total_wait_time = v),
        Column::int("total_server_assignment_count", |r, v| {
            r.total_server_assignment_count = v
        }),
        Column::int("total_client_parse_count", |r, v| r.total_client_parse_count = v),
        Column::int("total_server_parse_count", |r, v| r.total_server_parse_count = v),
        Column::int("total_bind_count", |r, v| r.total_bind_count = v),
        // pre 1.8 name
        Column::int("avg_req", |r, v| r.avg_requests = v),
        Column::int("avg_recv", |r, v| r.avg_received = v),
        Column::int("avg_sent", |r, v| r.avg_sent = v),
        // pre 1.8 name
        Column::int("avg_query", |r, v| r.avg_query_time = v),
        Column::int("avg_query_time", |r, v| r.avg_query_time = v),
        Column::int("avg_query_count", |r, v| r.avg_query_count = v),
        Column::int("avg_xact_time", |r, v| r.avg_xact_time = v),
        Column::int("avg_xact_count", |r, v| r.avg_xact_count = v),
        Column::int("avg_wait_time", |r, v| r.avg_wait_time = v),
        Column::int("avg_server_assignment_count", |r, v| {
            r.avg_server_assignment_count = v
        }),
        Column::int("avg_client_parse_count", |r, v| r.avg_client_parse_count = v),
        Column::int("avg_server_parse_count", |r, v| r.avg_server_parse_count = v),
        Column::int("avg_bind_count", |r, v| r.avg_bind_count = v),
    ];
}

impl Record for Pool {
    const COLUMNS: &'static [Column<Self>] = &[
        Column::text("database", |r, v| r.database = v),
        Column::text("user", |r, v| r.user = v),
        Column::int("cl_active", |r, v| r.cl_active = v),
        Column::int("cl_waiting", |r, v| r.cl_waiting = v),
        Column::int("cl_cancel_req", |r, v| r.cl_cancel_req = v),
        Column::int("cl_active_cancel_req", |r, v| r.cl_active_cancel_req = v),
        Column::int("cl_waiting_cancel_req", |r, v| r.cl_waiting_cancel_req = v),
        Column::int("sv_active", |r, v| r.sv_active = v),
        Column::int("sv_active_cancel", |r, v| r.sv_active_cancel = v),
        Column::int("sv_being_canceled", |r, v| r.sv_being_canceled = v),
        Column::int("sv_idle", |r, v| r.sv_idle = v),
        Column::int("sv_used", |r, v| r.sv_used = v),
        Column::int("sv_tested", |r, v| r.sv_tested = v),
        Column::int("sv_login", |r, v| r.sv_login = v),
        Column::int("maxwait", |r, v| r.max_wait = v),
        Column::int("maxwait_us", |r, v| r.max_wait_us = v),
        Column::text("pool_mode", |r, v| r.pool_mode = v),
        Column::text("load_balance_hosts", |r, v| r.load_balance_hosts = v),
    ];
}

impl Record for Database {
    const COLUMNS: &'static [Column<Self>] = &[
        Column::text("name", |r, v| r.name = v),
        Column::text("host", |r, v| r.host = v),
        Column::int("port", |r, v| r.port = v),
        Column::text("database", |r, v| r.database = v),
        Column::text("force_user", |r, v| r.force_user = v),
        Column::int("pool_size", |r, v| r.pool_size = v),
        Column::int("min_pool_size", |r, v| r.min_pool_size = v),
        // renamed to reserve_pool_size in 1.24
        Column::int("reserve_pool", |r, v| r.reserve_pool_size = v),
        Column::int("reserve_pool_size", |r, v| r.reserve_pool_size = v),
        Column::int("server_lifetime", |r, v| r.server_lifetime = v),
        Column::text("pool_mode", |r, v| r.pool_mode = v),
        Column::text("load_balance_hosts", |r, v| r.load_balance_hosts = v),
        Column::int("max_connections", |r, v| r.max_connections = v),
        Column::int("current_connections", |r, v| r.current_connections = v),
        Column::int("max_client_connections", |r, v| r.max_client_connections = v),
        Column::int("current_client_connections", |r, v| {
            r.current_client_connections = v
        }),
        Column::int("paused", |r, v| r.paused = v),
        Column::int("disabled", |r, v| r.disabled = v),
    ];
}

impl Record for List {
    const COLUMNS: &'static [Column<Self>] = &[
        Column::text("list", |r, v| r.list = v),
        Column::int("items", |r, v| r.items = v),
    ];
}

impl Record for ConnectionSlot {
    const COLUMNS: &'static [Column<Self>] = &[
        Column::text("type", |r, v| r.kind = v),
        Column::text("user", |r, v| r.user = v),
        Column::text("database", |r, v| r.database = v),
        Column::text("replication", |r, v| r.replication = v),
        Column::text("state", |r, v| r.state = v),
        Column::text("addr", |r, v| r.addr = v),
        Column::int("port", |r, v| r.port = v),
        Column::text("local_addr", |r, v| r.local_addr = v),
        Column::int("local_port", |r, v| r.local_port = v),
        Column::text("connect_time", |r, v| r.connect_time = v),
        Column::text("request_time", |r, v| r.request_time = v),
        Column::int("wait", |r, v| r.wait = v),
        Column::int("wait_us", |r, v| r.wait_us = v),
        Column::int("close_needed", |r, v| r.close_needed = v),
        Column::text("ptr", |r, v| r.ptr = v),
        Column::text("link", |r, v| r.link = v),
        Column::int("remote_pid", |r, v| r.remote_pid = v),
        Column::text("tls", |r, v| r.tls = v),
        Column::text("application_name", |r, v| r.application_name = v),
        Column::int("prepared_statements", |r, v| r.prepared_statements = v),
        Column::int("id", |r, v| r.id = v),
    ];
}

#[cfg(test)]
mod tests {
    use bouncer_common::error::DecodeError;

    use super::{RowSet, decode_rows};
    use crate::types::{ConnectionSlot, Database, List, Pool, Stat};

    #[test]
    fn stats_decode_every_known_column() {
        let rows = RowSet::new([
            "database",
            "total_xact_count",
            "total_query_count",
            "total_received",
            "total_sent",
            "total_xact_time",
            "total_query_time",
            "total_wait_time",
            "total_server_assignment_count",
            "avg_xact_count",
            "avg_query_count",
            "avg_recv",
            "avg_sent",
            "avg_xact_time",
            "avg_query_time",
            "avg_wait_time",
            "avg_server_assignment_count",
        ])
        .with_row(
            [
                "pgbouncer", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13",
                "14", "15", "16",
            ]
            .map(Some),
        );

        let stats: Vec<Stat> = decode_rows(&rows).unwrap();
        assert_eq!(stats.len(), 1);
        let stat = &stats[0];
        assert_eq!(stat.database, "pgbouncer");
        assert_eq!(stat.total_xact_count, 1);
        assert_eq!(stat.total_query_count, 2);
        assert_eq!(stat.total_received, 3);
        assert_eq!(stat.total_sent, 4);
        assert_eq!(stat.total_xact_time, 5);
        assert_eq!(stat.total_query_time, 6);
        assert_eq!(stat.total_wait_time, 7);
        assert_eq!(stat.total_server_assignment_count, 8);
        assert_eq!(stat.avg_xact_count, 9);
        assert_eq!(stat.avg_query_count, 10);
        assert_eq!(stat.avg_received, 11);
        assert_eq!(stat.avg_sent, 12);
        assert_eq!(stat.avg_xact_time, 13);
        assert_eq!(stat.avg_query_time, 14);
        assert_eq!(stat.avg_wait_time, 15);
        assert_eq!(stat.avg_server_assignment_count, 16);
    }

    #[test]
    fn unknown_column_fails_the_row_set() {
        let rows = RowSet::new(["database", "total_frobs"]).with_row([Some("db"), Some("1")]);
        let err = decode_rows::<Stat>(&rows).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedColumn("total_frobs".to_string()));
    }

    #[test]
    fn unknown_column_fails_even_without_rows() {
        let rows = RowSet::new(["list", "owner"]);
        assert!(decode_rows::<List>(&rows).is_err());
    }

    #[test]
    fn missing_column_keeps_zero_value() {
        let rows = RowSet::new(["database", "user", "cl_active"])
            .with_row([Some("db"), Some("app"), Some("4")]);
        let pools: Vec<Pool> = decode_rows(&rows).unwrap();
        assert_eq!(pools[0].cl_active, 4);
        assert_eq!(pools[0].cl_waiting, 0);
        assert_eq!(pools[0].max_wait_us, 0);
        assert_eq!(pools[0].pool_mode, "");
    }

    #[test]
    fn null_text_becomes_empty_string() {
        let rows = RowSet::new(["name", "host", "pool_mode", "force_user", "port"]).with_row([
            Some("db"),
            None,
            None,
            None,
            Some("6432"),
        ]);
        let databases: Vec<Database> = decode_rows(&rows).unwrap();
        assert_eq!(databases[0].host, "");
        assert_eq!(databases[0].pool_mode, "");
        assert_eq!(databases[0].force_user, "");
        assert_eq!(databases[0].port, 6432);
    }

    #[test]
    fn null_integer_stays_zero() {
        let rows = RowSet::new(["list", "items"]).with_row([Some("pools"), None]);
        let lists: Vec<List> = decode_rows(&rows).unwrap();
        assert_eq!(lists[0].items, 0);
    }

    #[test]
    fn reserve_pool_synonyms_map_to_one_field() {
        for column in ["reserve_pool", "reserve_pool_size"] {
            let rows = RowSet::new(["name", column]).with_row([Some("db"), Some("5")]);
            let databases: Vec<Database> = decode_rows(&rows).unwrap();
            assert_eq!(databases[0].reserve_pool_size, 5);
        }
    }

    #[test]
    fn legacy_stat_columns_are_understood() {
        let rows = RowSet::new(["database", "total_requests", "avg_req", "avg_query"])
            .with_row([Some("db"), Some("20"), Some("2"), Some("350")]);
        let stats: Vec<Stat> = decode_rows(&rows).unwrap();
        assert_eq!(stats[0].total_requests, 20);
        assert_eq!(stats[0].avg_requests, 2);
        assert_eq!(stats[0].avg_query_time, 350);
    }

    #[test]
    fn integers_keep_their_sign() {
        let rows = RowSet::new(["list", "items"]).with_row([Some("used_clients"), Some("-3")]);
        let lists: Vec<List> = decode_rows(&rows).unwrap();
        assert_eq!(lists[0].items, -3);
    }

    #[test]
    fn invalid_integer_is_reported_with_column() {
        let rows = RowSet::new(["list", "items"]).with_row([Some("pools"), Some("many")]);
        let err = decode_rows::<List>(&rows).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidInteger {
                column: "items".to_string(),
                value: "many".to_string(),
            }
        );
    }

    #[test]
    fn short_row_is_rejected() {
        let rows = RowSet::new(["list", "items"]).with_row([Some("pools")]);
        assert_eq!(
            decode_rows::<List>(&rows).unwrap_err(),
            DecodeError::RowWidth {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn connection_rows_decode_state_and_owner() {
        let rows = RowSet::new([
            "type",
            "user",
            "database",
            "state",
            "addr",
            "port",
            "ptr",
            "link",
            "application_name",
        ])
        .with_row([
            Some("S"),
            Some("app"),
            Some("db"),
            Some("active"),
            Some("10.0.0.1"),
            Some("5432"),
            Some("0x1"),
            None,
            None,
        ]);
        let servers: Vec<ConnectionSlot> = decode_rows(&rows).unwrap();
        let server = &servers[0];
        assert_eq!(server.kind, "S");
        assert_eq!(server.state, "active");
        assert_eq!(server.port, 5432);
        assert_eq!(server.link, "");
        assert_eq!(server.application_name, "");
    }

    #[test]
    fn each_row_starts_from_zero() {
        let rows = RowSet::new(["list", "items"])
            .with_row([Some("pools"), Some("7")])
            .with_row([Some("clients"), None]);
        let lists: Vec<List> = decode_rows(&rows).unwrap();
        assert_eq!(lists[1].items, 0);
    }
}
