pub mod decode;
pub mod mock;
pub mod postgres;
pub mod traits;
pub mod types;

pub use decode::{Column, Record, RowSet, decode_rows};
pub use mock::MockStore;
pub use postgres::PgStore;
pub use traits::{CategoryRows, StatsStore, fetch_category};
pub use types::{Client, ConnectionSlot, Database, List, Pool, Server, Stat};
