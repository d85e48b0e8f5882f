use async_trait::async_trait;
use bouncer_common::{Category, error::Result};

use crate::types::{Client, Database, List, Pool, Server, Stat};

/// Read access to the PgBouncer admin console.
///
/// Calls are cancelled by dropping the returned future, so callers bound
/// them with `tokio::time::timeout`.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn get_stats(&self) -> Result<Vec<Stat>>;
    async fn get_pools(&self) -> Result<Vec<Pool>>;
    async fn get_databases(&self) -> Result<Vec<Database>>;
    async fn get_lists(&self) -> Result<Vec<List>>;
    async fn get_servers(&self) -> Result<Vec<Server>>;
    async fn get_clients(&self) -> Result<Vec<Client>>;

    /// Liveness probe. PgBouncer rejects empty queries, so this is not a ping.
    async fn check(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Fetched rows of one category.
#[derive(Debug, Clone)]
pub enum CategoryRows {
    Stats(Vec<Stat>),
    Pools(Vec<Pool>),
    Databases(Vec<Database>),
    Lists(Vec<List>),
    Servers(Vec<Server>),
    Clients(Vec<Client>),
}

impl CategoryRows {
    pub fn len(&self) -> usize {
        match self {
            Self::Stats(rows) => rows.len(),
            Self::Pools(rows) => rows.len(),
            Self::Databases(rows) => rows.len(),
            Self::Lists(rows) => rows.len(),
            Self::Servers(rows) => rows.len(),
            Self::Clients(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dispatches to the fetch method matching `category`.
pub async fn fetch_category(store: &dyn StatsStore, category: Category) -> Result<CategoryRows> {
    Ok(match category {
        Category::Stats => CategoryRows::Stats(store.get_stats().await?),
        Category::Pools => CategoryRows::Pools(store.get_pools().await?),
        Category::Databases => CategoryRows::Databases(store.get_databases().await?),
        Category::Lists => CategoryRows::Lists(store.get_lists().await?),
        Category::Servers => CategoryRows::Servers(store.get_servers().await?),
        Category::Clients => CategoryRows::Clients(store.get_clients().await?),
    })
}
