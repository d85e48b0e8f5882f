use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bouncer_common::{
    Category,
    error::{ExporterError, Result},
};

use crate::{
    decode::{Record, RowSet, decode_rows},
    traits::StatsStore,
    types::{Client, Database, List, Pool, Server, Stat},
};

/// In-memory store returning canned records and counting calls.
#[derive(Default)]
pub struct MockStore {
    stats: Vec<Stat>,
    pools: Vec<Pool>,
    databases: Vec<Database>,
    lists: Vec<List>,
    servers: Vec<Server>,
    clients: Vec<Client>,
    raw: HashMap<Category, RowSet>,
    failing: Option<Category>,
    check_fails: bool,
    delay: Option<Duration>,
    calls: [AtomicUsize; 6],
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    check_called: AtomicBool,
    close_called: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(mut self, stats: Vec<Stat>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_pools(mut self, pools: Vec<Pool>) -> Self {
        self.pools = pools;
        self
    }

    pub fn with_databases(mut self, databases: Vec<Database>) -> Self {
        self.databases = databases;
        self
    }

    pub fn with_lists(mut self, lists: Vec<List>) -> Self {
        self.lists = lists;
        self
    }

    pub fn with_servers(mut self, servers: Vec<Server>) -> Self {
        self.servers = servers;
        self
    }

    pub fn with_clients(mut self, clients: Vec<Client>) -> Self {
        self.clients = clients;
        self
    }

    /// Serves `category` by decoding `rows` instead of the canned records.
    pub fn with_rows(mut self, category: Category, rows: RowSet) -> Self {
        self.raw.insert(category, rows);
        self
    }

    pub fn failing(mut self, category: Category) -> Self {
        self.failing = Some(category);
        self
    }

    pub fn failing_check(mut self) -> Self {
        self.check_fails = true;
        self
    }

    /// Sleeps this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, category: Category) -> usize {
        self.calls[slot(category)].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        Category::ALL
            .iter()
            .map(|category| self.calls(*category))
            .sum()
    }

    /// Highest number of fetches observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn check_called(&self) -> bool {
        self.check_called.load(Ordering::SeqCst)
    }

    pub fn close_called(&self) -> bool {
        self.close_called.load(Ordering::SeqCst)
    }

    async fn fetch<R: Record + Clone + Send + Sync>(
        &self,
        category: Category,
        canned: &[R],
    ) -> Result<Vec<R>> {
        self.calls[slot(category)].fetch_add(1, Ordering::SeqCst);
        let _flight = InFlight::enter(self);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing == Some(category) {
            return Err(ExporterError::Query(format!(
                "{}: injected failure",
                category.command()
            )));
        }

        match self.raw.get(&category) {
            Some(rows) => Ok(decode_rows(rows)?),
            None => Ok(canned.to_vec()),
        }
    }
}

#[async_trait]
impl StatsStore for MockStore {
    async fn get_stats(&self) -> Result<Vec<Stat>> {
        self.fetch(Category::Stats, &self.stats).await
    }

    async fn get_pools(&self) -> Result<Vec<Pool>> {
        self.fetch(Category::Pools, &self.pools).await
    }

    async fn get_databases(&self) -> Result<Vec<Database>> {
        self.fetch(Category::Databases, &self.databases).await
    }

    async fn get_lists(&self) -> Result<Vec<List>> {
        self.fetch(Category::Lists, &self.lists).await
    }

    async fn get_servers(&self) -> Result<Vec<Server>> {
        self.fetch(Category::Servers, &self.servers).await
    }

    async fn get_clients(&self) -> Result<Vec<Client>> {
        self.fetch(Category::Clients, &self.clients).await
    }

    async fn check(&self) -> Result<()> {
        self.check_called.store(true, Ordering::SeqCst);
        if self.check_fails {
            return Err(ExporterError::Connect("injected failure".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_called.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn slot(category: Category) -> usize {
    match category {
        Category::Stats => 0,
        Category::Pools => 1,
        Category::Databases => 2,
        Category::Lists => 3,
        Category::Servers => 4,
        Category::Clients => 5,
    }
}

struct InFlight<'a> {
    store: &'a MockStore,
}

impl<'a> InFlight<'a> {
    fn enter(store: &'a MockStore) -> Self {
        let current = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.max_in_flight.fetch_max(current, Ordering::SeqCst);
        Self { store }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
