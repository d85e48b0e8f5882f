use bouncer_store::{CategoryRows, Client, Database, List, Pool, Server, Stat};

/// Records fetched during one scrape. Categories that were not fetched stay
/// `None` and read back as empty slices.
#[derive(Debug, Clone, Default)]
pub struct ResultBundle {
    stats: Option<Vec<Stat>>,
    pools: Option<Vec<Pool>>,
    databases: Option<Vec<Database>>,
    lists: Option<Vec<List>>,
    servers: Option<Vec<Server>>,
    clients: Option<Vec<Client>>,
}

impl ResultBundle {
    pub fn insert(&mut self, rows: CategoryRows) {
        match rows {
            CategoryRows::Stats(rows) => self.stats = Some(rows),
            CategoryRows::Pools(rows) => self.pools = Some(rows),
            CategoryRows::Databases(rows) => self.databases = Some(rows),
            CategoryRows::Lists(rows) => self.lists = Some(rows),
            CategoryRows::Servers(rows) => self.servers = Some(rows),
            CategoryRows::Clients(rows) => self.clients = Some(rows),
        }
    }

    pub fn stats(&self) -> &[Stat] {
        self.stats.as_deref().unwrap_or_default()
    }

    pub fn pools(&self) -> &[Pool] {
        self.pools.as_deref().unwrap_or_default()
    }

    pub fn databases(&self) -> &[Database] {
        self.databases.as_deref().unwrap_or_default()
    }

    pub fn lists(&self) -> &[List] {
        self.lists.as_deref().unwrap_or_default()
    }

    pub fn servers(&self) -> &[Server] {
        self.servers.as_deref().unwrap_or_default()
    }

    pub fn clients(&self) -> &[Client] {
        self.clients.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use bouncer_store::{CategoryRows, List};

    use super::ResultBundle;

    #[test]
    fn unfetched_categories_read_as_empty() {
        let mut bundle = ResultBundle::default();
        bundle.insert(CategoryRows::Lists(vec![List {
            list: "pools".to_string(),
            items: 2,
        }]));

        assert_eq!(bundle.lists().len(), 1);
        assert!(bundle.stats().is_empty());
        assert!(bundle.clients().is_empty());
    }
}
