//! the fixed catalog of servers, queried against the registry's occupancy
use std::sync::Arc;

use config::ServerName;

use crate::registry::LeaseRegistry;

#[derive(Debug, Clone)]
pub struct ServerPool {
    catalog: Arc<[ServerName]>,
}

impl ServerPool {
    pub fn new<I>(catalog: I) -> Self
    where
        I: IntoIterator<Item = ServerName>,
    {
        Self {
            catalog: catalog.into_iter().collect(),
        }
    }

    pub fn catalog(&self) -> &[ServerName] {
        &self.catalog
    }

    pub fn contains(&self, server: &ServerName) -> bool {
        self.catalog.contains(server)
    }

    /// `false` for names outside the catalog
    pub fn is_vacant(&self, registry: &LeaseRegistry, server: &ServerName) -> bool {
        self.contains(server) && !registry.is_leased(server)
    }

    /// first server in catalog order that nobody holds
    pub fn find_vacant(&self, registry: &LeaseRegistry) -> Option<ServerName> {
        let occupied = registry.occupied_servers();
        self.catalog
            .iter()
            .find(|server| !occupied.contains(*server))
            .cloned()
    }
}
