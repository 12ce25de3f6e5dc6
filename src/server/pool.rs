//! Per-catalog connection pools
//!
//! One deadpool-postgres pool per registered catalog, created eagerly at
//! startup but connecting lazily: a catalog whose database is down costs
//! nothing until a request addresses it. The pool is the only shared
//! mutable resource; each in-flight request holds at most one connection.

use std::collections::HashMap;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

use crate::catalog::CatalogRegistry;
use crate::config::ServerConfig;
use crate::errors::RestError;

pub struct CatalogPools {
    pools: HashMap<u64, Pool>,
}

impl CatalogPools {
    pub fn new(config: &ServerConfig, registry: &CatalogRegistry) -> Result<Self, String> {
        let mut pools = HashMap::new();
        for entry in registry.entries() {
            let mut pg = tokio_postgres::Config::new();
            pg.host(&config.db.host)
                .port(config.db.port)
                .user(&config.db.user)
                .password(&config.db.password)
                .dbname(&entry.dbname)
                .application_name("ermgate");

            let manager = Manager::from_config(
                pg,
                NoTls,
                ManagerConfig {
                    recycling_method: RecyclingMethod::Fast,
                },
            );
            let pool = Pool::builder(manager)
                .max_size(config.pool_size)
                .build()
                .map_err(|e| format!("cannot build pool for catalog {}: {}", entry.id, e))?;
            pools.insert(entry.id, pool);
        }
        Ok(CatalogPools { pools })
    }

    pub fn get(&self, catalog: u64) -> Result<&Pool, RestError> {
        self.pools
            .get(&catalog)
            .ok_or_else(|| RestError::NotFound(format!("catalog {} does not exist", catalog)))
    }
}
