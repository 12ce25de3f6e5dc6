//! Catalog registry
//!
//! Maps numeric catalog ids to databases and caches each catalog's
//! introspected model. The registry file is YAML:
//!
//! ```yaml
//! catalogs:
//!   - id: 1
//!     dbname: ermgate_demo
//!     description: demo catalog
//! ```
//!
//! Cached models are revalidated at request entry against the catalog's
//! `_ermgate.model_version` table when it exists; a version bump triggers
//! re-introspection. `refresh` forces it unconditionally.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_postgres::GenericClient;

use super::introspection;
use super::model::Model;
use crate::errors::RestError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    pub dbname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    catalogs: Vec<CatalogEntry>,
}

pub struct CatalogRegistry {
    entries: HashMap<u64, CatalogEntry>,
    models: RwLock<HashMap<u64, Arc<Model>>>,
}

impl CatalogRegistry {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, RestError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RestError::ServiceUnavailable(format!(
                "cannot read catalog registry {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let file: RegistryFile = serde_yaml::from_str(&content).map_err(|e| {
            RestError::ServiceUnavailable(format!("cannot parse catalog registry: {}", e))
        })?;
        Ok(Self::from_entries(file.catalogs))
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        CatalogRegistry {
            entries: entries.into_iter().map(|e| (e.id, e)).collect(),
            models: RwLock::new(HashMap::new()),
        }
    }

    pub fn entry(&self, id: u64) -> Result<&CatalogEntry, RestError> {
        self.entries
            .get(&id)
            .ok_or_else(|| RestError::NotFound(format!("catalog {} does not exist", id)))
    }

    pub fn entries(&self) -> Vec<&CatalogEntry> {
        let mut out: Vec<&CatalogEntry> = self.entries.values().collect();
        out.sort_by_key(|e| e.id);
        out
    }

    /// Get the catalog's model, introspecting on first use and whenever the
    /// catalog's version token has moved past the cached one.
    pub async fn model<C: GenericClient>(
        &self,
        id: u64,
        client: &C,
    ) -> Result<Arc<Model>, RestError> {
        self.entry(id)?;

        let cached = { self.models.read().await.get(&id).cloned() };
        if let Some(model) = cached {
            let live = introspection::read_model_version(client).await?;
            if live == model.version {
                return Ok(model);
            }
            log::info!(
                "catalog {}: model version moved {} -> {}, re-introspecting",
                id,
                model.version,
                live
            );
        }
        self.refresh(id, client).await
    }

    /// Unconditionally re-introspect and replace the cached model.
    pub async fn refresh<C: GenericClient>(
        &self,
        id: u64,
        client: &C,
    ) -> Result<Arc<Model>, RestError> {
        self.entry(id)?;
        let model = Arc::new(introspection::introspect(client).await?);
        log::info!(
            "catalog {}: introspected {} schemas, {} tables (version {})",
            id,
            model.schemas.len(),
            model.tables().len(),
            model.version
        );
        self.models.write().await.insert(id, model.clone());
        Ok(model)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_yaml_roundtrip() {
        let yaml = "catalogs:\n  - id: 1\n    dbname: demo\n  - id: 7\n    dbname: other\n    description: second\n";
        let file: RegistryFile = serde_yaml::from_str(yaml).unwrap();
        let registry = CatalogRegistry::from_entries(file.catalogs);
        assert_eq!(registry.entry(1).unwrap().dbname, "demo");
        assert_eq!(registry.entry(7).unwrap().description.as_deref(), Some("second"));
        assert!(registry.entry(2).is_err());
        let ids: Vec<u64> = registry.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 7]);
    }
}
