use std::collections::HashMap;

use async_trait::async_trait;
use tabula_application::RegistryStore;
use tabula_core::{AppResult, EnvironmentName};
use tabula_domain::{ColumnPrivacyMetadata, DomainRoleSet, GlobalRoleCatalog, RoleMappingSet};
use tokio::sync::RwLock;

/// In-memory registry store for tests and local experiments.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    global_roles: RwLock<Option<GlobalRoleCatalog>>,
    domain_roles: RwLock<HashMap<String, DomainRoleSet>>,
    role_mappings: RwLock<HashMap<(String, String), RoleMappingSet>>,
    column_metadata: RwLock<HashMap<(String, String), Vec<ColumnPrivacyMetadata>>>,
}

impl InMemoryRegistryStore {
    /// Creates an empty in-memory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the shared global role catalog.
    pub async fn set_global_roles(&self, catalog: GlobalRoleCatalog) {
        *self.global_roles.write().await = Some(catalog);
    }

    /// Stores the role definitions of one domain.
    pub async fn set_domain_roles(&self, domain: &str, roles: DomainRoleSet) {
        self.domain_roles
            .write()
            .await
            .insert(domain.to_owned(), roles);
    }

    /// Stores the role-to-group mappings of one domain for one environment.
    pub async fn set_role_mappings(
        &self,
        domain: &str,
        environment: &EnvironmentName,
        mappings: RoleMappingSet,
    ) {
        self.role_mappings
            .write()
            .await
            .insert((domain.to_owned(), environment.as_str().to_owned()), mappings);
    }

    /// Stores the column privacy metadata of one table.
    pub async fn set_column_metadata(
        &self,
        domain: &str,
        table: &str,
        columns: Vec<ColumnPrivacyMetadata>,
    ) {
        self.column_metadata
            .write()
            .await
            .insert((domain.to_owned(), table.to_owned()), columns);
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn load_global_roles(&self) -> AppResult<Option<GlobalRoleCatalog>> {
        Ok(self.global_roles.read().await.clone())
    }

    async fn load_domain_roles(&self, domain: &str) -> AppResult<Option<DomainRoleSet>> {
        Ok(self.domain_roles.read().await.get(domain).cloned())
    }

    async fn load_role_mappings(
        &self,
        domain: &str,
        environment: &EnvironmentName,
    ) -> AppResult<Option<RoleMappingSet>> {
        Ok(self
            .role_mappings
            .read()
            .await
            .get(&(domain.to_owned(), environment.as_str().to_owned()))
            .cloned())
    }

    async fn load_column_metadata(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<Option<Vec<ColumnPrivacyMetadata>>> {
        Ok(self
            .column_metadata
            .read()
            .await
            .get(&(domain.to_owned(), table.to_owned()))
            .cloned())
    }
}
