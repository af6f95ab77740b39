use async_trait::async_trait;
use tabula_core::{AppResult, EnvironmentName};
use tabula_domain::{ColumnPrivacyMetadata, DomainRoleSet, GlobalRoleCatalog, RoleMappingSet};

/// Read-only port for the declarative access registry.
///
/// Every method returns `Ok(None)` when the addressed document does not
/// exist: an unmanaged domain or an uncontracted table is a legitimate gap,
/// not a failure. A document that exists but cannot be parsed is an error,
/// because treating it as absent would silently revoke everything the
/// document declares.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Loads the global role catalog shared by all domains.
    async fn load_global_roles(&self) -> AppResult<Option<GlobalRoleCatalog>>;

    /// Loads the role definitions of one domain.
    async fn load_domain_roles(&self, domain: &str) -> AppResult<Option<DomainRoleSet>>;

    /// Loads the role-to-group mappings of one domain for one environment.
    async fn load_role_mappings(
        &self,
        domain: &str,
        environment: &EnvironmentName,
    ) -> AppResult<Option<RoleMappingSet>>;

    /// Loads the per-column privacy metadata declared for one table.
    async fn load_column_metadata(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<Option<Vec<ColumnPrivacyMetadata>>>;
}
