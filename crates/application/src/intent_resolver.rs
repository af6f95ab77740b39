use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use tabula_core::{AppResult, EnvironmentName};
use tabula_domain::{
    DomainRoleSet, GlobalRoleCatalog, MaskingIntent, MaskingIntentInput, PrivilegeIntent,
    RoleMappingSet,
};

use crate::registry_ports::RegistryStore;

#[cfg(test)]
mod tests;

/// Registry documents cached for the duration of a batch run.
///
/// Absent documents are cached as their empty form so that every worker in
/// a batch settles the same lookup once.
#[derive(Default)]
struct RegistryCache {
    global_roles: Option<Arc<GlobalRoleCatalog>>,
    domain_roles: HashMap<String, Arc<DomainRoleSet>>,
    role_mappings: HashMap<String, Arc<RoleMappingSet>>,
}

/// Resolves declarative registry documents into concrete per-table intent.
///
/// One resolver instance serves one environment. Role and mapping documents
/// are cached per instance until [`IntentResolver::clear_cache`] is called;
/// column privacy metadata is read fresh on every resolution.
pub struct IntentResolver {
    registry: Arc<dyn RegistryStore>,
    environment: EnvironmentName,
    cache: RwLock<RegistryCache>,
}

impl IntentResolver {
    /// Creates a resolver bound to one environment.
    #[must_use]
    pub fn new(registry: Arc<dyn RegistryStore>, environment: EnvironmentName) -> Self {
        Self {
            registry,
            environment,
            cache: RwLock::new(RegistryCache::default()),
        }
    }

    /// Returns the environment this resolver serves.
    #[must_use]
    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }

    /// Drops every cached registry document.
    pub async fn clear_cache(&self) {
        *self.cache.write().await = RegistryCache::default();
    }

    /// Computes the privileges every identity group should hold on a table.
    ///
    /// Roles that do not cover the table, roles with no mapped groups and
    /// roles whose inheritance target is unknown contribute nothing. A
    /// domain with no registry documents resolves to an empty list.
    pub async fn resolve_privileges(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<Vec<PrivilegeIntent>> {
        let catalog = self.global_roles().await?;
        let roles = self.domain_roles(domain).await?;
        let mappings = self.role_mappings(domain).await?;

        let mut intents = Vec::new();
        for (role_name, role) in roles.iter() {
            if !role.covers(table) {
                continue;
            }

            let groups = mappings.groups_for(role_name);
            if groups.is_empty() {
                debug!(domain, table, role = role_name, "role has no mapped identity groups");
                continue;
            }

            let Some(global_role) = catalog.find(role.inherits()) else {
                info!(
                    domain,
                    role = role_name,
                    inherits = role.inherits(),
                    "role inherits an unknown global role"
                );
                continue;
            };

            let reason = format!("role '{}' inherits '{}'", role_name, role.inherits());
            for group in groups {
                if group.trim().is_empty() {
                    info!(domain, role = role_name, "skipping empty identity group in mapping");
                    continue;
                }

                for privilege in global_role.privileges() {
                    intents.push(PrivilegeIntent::new(table, group, *privilege, &reason)?);
                }
            }
        }

        if intents.is_empty() {
            info!(domain, table, "no privilege intent declared");
        }

        Ok(intents)
    }

    /// Computes the masks every privacy-classified column should carry.
    ///
    /// Exempt groups are the groups holding any managed privilege on the
    /// same table, resolved fresh from declared intent rather than from
    /// observed platform state.
    pub async fn resolve_masking(&self, domain: &str, table: &str) -> AppResult<Vec<MaskingIntent>> {
        let Some(columns) = self.registry.load_column_metadata(domain, table).await? else {
            debug!(domain, table, "no data contract declared");
            return Ok(Vec::new());
        };

        let privileges = self.resolve_privileges(domain, table).await?;
        let exempt_groups: BTreeSet<String> = privileges
            .iter()
            .map(|intent| intent.identity_group().to_owned())
            .collect();

        let mut intents = Vec::new();
        for column in &columns {
            if !column.requires_masking() {
                continue;
            }

            let strategy = column.effective_masking_strategy();
            let classification = column.classification();
            intents.push(MaskingIntent::new(MaskingIntentInput {
                table: table.to_owned(),
                column_name: column.column_name().to_owned(),
                column_type: column.data_type().to_owned(),
                classification,
                strategy,
                exempt_groups: exempt_groups.iter().cloned().collect(),
                reason: format!(
                    "{} data requires {} masking",
                    classification.as_str(),
                    strategy.as_str()
                ),
            })?);
        }

        Ok(intents)
    }

    async fn global_roles(&self) -> AppResult<Arc<GlobalRoleCatalog>> {
        if let Some(catalog) = self.cache.read().await.global_roles.clone() {
            return Ok(catalog);
        }

        let loaded = match self.registry.load_global_roles().await? {
            Some(catalog) => Arc::new(catalog),
            None => {
                info!("global role catalog not found, treating as empty");
                Arc::new(GlobalRoleCatalog::default())
            }
        };

        let mut cache = self.cache.write().await;
        Ok(cache.global_roles.get_or_insert_with(|| loaded).clone())
    }

    async fn domain_roles(&self, domain: &str) -> AppResult<Arc<DomainRoleSet>> {
        if let Some(roles) = self.cache.read().await.domain_roles.get(domain).cloned() {
            return Ok(roles);
        }

        let loaded = match self.registry.load_domain_roles(domain).await? {
            Some(roles) => Arc::new(roles),
            None => {
                info!(domain, "domain role definitions not found, treating as empty");
                Arc::new(DomainRoleSet::default())
            }
        };

        let mut cache = self.cache.write().await;
        Ok(cache
            .domain_roles
            .entry(domain.to_owned())
            .or_insert(loaded)
            .clone())
    }

    async fn role_mappings(&self, domain: &str) -> AppResult<Arc<RoleMappingSet>> {
        if let Some(mappings) = self.cache.read().await.role_mappings.get(domain).cloned() {
            return Ok(mappings);
        }

        let loaded = match self
            .registry
            .load_role_mappings(domain, &self.environment)
            .await?
        {
            Some(mappings) => Arc::new(mappings),
            None => {
                info!(
                    domain,
                    environment = %self.environment,
                    "role mappings not found, treating as empty"
                );
                Arc::new(RoleMappingSet::default())
            }
        };

        let mut cache = self.cache.write().await;
        Ok(cache
            .role_mappings
            .entry(domain.to_owned())
            .or_insert(loaded)
            .clone())
    }
}
