use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use tabula_application::{ApplyColumnMaskRequest, CatalogPlatform, ColumnMaskRow, GrantRow};
use tabula_core::{AppError, AppResult};
use tabula_domain::Privilege;
use tokio::sync::RwLock;

/// In-memory catalog platform for tests and local dry runs.
///
/// When a set of known identity groups is registered, granting to any other
/// group fails the way the real platform rejects a nonexistent principal.
/// Repeated grants are no-ops; revoking an absent privilege and dropping an
/// absent mask succeed.
#[derive(Debug, Default)]
pub struct InMemoryCatalogPlatform {
    tables: RwLock<BTreeMap<String, BTreeSet<String>>>,
    grants: RwLock<BTreeSet<(String, String, Privilege)>>,
    masks: RwLock<BTreeMap<(String, String), String>>,
    known_groups: RwLock<Option<HashSet<String>>>,
}

impl InMemoryCatalogPlatform {
    /// Creates an empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under a domain for batch enumeration.
    pub async fn register_table(&self, domain: &str, table: &str) {
        self.tables
            .write()
            .await
            .entry(domain.to_owned())
            .or_default()
            .insert(table.to_owned());
    }

    /// Restricts grantable principals to the given identity groups.
    pub async fn register_known_groups<I>(&self, groups: I)
    where
        I: IntoIterator<Item = String>,
    {
        *self.known_groups.write().await = Some(groups.into_iter().collect());
    }

    /// Seeds a pre-existing grant, bypassing principal validation.
    pub async fn seed_grant(&self, table: &str, identity_group: &str, privilege: Privilege) {
        self.grants
            .write()
            .await
            .insert((table.to_owned(), identity_group.to_owned(), privilege));
    }

    /// Seeds a pre-existing column mask.
    pub async fn seed_mask(&self, table: &str, column_name: &str, expression: &str) {
        self.masks.write().await.insert(
            (table.to_owned(), column_name.to_owned()),
            expression.to_owned(),
        );
    }

    /// Returns the current grants in key order.
    pub async fn grant_snapshot(&self) -> Vec<(String, String, Privilege)> {
        self.grants.read().await.iter().cloned().collect()
    }

    /// Returns the current masks as `(table, column, expression)` rows.
    pub async fn mask_snapshot(&self) -> Vec<(String, String, String)> {
        self.masks
            .read()
            .await
            .iter()
            .map(|((table, column), expression)| {
                (table.clone(), column.clone(), expression.clone())
            })
            .collect()
    }
}

#[async_trait]
impl CatalogPlatform for InMemoryCatalogPlatform {
    async fn list_tables(&self, domain: &str) -> AppResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .await
            .get(domain)
            .map(|tables| tables.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn granted_privileges(&self, _domain: &str, table: &str) -> AppResult<Vec<GrantRow>> {
        Ok(self
            .grants
            .read()
            .await
            .iter()
            .filter(|(grant_table, _, _)| grant_table == table)
            .map(|(_, group, privilege)| GrantRow {
                principal: group.clone(),
                principal_kind: "GROUP".to_owned(),
                privilege: privilege.as_str().to_owned(),
            })
            .collect())
    }

    async fn column_masks(&self, _domain: &str, table: &str) -> AppResult<Vec<ColumnMaskRow>> {
        Ok(self
            .masks
            .read()
            .await
            .iter()
            .filter(|((mask_table, _), _)| mask_table == table)
            .map(|((_, column), expression)| ColumnMaskRow {
                column_name: column.clone(),
                expression: Some(expression.clone()),
            })
            .collect())
    }

    async fn grant_privilege(
        &self,
        _domain: &str,
        table: &str,
        identity_group: &str,
        privilege: Privilege,
    ) -> AppResult<()> {
        if let Some(known) = self.known_groups.read().await.as_ref()
            && !known.contains(identity_group)
        {
            return Err(AppError::Platform(format!(
                "identity group '{identity_group}' does not exist on the platform"
            )));
        }

        self.grants
            .write()
            .await
            .insert((table.to_owned(), identity_group.to_owned(), privilege));
        Ok(())
    }

    async fn revoke_privilege(
        &self,
        _domain: &str,
        table: &str,
        identity_group: &str,
        privilege: Privilege,
    ) -> AppResult<()> {
        self.grants
            .write()
            .await
            .remove(&(table.to_owned(), identity_group.to_owned(), privilege));
        Ok(())
    }

    async fn apply_column_mask(&self, request: ApplyColumnMaskRequest) -> AppResult<()> {
        let expression = format!(
            "{}({})",
            request.strategy.as_str(),
            request.column_name
        );
        self.masks
            .write()
            .await
            .insert((request.table, request.column_name), expression);
        Ok(())
    }

    async fn drop_column_mask(
        &self,
        _domain: &str,
        table: &str,
        column_name: &str,
    ) -> AppResult<()> {
        self.masks
            .write()
            .await
            .remove(&(table.to_owned(), column_name.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tabula_application::CatalogPlatform;
    use tabula_core::AppError;
    use tabula_domain::Privilege;

    use super::InMemoryCatalogPlatform;

    #[tokio::test]
    async fn repeated_grants_collapse_to_one() {
        let platform = InMemoryCatalogPlatform::new();

        let first = platform
            .grant_privilege("sales", "orders", "grp-analysts", Privilege::Select)
            .await;
        let second = platform
            .grant_privilege("sales", "orders", "grp-analysts", Privilege::Select)
            .await;
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(platform.grant_snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_groups_are_rejected_when_registered() {
        let platform = InMemoryCatalogPlatform::new();
        platform
            .register_known_groups(["grp-analysts".to_owned()])
            .await;

        let rejected = platform
            .grant_privilege("sales", "orders", "grp-ghost", Privilege::Select)
            .await;
        assert!(matches!(rejected, Err(AppError::Platform(_))));

        let accepted = platform
            .grant_privilege("sales", "orders", "grp-analysts", Privilege::Select)
            .await;
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn revoking_an_absent_privilege_succeeds() {
        let platform = InMemoryCatalogPlatform::new();

        let revoked = platform
            .revoke_privilege("sales", "orders", "grp-analysts", Privilege::Modify)
            .await;
        assert!(revoked.is_ok());
        assert!(platform.grant_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn tables_are_listed_per_domain_in_order() {
        let platform = InMemoryCatalogPlatform::new();
        platform.register_table("sales", "orders").await;
        platform.register_table("sales", "customers").await;
        platform.register_table("finance", "ledger").await;

        let tables = platform.list_tables("sales").await;
        assert!(tables.is_ok_and(|tables| tables == ["customers", "orders"]));

        let unknown = platform.list_tables("marketing").await;
        assert!(unknown.is_ok_and(|tables| tables.is_empty()));
    }

    #[tokio::test]
    async fn masks_round_trip_through_the_platform() {
        let platform = InMemoryCatalogPlatform::new();
        platform.seed_mask("customers", "ssn", "legacy_mask(ssn)").await;

        let masks = platform.column_masks("sales", "customers").await;
        assert!(masks.is_ok_and(|masks| masks.len() == 1));

        let dropped = platform.drop_column_mask("sales", "customers", "ssn").await;
        assert!(dropped.is_ok());
        assert!(platform.mask_snapshot().await.is_empty());
    }
}
