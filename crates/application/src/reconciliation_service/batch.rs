use std::collections::BTreeMap;

use tabula_domain::{AccessControlResultInput, PrivacyEnforcementResultInput};
use tokio::sync::Semaphore;
use tracing::info;

use super::*;

impl ReconciliationService {
    /// Reconciles every table of one domain with a bounded worker pool.
    ///
    /// Tables are independent failure domains: each entry in the returned
    /// map carries its own outcome and one table's failure never affects
    /// another's. The call itself fails only when the domain's tables
    /// cannot be listed or an internal invariant is violated.
    pub async fn reconcile_domain(
        &self,
        domain: &str,
    ) -> AppResult<BTreeMap<String, TableSecurityOutcome>> {
        if domain.trim().is_empty() {
            return Err(AppError::Validation("domain must not be empty".to_owned()));
        }

        let tables = self.platform.list_tables(domain).await.map_err(|error| {
            AppError::Platform(format!(
                "failed to list tables for domain '{domain}': {error}"
            ))
        })?;
        info!(domain, tables = tables.len(), "starting domain reconciliation");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = tokio::task::JoinSet::new();

        for table in tables {
            if self.is_shutdown_requested() {
                info!(domain, "shutdown requested, not scheduling remaining tables");
                break;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| AppError::Internal("batch worker semaphore closed".to_owned()))?;
            let service = self.clone();
            let domain = domain.to_owned();
            join_set.spawn(async move {
                let _permit = permit;
                let outcome = service.reconcile_table(&domain, &table).await;
                (table, outcome)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((table, Ok(outcome))) => {
                    results.insert(table, outcome);
                }
                Ok((table, Err(error))) => {
                    warn!(table = table.as_str(), error = %error, "table reconciliation aborted");
                    let message = format!("reconciliation aborted: {error}");
                    let outcome = self.failed_outcome(&table, &message)?;
                    results.insert(table, outcome);
                }
                Err(error) => {
                    return Err(AppError::Internal(format!("batch worker panicked: {error}")));
                }
            }
        }

        Ok(results)
    }

    fn failed_outcome(&self, table: &str, message: &str) -> AppResult<TableSecurityOutcome> {
        let access = AccessControlResult::new(AccessControlResultInput {
            table: table.to_owned(),
            dry_run: self.dry_run,
            errors: vec![message.to_owned()],
            ..AccessControlResultInput::default()
        })?;
        let privacy = PrivacyEnforcementResult::new(PrivacyEnforcementResultInput {
            table: table.to_owned(),
            dry_run: self.dry_run,
            errors: vec![message.to_owned()],
            ..PrivacyEnforcementResultInput::default()
        })?;

        Ok(TableSecurityOutcome::new(access, privacy))
    }
}
