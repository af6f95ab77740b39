use std::time::Instant;

use tabula_domain::{AccessControlResultInput, PrivilegeAction, PrivilegeDelta, diff_privileges};

use super::*;

impl ReconciliationService {
    /// Reconciles table-level privileges for one table.
    ///
    /// Unusable declared intent aborts before the delta computation and is
    /// reported inside the result, never as an empty intent: diffing against
    /// an accidentally empty intent would revoke every held privilege.
    pub async fn reconcile_access(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<AccessControlResult> {
        self.validate_target(domain, table)?;
        let started = Instant::now();

        let intended = match self.intent_resolver.resolve_privileges(domain, table).await {
            Ok(intents) => intents,
            Err(error @ AppError::Internal(_)) => return Err(error),
            Err(error) => {
                warn!(domain, table, error = %error, "declared intent is unusable");
                let result = AccessControlResult::new(AccessControlResultInput {
                    table: table.to_owned(),
                    dry_run: self.dry_run,
                    elapsed: started.elapsed(),
                    errors: vec![format!("failed to resolve declared intent: {error}")],
                    ..AccessControlResultInput::default()
                })?;
                self.record_access(&result).await;
                return Ok(result);
            }
        };

        let actual = self.state_inspector.observed_privileges(domain, table).await;
        let diff = diff_privileges(&intended, &actual)?;

        let mut grants_attempted = 0_usize;
        let mut grants_succeeded = 0_usize;
        let mut grants_failed = 0_usize;
        let mut revokes_attempted = 0_usize;
        let mut revokes_succeeded = 0_usize;
        let mut revokes_failed = 0_usize;
        let mut errors = Vec::new();

        for delta in diff.deltas() {
            match delta.action() {
                PrivilegeAction::Grant => {
                    grants_attempted += 1;
                    match self.apply_privilege_delta(domain, delta).await {
                        Ok(()) => grants_succeeded += 1,
                        Err(error) => {
                            grants_failed += 1;
                            errors.push(format!(
                                "GRANT failed on '{}': {error}",
                                delta.identity_group()
                            ));
                        }
                    }
                }
                PrivilegeAction::Revoke => {
                    revokes_attempted += 1;
                    match self.apply_privilege_delta(domain, delta).await {
                        Ok(()) => revokes_succeeded += 1,
                        Err(error) => {
                            revokes_failed += 1;
                            errors.push(format!(
                                "REVOKE failed on '{}': {error}",
                                delta.identity_group()
                            ));
                        }
                    }
                }
            }
        }

        let result = AccessControlResult::new(AccessControlResultInput {
            table: table.to_owned(),
            dry_run: self.dry_run,
            intended_count: intended.len(),
            actual_count: actual.len(),
            no_change_count: diff.no_change_count(),
            grants_attempted,
            grants_succeeded,
            grants_failed,
            revokes_attempted,
            revokes_succeeded,
            revokes_failed,
            elapsed: started.elapsed(),
            errors,
        })?;

        self.record_access(&result).await;
        Ok(result)
    }

    async fn apply_privilege_delta(&self, domain: &str, delta: &PrivilegeDelta) -> AppResult<()> {
        if self.dry_run {
            return Ok(());
        }

        match delta.action() {
            PrivilegeAction::Grant => {
                self.platform
                    .grant_privilege(
                        domain,
                        delta.table(),
                        delta.identity_group(),
                        delta.privilege(),
                    )
                    .await
            }
            PrivilegeAction::Revoke => {
                self.platform
                    .revoke_privilege(
                        domain,
                        delta.table(),
                        delta.identity_group(),
                        delta.privilege(),
                    )
                    .await
            }
        }
    }
}
