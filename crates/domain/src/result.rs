use std::time::Duration;

use tabula_core::{AppError, AppResult};

/// Input for [`AccessControlResult::new`].
#[derive(Debug, Clone, Default)]
pub struct AccessControlResultInput {
    /// Table the reconciliation ran against.
    pub table: String,
    /// Whether mutating calls were skipped.
    pub dry_run: bool,
    /// Number of intended privilege facts.
    pub intended_count: usize,
    /// Number of observed privilege facts.
    pub actual_count: usize,
    /// Number of facts present in both intent and actual.
    pub no_change_count: usize,
    /// Number of grant deltas attempted.
    pub grants_attempted: usize,
    /// Number of grant deltas applied successfully.
    pub grants_succeeded: usize,
    /// Number of grant deltas that failed.
    pub grants_failed: usize,
    /// Number of revoke deltas attempted.
    pub revokes_attempted: usize,
    /// Number of revoke deltas applied successfully.
    pub revokes_succeeded: usize,
    /// Number of revoke deltas that failed.
    pub revokes_failed: usize,
    /// Wall-clock time of the full pipeline.
    pub elapsed: Duration,
    /// Error messages in application order.
    pub errors: Vec<String>,
}

/// Immutable outcome of one table-level access-control reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlResult {
    table: String,
    dry_run: bool,
    intended_count: usize,
    actual_count: usize,
    no_change_count: usize,
    grants_attempted: usize,
    grants_succeeded: usize,
    grants_failed: usize,
    revokes_attempted: usize,
    revokes_succeeded: usize,
    revokes_failed: usize,
    elapsed: Duration,
    errors: Vec<String>,
}

impl AccessControlResult {
    /// Creates a validated result summary.
    ///
    /// Attempted counts must equal succeeded plus failed per action. A
    /// mismatch indicates a defect in the applier, not an environmental
    /// condition, so it is fatal.
    pub fn new(input: AccessControlResultInput) -> AppResult<Self> {
        if input.table.trim().is_empty() {
            return Err(AppError::Validation(
                "access-control result requires a table name".to_owned(),
            ));
        }
        if input.grants_attempted != input.grants_succeeded + input.grants_failed {
            return Err(AppError::Internal(format!(
                "grant counts do not reconcile for table '{}': {} attempted, {} succeeded, {} failed",
                input.table, input.grants_attempted, input.grants_succeeded, input.grants_failed
            )));
        }
        if input.revokes_attempted != input.revokes_succeeded + input.revokes_failed {
            return Err(AppError::Internal(format!(
                "revoke counts do not reconcile for table '{}': {} attempted, {} succeeded, {} failed",
                input.table, input.revokes_attempted, input.revokes_succeeded, input.revokes_failed
            )));
        }

        Ok(Self {
            table: input.table,
            dry_run: input.dry_run,
            intended_count: input.intended_count,
            actual_count: input.actual_count,
            no_change_count: input.no_change_count,
            grants_attempted: input.grants_attempted,
            grants_succeeded: input.grants_succeeded,
            grants_failed: input.grants_failed,
            revokes_attempted: input.revokes_attempted,
            revokes_succeeded: input.revokes_succeeded,
            revokes_failed: input.revokes_failed,
            elapsed: input.elapsed,
            errors: input.errors,
        })
    }

    /// Returns the table the reconciliation ran against.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns whether mutating calls were skipped.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns the number of intended privilege facts.
    #[must_use]
    pub fn intended_count(&self) -> usize {
        self.intended_count
    }

    /// Returns the number of observed privilege facts.
    #[must_use]
    pub fn actual_count(&self) -> usize {
        self.actual_count
    }

    /// Returns the number of facts that required no change.
    #[must_use]
    pub fn no_change_count(&self) -> usize {
        self.no_change_count
    }

    /// Returns the number of grant deltas attempted.
    #[must_use]
    pub fn grants_attempted(&self) -> usize {
        self.grants_attempted
    }

    /// Returns the number of grant deltas applied successfully.
    #[must_use]
    pub fn grants_succeeded(&self) -> usize {
        self.grants_succeeded
    }

    /// Returns the number of grant deltas that failed.
    #[must_use]
    pub fn grants_failed(&self) -> usize {
        self.grants_failed
    }

    /// Returns the number of revoke deltas attempted.
    #[must_use]
    pub fn revokes_attempted(&self) -> usize {
        self.revokes_attempted
    }

    /// Returns the number of revoke deltas applied successfully.
    #[must_use]
    pub fn revokes_succeeded(&self) -> usize {
        self.revokes_succeeded
    }

    /// Returns the number of revoke deltas that failed.
    #[must_use]
    pub fn revokes_failed(&self) -> usize {
        self.revokes_failed
    }

    /// Returns the wall-clock time of the full pipeline.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns error messages in application order.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns the number of deltas attempted.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.grants_attempted + self.revokes_attempted
    }

    /// Returns whether the run completed without failures or errors.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.grants_failed == 0 && self.revokes_failed == 0 && self.errors.is_empty()
    }

    /// Returns the percentage of attempted deltas that succeeded.
    ///
    /// A converged table with nothing to change reports `100.0`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_changes();
        if total == 0 {
            return 100.0;
        }

        let succeeded = self.grants_succeeded + self.revokes_succeeded;
        (succeeded as f64 / total as f64) * 100.0
    }

    /// Renders a one-line summary suitable for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} granted, {} revoked, {} unchanged, {} failed in {}ms",
            self.table,
            self.grants_succeeded,
            self.revokes_succeeded,
            self.no_change_count,
            self.grants_failed + self.revokes_failed,
            self.elapsed.as_millis()
        )
    }
}

/// Input for [`PrivacyEnforcementResult::new`].
#[derive(Debug, Clone, Default)]
pub struct PrivacyEnforcementResultInput {
    /// Table the reconciliation ran against.
    pub table: String,
    /// Whether mutating calls were skipped.
    pub dry_run: bool,
    /// Number of intended masking facts.
    pub intended_count: usize,
    /// Number of observed masks.
    pub observed_count: usize,
    /// Number of create deltas attempted.
    pub creates_attempted: usize,
    /// Number of create deltas applied successfully.
    pub creates_succeeded: usize,
    /// Number of create deltas that failed.
    pub creates_failed: usize,
    /// Number of drop deltas attempted.
    pub drops_attempted: usize,
    /// Number of drop deltas applied successfully.
    pub drops_succeeded: usize,
    /// Number of drop deltas that failed.
    pub drops_failed: usize,
    /// Wall-clock time of the full pipeline.
    pub elapsed: Duration,
    /// Error messages in application order.
    pub errors: Vec<String>,
}

/// Immutable outcome of one table-level masking reconciliation.
///
/// Masking has no steady-state no-op, so unlike [`AccessControlResult`]
/// there is no unchanged count: every intended column is re-asserted on
/// every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyEnforcementResult {
    table: String,
    dry_run: bool,
    intended_count: usize,
    observed_count: usize,
    creates_attempted: usize,
    creates_succeeded: usize,
    creates_failed: usize,
    drops_attempted: usize,
    drops_succeeded: usize,
    drops_failed: usize,
    elapsed: Duration,
    errors: Vec<String>,
}

impl PrivacyEnforcementResult {
    /// Creates a validated result summary.
    ///
    /// Attempted counts must equal succeeded plus failed per action. A
    /// mismatch indicates a defect in the applier, not an environmental
    /// condition, so it is fatal.
    pub fn new(input: PrivacyEnforcementResultInput) -> AppResult<Self> {
        if input.table.trim().is_empty() {
            return Err(AppError::Validation(
                "privacy enforcement result requires a table name".to_owned(),
            ));
        }
        if input.creates_attempted != input.creates_succeeded + input.creates_failed {
            return Err(AppError::Internal(format!(
                "mask create counts do not reconcile for table '{}': {} attempted, {} succeeded, {} failed",
                input.table, input.creates_attempted, input.creates_succeeded, input.creates_failed
            )));
        }
        if input.drops_attempted != input.drops_succeeded + input.drops_failed {
            return Err(AppError::Internal(format!(
                "mask drop counts do not reconcile for table '{}': {} attempted, {} succeeded, {} failed",
                input.table, input.drops_attempted, input.drops_succeeded, input.drops_failed
            )));
        }

        Ok(Self {
            table: input.table,
            dry_run: input.dry_run,
            intended_count: input.intended_count,
            observed_count: input.observed_count,
            creates_attempted: input.creates_attempted,
            creates_succeeded: input.creates_succeeded,
            creates_failed: input.creates_failed,
            drops_attempted: input.drops_attempted,
            drops_succeeded: input.drops_succeeded,
            drops_failed: input.drops_failed,
            elapsed: input.elapsed,
            errors: input.errors,
        })
    }

    /// Returns the table the reconciliation ran against.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns whether mutating calls were skipped.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns the number of intended masking facts.
    #[must_use]
    pub fn intended_count(&self) -> usize {
        self.intended_count
    }

    /// Returns the number of observed masks.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.observed_count
    }

    /// Returns the number of create deltas attempted.
    #[must_use]
    pub fn creates_attempted(&self) -> usize {
        self.creates_attempted
    }

    /// Returns the number of create deltas applied successfully.
    #[must_use]
    pub fn creates_succeeded(&self) -> usize {
        self.creates_succeeded
    }

    /// Returns the number of create deltas that failed.
    #[must_use]
    pub fn creates_failed(&self) -> usize {
        self.creates_failed
    }

    /// Returns the number of drop deltas attempted.
    #[must_use]
    pub fn drops_attempted(&self) -> usize {
        self.drops_attempted
    }

    /// Returns the number of drop deltas applied successfully.
    #[must_use]
    pub fn drops_succeeded(&self) -> usize {
        self.drops_succeeded
    }

    /// Returns the number of drop deltas that failed.
    #[must_use]
    pub fn drops_failed(&self) -> usize {
        self.drops_failed
    }

    /// Returns the wall-clock time of the full pipeline.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns error messages in application order.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns the number of deltas attempted.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.creates_attempted + self.drops_attempted
    }

    /// Returns whether the run completed without failures or errors.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.creates_failed == 0 && self.drops_failed == 0 && self.errors.is_empty()
    }

    /// Returns the percentage of attempted deltas that succeeded.
    ///
    /// A table with no classified columns and no stale masks reports `100.0`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_changes();
        if total == 0 {
            return 100.0;
        }

        let succeeded = self.creates_succeeded + self.drops_succeeded;
        (succeeded as f64 / total as f64) * 100.0
    }

    /// Renders a one-line summary suitable for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} masks asserted, {} masks dropped, {} failed in {}ms",
            self.table,
            self.creates_succeeded,
            self.drops_succeeded,
            self.creates_failed + self.drops_failed,
            self.elapsed.as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{
        AccessControlResult, AccessControlResultInput, PrivacyEnforcementResult,
        PrivacyEnforcementResultInput,
    };

    fn access_input() -> AccessControlResultInput {
        AccessControlResultInput {
            table: "orders".to_owned(),
            elapsed: Duration::from_millis(12),
            ..AccessControlResultInput::default()
        }
    }

    #[test]
    fn converged_table_reports_full_success() {
        let result = AccessControlResult::new(AccessControlResultInput {
            no_change_count: 3,
            intended_count: 3,
            actual_count: 3,
            ..access_input()
        });

        assert!(result.as_ref().is_ok_and(|result| result.is_successful()));
        assert_eq!(result.as_ref().map(AccessControlResult::total_changes), Ok(0));
        let rate = result.map(|result| result.success_rate()).unwrap_or_default();
        assert!((rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn partial_failure_is_reflected_in_rate_and_flag() {
        let result = AccessControlResult::new(AccessControlResultInput {
            grants_attempted: 9,
            grants_succeeded: 9,
            revokes_attempted: 1,
            revokes_failed: 1,
            errors: vec!["REVOKE failed on 'orders': group vanished".to_owned()],
            ..access_input()
        });

        assert!(result.as_ref().is_ok_and(|result| !result.is_successful()));
        let rate = result.map(|result| result.success_rate()).unwrap_or_default();
        assert!((rate - 90.0).abs() < 1e-9);
    }

    #[test]
    fn errors_alone_mark_the_run_unsuccessful() {
        let result = AccessControlResult::new(AccessControlResultInput {
            errors: vec!["platform unreachable".to_owned()],
            ..access_input()
        });

        assert!(result.is_ok_and(|result| !result.is_successful()));
    }

    #[test]
    fn mismatched_grant_counts_are_fatal() {
        let result = AccessControlResult::new(AccessControlResultInput {
            grants_attempted: 2,
            grants_succeeded: 1,
            grants_failed: 0,
            ..access_input()
        });

        assert!(result.is_err());
    }

    #[test]
    fn privacy_result_validates_counts_per_action() {
        let result = PrivacyEnforcementResult::new(PrivacyEnforcementResultInput {
            table: "customers".to_owned(),
            drops_attempted: 1,
            drops_succeeded: 0,
            drops_failed: 0,
            ..PrivacyEnforcementResultInput::default()
        });

        assert!(result.is_err());
    }

    #[test]
    fn privacy_result_reports_full_success_without_changes() {
        let result = PrivacyEnforcementResult::new(PrivacyEnforcementResultInput {
            table: "customers".to_owned(),
            ..PrivacyEnforcementResultInput::default()
        });

        assert!(result.as_ref().is_ok_and(|result| result.is_successful()));
        let rate = result.map(|result| result.success_rate()).unwrap_or_default();
        assert!((rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn summaries_render_counts_and_elapsed_time() {
        let result = AccessControlResult::new(AccessControlResultInput {
            grants_attempted: 2,
            grants_succeeded: 2,
            no_change_count: 1,
            ..access_input()
        });

        let summary = result.map(|result| result.summary()).unwrap_or_default();
        assert_eq!(summary, "orders: 2 granted, 0 revoked, 1 unchanged, 0 failed in 12ms");
    }
}
