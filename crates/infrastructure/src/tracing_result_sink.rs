use async_trait::async_trait;
use tabula_application::ResultSink;
use tabula_core::AppResult;
use tabula_domain::{AccessControlResult, PrivacyEnforcementResult};
use tracing::{info, warn};

/// Result sink that emits structured log records.
///
/// Suits interactive runs and deployments that collect reconciliation
/// outcomes from logs instead of a reporting store.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingResultSink;

impl TracingResultSink {
    /// Creates a sink writing to the active subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResultSink for TracingResultSink {
    async fn record_access_result(&self, result: &AccessControlResult) -> AppResult<()> {
        if result.is_successful() {
            info!(
                table = result.table(),
                dry_run = result.dry_run(),
                grants = result.grants_succeeded(),
                revokes = result.revokes_succeeded(),
                unchanged = result.no_change_count(),
                elapsed_ms = result.elapsed().as_millis() as u64,
                "access control reconciled"
            );
        } else {
            warn!(
                table = result.table(),
                dry_run = result.dry_run(),
                grants_failed = result.grants_failed(),
                revokes_failed = result.revokes_failed(),
                errors = result.errors().len(),
                elapsed_ms = result.elapsed().as_millis() as u64,
                "access control reconciliation recorded failures"
            );
        }
        Ok(())
    }

    async fn record_privacy_result(&self, result: &PrivacyEnforcementResult) -> AppResult<()> {
        if result.is_successful() {
            info!(
                table = result.table(),
                dry_run = result.dry_run(),
                masks_applied = result.creates_succeeded(),
                masks_dropped = result.drops_succeeded(),
                elapsed_ms = result.elapsed().as_millis() as u64,
                "column masking reconciled"
            );
        } else {
            warn!(
                table = result.table(),
                dry_run = result.dry_run(),
                creates_failed = result.creates_failed(),
                drops_failed = result.drops_failed(),
                errors = result.errors().len(),
                elapsed_ms = result.elapsed().as_millis() as u64,
                "column masking reconciliation recorded failures"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tabula_application::ResultSink;
    use tabula_domain::{AccessControlResult, AccessControlResultInput};

    use super::TracingResultSink;

    #[tokio::test]
    async fn recording_never_fails() {
        let result = AccessControlResult::new(AccessControlResultInput {
            table: "orders".to_owned(),
            dry_run: false,
            intended_count: 2,
            actual_count: 2,
            no_change_count: 2,
            grants_attempted: 0,
            grants_succeeded: 0,
            grants_failed: 0,
            revokes_attempted: 0,
            revokes_succeeded: 0,
            revokes_failed: 0,
            elapsed: Duration::from_millis(12),
            errors: Vec::new(),
        });
        assert!(result.is_ok());
        let Ok(result) = result else {
            return;
        };

        let sink = TracingResultSink::new();
        assert!(sink.record_access_result(&result).await.is_ok());
    }
}
