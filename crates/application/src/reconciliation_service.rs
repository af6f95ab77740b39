use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tabula_core::{AppError, AppResult};
use tabula_domain::{AccessControlResult, PrivacyEnforcementResult};
use tracing::warn;

use crate::intent_resolver::IntentResolver;
use crate::platform_ports::{CatalogPlatform, ResultSink};
use crate::state_inspector::StateInspector;

mod access;
mod batch;
mod privacy;
mod reports;

pub use reports::{AccessAuditReport, PrivacyPreview};


/// Default bound on concurrently reconciled tables in a batch run.
pub const DEFAULT_MAX_CONCURRENCY: usize = 12;

/// Combined outcome of access and privacy reconciliation for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSecurityOutcome {
    access: AccessControlResult,
    privacy: PrivacyEnforcementResult,
}

impl TableSecurityOutcome {
    /// Pairs the two per-table results.
    #[must_use]
    pub fn new(access: AccessControlResult, privacy: PrivacyEnforcementResult) -> Self {
        Self { access, privacy }
    }

    /// Returns the access-control result.
    #[must_use]
    pub fn access(&self) -> &AccessControlResult {
        &self.access
    }

    /// Returns the privacy enforcement result.
    #[must_use]
    pub fn privacy(&self) -> &PrivacyEnforcementResult {
        &self.privacy
    }

    /// Returns whether both reconciliations completed cleanly.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.access.is_successful() && self.privacy.is_successful()
    }
}

/// Differential reconciliation pipeline over one environment.
///
/// Each table-level call runs intent resolution, state inspection, delta
/// computation and application as one sequential pipeline. Environmental
/// failures surface inside the returned result; only internal invariant
/// violations propagate as errors.
#[derive(Clone)]
pub struct ReconciliationService {
    intent_resolver: Arc<IntentResolver>,
    state_inspector: Arc<StateInspector>,
    platform: Arc<dyn CatalogPlatform>,
    result_sink: Arc<dyn ResultSink>,
    dry_run: bool,
    max_concurrency: usize,
    shutdown: Arc<AtomicBool>,
}

impl ReconciliationService {
    /// Creates a reconciliation service.
    #[must_use]
    pub fn new(
        intent_resolver: Arc<IntentResolver>,
        state_inspector: Arc<StateInspector>,
        platform: Arc<dyn CatalogPlatform>,
        result_sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            intent_resolver,
            state_inspector,
            platform,
            result_sink,
            dry_run: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Switches the applier into preview mode.
    ///
    /// Deltas are computed identically either way; a dry run only skips the
    /// mutating platform calls and counts every delta as succeeded.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Bounds the batch worker pool, minimum one worker.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Returns whether the applier is in preview mode.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Asks a running batch to stop scheduling further tables.
    ///
    /// In-flight tables finish and report their results.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Drops registry documents cached by the intent resolver.
    pub async fn clear_cache(&self) {
        self.intent_resolver.clear_cache().await;
    }

    /// Reconciles table privileges and column masks in one pass.
    pub async fn reconcile_table(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<TableSecurityOutcome> {
        let access = self.reconcile_access(domain, table).await?;
        let privacy = self.reconcile_privacy(domain, table).await?;
        Ok(TableSecurityOutcome::new(access, privacy))
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn validate_target(&self, domain: &str, table: &str) -> AppResult<()> {
        if domain.trim().is_empty() {
            return Err(AppError::Validation("domain must not be empty".to_owned()));
        }
        if table.trim().is_empty() {
            return Err(AppError::Validation("table must not be empty".to_owned()));
        }

        Ok(())
    }

    async fn record_access(&self, result: &AccessControlResult) {
        if let Err(error) = self.result_sink.record_access_result(result).await {
            warn!(table = result.table(), error = %error, "failed to record access result");
        }
    }

    async fn record_privacy(&self, result: &PrivacyEnforcementResult) {
        if let Err(error) = self.result_sink.record_privacy_result(result).await {
            warn!(table = result.table(), error = %error, "failed to record privacy result");
        }
    }
}
