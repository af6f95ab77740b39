use std::time::Instant;

use tabula_domain::{MaskingDelta, PrivacyEnforcementResultInput, diff_masks};

use crate::platform_ports::ApplyColumnMaskRequest;

use super::*;

impl ReconciliationService {
    /// Reconciles column masks for one table.
    ///
    /// Every intended column is re-asserted on every call; only stale masks
    /// produce drops. Unusable declared intent aborts before the delta
    /// computation, mirroring the access pipeline: an accidentally empty
    /// intent would drop every bound mask.
    pub async fn reconcile_privacy(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<PrivacyEnforcementResult> {
        self.validate_target(domain, table)?;
        let started = Instant::now();

        let intended = match self.intent_resolver.resolve_masking(domain, table).await {
            Ok(intents) => intents,
            Err(error @ AppError::Internal(_)) => return Err(error),
            Err(error) => {
                warn!(domain, table, error = %error, "declared masking intent is unusable");
                let result = PrivacyEnforcementResult::new(PrivacyEnforcementResultInput {
                    table: table.to_owned(),
                    dry_run: self.dry_run,
                    elapsed: started.elapsed(),
                    errors: vec![format!("failed to resolve declared intent: {error}")],
                    ..PrivacyEnforcementResultInput::default()
                })?;
                self.record_privacy(&result).await;
                return Ok(result);
            }
        };

        let observed = self.state_inspector.observed_masks(domain, table).await;
        let diff = diff_masks(&intended, &observed);

        let mut creates_attempted = 0_usize;
        let mut creates_succeeded = 0_usize;
        let mut creates_failed = 0_usize;
        let mut drops_attempted = 0_usize;
        let mut drops_succeeded = 0_usize;
        let mut drops_failed = 0_usize;
        let mut errors = Vec::new();

        for delta in diff.deltas() {
            match delta {
                MaskingDelta::Create { .. } => {
                    creates_attempted += 1;
                    match self.apply_masking_delta(domain, delta).await {
                        Ok(()) => creates_succeeded += 1,
                        Err(error) => {
                            creates_failed += 1;
                            errors.push(format!(
                                "CREATE failed on '{}': {error}",
                                delta.column_name()
                            ));
                        }
                    }
                }
                MaskingDelta::Drop { .. } => {
                    drops_attempted += 1;
                    match self.apply_masking_delta(domain, delta).await {
                        Ok(()) => drops_succeeded += 1,
                        Err(error) => {
                            drops_failed += 1;
                            errors.push(format!(
                                "DROP failed on '{}': {error}",
                                delta.column_name()
                            ));
                        }
                    }
                }
            }
        }

        let result = PrivacyEnforcementResult::new(PrivacyEnforcementResultInput {
            table: table.to_owned(),
            dry_run: self.dry_run,
            intended_count: intended.len(),
            observed_count: observed.len(),
            creates_attempted,
            creates_succeeded,
            creates_failed,
            drops_attempted,
            drops_succeeded,
            drops_failed,
            elapsed: started.elapsed(),
            errors,
        })?;

        self.record_privacy(&result).await;
        Ok(result)
    }

    async fn apply_masking_delta(&self, domain: &str, delta: &MaskingDelta) -> AppResult<()> {
        if self.dry_run {
            return Ok(());
        }

        match delta {
            MaskingDelta::Create { .. } => match ApplyColumnMaskRequest::from_delta(domain, delta)
            {
                Some(request) => self.platform.apply_column_mask(request).await,
                None => Err(AppError::Internal(
                    "mask request requires a create delta".to_owned(),
                )),
            },
            MaskingDelta::Drop {
                table, column_name, ..
            } => {
                self.platform
                    .drop_column_mask(domain, table, column_name)
                    .await
            }
        }
    }
}
