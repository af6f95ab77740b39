use serde::Serialize;
use tabula_domain::{MaskingDelta, PrivilegeDelta, diff_masks, diff_privileges};

use super::*;

/// Read-only compliance audit of one table's privileges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessAuditReport {
    table: String,
    intended_count: usize,
    actual_count: usize,
    no_change_count: usize,
    grants_needed: usize,
    revokes_needed: usize,
    is_compliant: bool,
    deltas: Vec<PrivilegeDelta>,
}

impl AccessAuditReport {
    /// Returns the audited table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
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

    /// Returns the number of facts already in their intended state.
    #[must_use]
    pub fn no_change_count(&self) -> usize {
        self.no_change_count
    }

    /// Returns how many grants a reconciliation would apply.
    #[must_use]
    pub fn grants_needed(&self) -> usize {
        self.grants_needed
    }

    /// Returns how many revokes a reconciliation would apply.
    #[must_use]
    pub fn revokes_needed(&self) -> usize {
        self.revokes_needed
    }

    /// Returns whether actual state already matches declared intent.
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.is_compliant
    }

    /// Returns the changes a reconciliation would apply.
    #[must_use]
    pub fn deltas(&self) -> &[PrivilegeDelta] {
        &self.deltas
    }
}

/// Preview of the masking changes one reconciliation would apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivacyPreview {
    table: String,
    intended_count: usize,
    observed_count: usize,
    creates_needed: usize,
    drops_needed: usize,
    deltas: Vec<MaskingDelta>,
}

impl PrivacyPreview {
    /// Returns the previewed table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
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

    /// Returns how many masks a reconciliation would assert.
    #[must_use]
    pub fn creates_needed(&self) -> usize {
        self.creates_needed
    }

    /// Returns how many masks a reconciliation would drop.
    #[must_use]
    pub fn drops_needed(&self) -> usize {
        self.drops_needed
    }

    /// Returns the changes a reconciliation would apply.
    #[must_use]
    pub fn deltas(&self) -> &[MaskingDelta] {
        &self.deltas
    }
}

impl ReconciliationService {
    /// Audits one table's privileges without applying anything.
    ///
    /// Unlike reconciliation, registry failures propagate here: an audit
    /// cannot mutate the platform, so surfacing a broken registry document
    /// as an error is more useful than a result wrapping it.
    pub async fn audit_table(&self, domain: &str, table: &str) -> AppResult<AccessAuditReport> {
        self.validate_target(domain, table)?;

        let intended = self.intent_resolver.resolve_privileges(domain, table).await?;
        let actual = self.state_inspector.observed_privileges(domain, table).await;
        let diff = diff_privileges(&intended, &actual)?;

        let grants_needed = diff.grants().count();
        let revokes_needed = diff.revokes().count();
        Ok(AccessAuditReport {
            table: table.to_owned(),
            intended_count: intended.len(),
            actual_count: actual.len(),
            no_change_count: diff.no_change_count(),
            grants_needed,
            revokes_needed,
            is_compliant: diff.is_converged(),
            deltas: diff.into_deltas(),
        })
    }

    /// Previews one table's masking changes without applying anything.
    pub async fn preview_privacy(&self, domain: &str, table: &str) -> AppResult<PrivacyPreview> {
        self.validate_target(domain, table)?;

        let intended = self.intent_resolver.resolve_masking(domain, table).await?;
        let observed = self.state_inspector.observed_masks(domain, table).await;
        let diff = diff_masks(&intended, &observed);

        let creates_needed = diff.creates().count();
        let drops_needed = diff.drops().count();
        Ok(PrivacyPreview {
            table: table.to_owned(),
            intended_count: intended.len(),
            observed_count: observed.len(),
            creates_needed,
            drops_needed,
            deltas: diff.into_deltas(),
        })
    }
}
