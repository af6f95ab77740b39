use async_trait::async_trait;
use tabula_core::AppResult;
use tabula_domain::{
    AccessControlResult, MaskingDelta, MaskingStrategy, PrivacyEnforcementResult, Privilege,
};

/// One privilege row as reported by the platform, before filtering.
///
/// Rows are raw on purpose: principals that are not groups and privileges
/// outside the managed set are platform realities the inspector filters
/// out, not parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRow {
    /// Principal holding the privilege.
    pub principal: String,
    /// Principal kind as reported by the platform, `GROUP` for groups.
    pub principal_kind: String,
    /// Privilege name as reported by the platform.
    pub privilege: String,
}

/// One column-mask row as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMaskRow {
    /// Column the row describes.
    pub column_name: String,
    /// Bound masking expression, `None` when the column is unmasked.
    pub expression: Option<String>,
}

/// Request to assert a masking function and bind it to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyColumnMaskRequest {
    /// Domain the table belongs to.
    pub domain: String,
    /// Table the masked column belongs to.
    pub table: String,
    /// Column to mask.
    pub column_name: String,
    /// Platform data type of the column.
    pub column_type: String,
    /// Masking strategy to render.
    pub strategy: MaskingStrategy,
    /// Identity groups permitted to read unmasked values, in sorted order.
    pub exempt_groups: Vec<String>,
}

impl ApplyColumnMaskRequest {
    /// Builds a request from a create delta, or `None` for a drop delta.
    #[must_use]
    pub fn from_delta(domain: &str, delta: &MaskingDelta) -> Option<Self> {
        match delta {
            MaskingDelta::Create {
                table,
                column_name,
                column_type,
                strategy,
                exempt_groups,
                ..
            } => Some(Self {
                domain: domain.to_owned(),
                table: table.clone(),
                column_name: column_name.clone(),
                column_type: column_type.clone(),
                strategy: *strategy,
                exempt_groups: exempt_groups.iter().cloned().collect(),
            }),
            MaskingDelta::Drop { .. } => None,
        }
    }
}

/// Mutating and inspecting port for the governed catalog platform.
///
/// Grant and mask assertions are idempotent on the platform side, so the
/// reconciler re-runs them without checking pre-state. Revoking an absent
/// privilege and dropping an absent mask succeed.
#[async_trait]
pub trait CatalogPlatform: Send + Sync {
    /// Lists the tables of one domain.
    async fn list_tables(&self, domain: &str) -> AppResult<Vec<String>>;

    /// Returns the privileges currently granted on one table.
    async fn granted_privileges(&self, domain: &str, table: &str) -> AppResult<Vec<GrantRow>>;

    /// Returns the column masks currently applied on one table.
    async fn column_masks(&self, domain: &str, table: &str) -> AppResult<Vec<ColumnMaskRow>>;

    /// Asserts one privilege for one identity group.
    async fn grant_privilege(
        &self,
        domain: &str,
        table: &str,
        identity_group: &str,
        privilege: Privilege,
    ) -> AppResult<()>;

    /// Removes one privilege from one identity group.
    async fn revoke_privilege(
        &self,
        domain: &str,
        table: &str,
        identity_group: &str,
        privilege: Privilege,
    ) -> AppResult<()>;

    /// Asserts a masking function and binds it to a column.
    async fn apply_column_mask(&self, request: ApplyColumnMaskRequest) -> AppResult<()>;

    /// Unbinds and removes the masking function of a column.
    async fn drop_column_mask(
        &self,
        domain: &str,
        table: &str,
        column_name: &str,
    ) -> AppResult<()>;
}

/// Observability port receiving finished reconciliation results.
///
/// Recording failures must never fail the reconciliation that produced the
/// result, so callers absorb sink errors.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Records one access-control result.
    async fn record_access_result(&self, result: &AccessControlResult) -> AppResult<()>;

    /// Records one privacy enforcement result.
    async fn record_privacy_result(&self, result: &PrivacyEnforcementResult) -> AppResult<()>;
}

/// Sink that discards every result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResultSink;

#[async_trait]
impl ResultSink for NullResultSink {
    async fn record_access_result(&self, _result: &AccessControlResult) -> AppResult<()> {
        Ok(())
    }

    async fn record_privacy_result(&self, _result: &PrivacyEnforcementResult) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tabula_domain::{MaskingDelta, MaskingIntent, MaskingIntentInput};

    use super::ApplyColumnMaskRequest;

    #[test]
    fn mask_request_is_built_from_create_deltas_only() {
        let intent = MaskingIntent::new(MaskingIntentInput {
            table: "customers".to_owned(),
            column_name: "email".to_owned(),
            column_type: "string".to_owned(),
            classification: tabula_domain::PrivacyClassification::Pii,
            strategy: tabula_domain::MaskingStrategy::Hash,
            exempt_groups: vec!["grp-b".to_owned(), "grp-a".to_owned()],
            reason: "classified pii".to_owned(),
        });
        assert!(intent.is_ok());
        let Ok(intent) = intent else {
            return;
        };

        let create = MaskingDelta::create(&intent);
        let request = ApplyColumnMaskRequest::from_delta("sales", &create);
        assert!(request.as_ref().is_some_and(|request| request.domain == "sales"));
        assert_eq!(
            request.map(|request| request.exempt_groups),
            Some(vec!["grp-a".to_owned(), "grp-b".to_owned()])
        );

        let observed = tabula_domain::ObservedMask::new("customers", "ssn", "mask_fn(ssn)");
        let Ok(observed) = observed else {
            return;
        };
        let drop = MaskingDelta::drop_mask(&observed, "stale");
        assert!(ApplyColumnMaskRequest::from_delta("sales", &drop).is_none());
    }
}
