use std::collections::{BTreeMap, BTreeSet};

use tabula_core::{AppError, AppResult};

use crate::access::{ActualPrivilege, PrivilegeAction, PrivilegeDelta, PrivilegeIntent, PrivilegeKey};
use crate::privacy::{MaskingDelta, MaskingIntent, ObservedMask};

/// Reason attached to revocations of privileges absent from declared intent.
pub const REVOKE_REASON: &str = "no longer present in declared intent";

/// Reason attached to mask removals for columns without privacy metadata.
pub const MASK_DROP_REASON: &str = "no privacy classification declared for this column";

/// Outcome of the symmetric privilege set-reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeDiff {
    deltas: Vec<PrivilegeDelta>,
    no_change_count: usize,
}

impl PrivilegeDiff {
    /// Returns all required changes, grants before revokes, in key order.
    #[must_use]
    pub fn deltas(&self) -> &[PrivilegeDelta] {
        &self.deltas
    }

    /// Consumes the diff and returns the required changes.
    #[must_use]
    pub fn into_deltas(self) -> Vec<PrivilegeDelta> {
        self.deltas
    }

    /// Returns how many facts matched between intent and actual state.
    #[must_use]
    pub fn no_change_count(&self) -> usize {
        self.no_change_count
    }

    /// Iterates the grant deltas.
    pub fn grants(&self) -> impl Iterator<Item = &PrivilegeDelta> {
        self.deltas
            .iter()
            .filter(|delta| delta.action() == PrivilegeAction::Grant)
    }

    /// Iterates the revoke deltas.
    pub fn revokes(&self) -> impl Iterator<Item = &PrivilegeDelta> {
        self.deltas
            .iter()
            .filter(|delta| delta.action() == PrivilegeAction::Revoke)
    }

    /// Returns whether actual state already matches intent.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Renders a one-line summary of the diff.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} to grant, {} to revoke, {} unchanged",
            self.grants().count(),
            self.revokes().count(),
            self.no_change_count
        )
    }
}

/// Computes the minimal symmetric privilege delta between intent and actual.
///
/// Intent and actual are treated as sets over [`PrivilegeKey`]: facts present
/// only in intent become grants carrying the intent's reason, facts present
/// only in actual become revokes carrying [`REVOKE_REASON`], and facts
/// present in both produce no delta. Duplicate facts collapse to the first
/// occurrence. Output order is deterministic regardless of input order.
pub fn diff_privileges(
    intended: &[PrivilegeIntent],
    actual: &[ActualPrivilege],
) -> AppResult<PrivilegeDiff> {
    let mut intended_by_key: BTreeMap<PrivilegeKey, &PrivilegeIntent> = BTreeMap::new();
    for intent in intended {
        intended_by_key.entry(intent.key()).or_insert(intent);
    }

    let actual_keys: BTreeSet<PrivilegeKey> = actual.iter().map(ActualPrivilege::key).collect();

    let mut deltas = Vec::new();
    let mut no_change_count = 0_usize;

    for (key, intent) in &intended_by_key {
        if actual_keys.contains(key) {
            no_change_count = no_change_count.saturating_add(1);
            continue;
        }

        let delta = PrivilegeDelta::grant(
            key.table(),
            key.identity_group(),
            key.privilege(),
            intent.reason(),
        )
        .map_err(|error| {
            AppError::Internal(format!("failed to construct grant delta: {error}"))
        })?;
        deltas.push(delta);
    }

    for key in &actual_keys {
        if intended_by_key.contains_key(key) {
            continue;
        }

        let delta = PrivilegeDelta::revoke(
            key.table(),
            key.identity_group(),
            key.privilege(),
            REVOKE_REASON,
        )
        .map_err(|error| {
            AppError::Internal(format!("failed to construct revoke delta: {error}"))
        })?;
        deltas.push(delta);
    }

    Ok(PrivilegeDiff {
        deltas,
        no_change_count,
    })
}

/// Outcome of the asymmetric masking reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskingDiff {
    deltas: Vec<MaskingDelta>,
}

impl MaskingDiff {
    /// Returns all required changes, creates before drops, in column order.
    #[must_use]
    pub fn deltas(&self) -> &[MaskingDelta] {
        &self.deltas
    }

    /// Consumes the diff and returns the required changes.
    #[must_use]
    pub fn into_deltas(self) -> Vec<MaskingDelta> {
        self.deltas
    }

    /// Iterates the create deltas.
    pub fn creates(&self) -> impl Iterator<Item = &MaskingDelta> {
        self.deltas
            .iter()
            .filter(|delta| matches!(delta, MaskingDelta::Create { .. }))
    }

    /// Iterates the drop deltas.
    pub fn drops(&self) -> impl Iterator<Item = &MaskingDelta> {
        self.deltas
            .iter()
            .filter(|delta| matches!(delta, MaskingDelta::Drop { .. }))
    }

    /// Returns whether no change is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Renders a one-line summary of the diff.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} masks to assert, {} masks to drop",
            self.creates().count(),
            self.drops().count()
        )
    }
}

/// Computes the asymmetric masking delta between intent and observed state.
///
/// Every intended column yields a create delta unconditionally; masking has
/// no steady-state no-op. Observed masks on columns without intent yield a
/// drop delta carrying [`MASK_DROP_REASON`]. Keyed by `(table, column)`,
/// duplicates collapse to the first occurrence, output order is
/// deterministic.
#[must_use]
pub fn diff_masks(intended: &[MaskingIntent], observed: &[ObservedMask]) -> MaskingDiff {
    let mut intended_by_column: BTreeMap<(String, String), &MaskingIntent> = BTreeMap::new();
    for intent in intended {
        intended_by_column
            .entry((intent.table().to_owned(), intent.column_name().to_owned()))
            .or_insert(intent);
    }

    let mut observed_by_column: BTreeMap<(String, String), &ObservedMask> = BTreeMap::new();
    for mask in observed {
        observed_by_column
            .entry((mask.table().to_owned(), mask.column_name().to_owned()))
            .or_insert(mask);
    }

    let mut deltas = Vec::new();

    for intent in intended_by_column.values() {
        deltas.push(MaskingDelta::create(intent));
    }

    for (column, mask) in &observed_by_column {
        if intended_by_column.contains_key(column) {
            continue;
        }

        deltas.push(MaskingDelta::drop_mask(mask, MASK_DROP_REASON));
    }

    MaskingDiff { deltas }
}
