//! Domain entities and reconciliation invariants.

#![forbid(unsafe_code)]

mod access;
mod privacy;
mod reconcile;
mod result;

pub use access::{
    ActualPrivilege, DomainRoleSet, GlobalRole, GlobalRoleCatalog, Privilege, PrivilegeAction,
    PrivilegeDelta, PrivilegeIntent, PrivilegeKey, RoleDefinition, RoleMappingSet, RoleScope,
    SCOPE_WILDCARD,
};
pub use privacy::{
    ColumnPrivacyMetadata, MaskingDelta, MaskingIntent, MaskingIntentInput, MaskingStrategy,
    ObservedMask, PrivacyClassification,
};
pub use reconcile::{
    MASK_DROP_REASON, MaskingDiff, PrivilegeDiff, REVOKE_REASON, diff_masks, diff_privileges,
};
pub use result::{
    AccessControlResult, AccessControlResultInput, PrivacyEnforcementResult,
    PrivacyEnforcementResultInput,
};
