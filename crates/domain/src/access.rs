use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabula_core::{AppError, AppResult};

/// Wildcard sentinel accepted inside an include scope.
pub const SCOPE_WILDCARD: &str = "*";

/// Table-level privileges managed by the reconciliation engine.
///
/// Privilege values observed on the platform outside this enumeration
/// (ownership, schema usage and similar) are not managed and never
/// participate in a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
    /// Read access to table data.
    Select,
    /// Write access to table data.
    Modify,
    /// Full access to the table.
    AllPrivileges,
}

impl Privilege {
    /// Returns the SQL spelling used in platform statements.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Modify => "MODIFY",
            Self::AllPrivileges => "ALL PRIVILEGES",
        }
    }

    /// Returns all managed privileges.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Privilege] = &[
            Privilege::Select,
            Privilege::Modify,
            Privilege::AllPrivileges,
        ];

        ALL
    }
}

impl FromStr for Privilege {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase().replace(' ', "_");
        match normalized.as_str() {
            "SELECT" => Ok(Self::Select),
            "MODIFY" => Ok(Self::Modify),
            "ALL_PRIVILEGES" => Ok(Self::AllPrivileges),
            _ => Err(AppError::Validation(format!(
                "unknown privilege value '{value}'"
            ))),
        }
    }
}

/// Declared resource scope of a role.
///
/// A valid scope carries exactly one of `include` or `exclude`. Any other
/// shape covers nothing, so a misconfigured role grants nothing instead of
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude: Option<Vec<String>>,
}

impl RoleScope {
    /// Creates a scope covering the listed tables, or every table when the
    /// list contains [`SCOPE_WILDCARD`].
    #[must_use]
    pub fn include(tables: Vec<String>) -> Self {
        Self {
            include: Some(tables),
            exclude: None,
        }
    }

    /// Creates a scope covering every table except the listed ones.
    #[must_use]
    pub fn exclude(tables: Vec<String>) -> Self {
        Self {
            include: None,
            exclude: Some(tables),
        }
    }

    /// Returns whether the scope covers the named table.
    #[must_use]
    pub fn covers(&self, table: &str) -> bool {
        match (&self.include, &self.exclude) {
            (Some(included), None) => {
                included.iter().any(|entry| entry == SCOPE_WILDCARD)
                    || included.iter().any(|entry| entry == table)
            }
            (None, Some(excluded)) => !excluded.iter().any(|entry| entry == table),
            _ => false,
        }
    }
}

/// Domain-local role borrowing its privilege set from a shared global role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<RoleScope>,
    inherits: String,
}

impl RoleDefinition {
    /// Creates a role definition with a validated inheritance target.
    pub fn new(inherits: impl Into<String>, scope: Option<RoleScope>) -> AppResult<Self> {
        let inherits = inherits.into();
        if inherits.trim().is_empty() {
            return Err(AppError::Validation(
                "role inheritance target must not be empty".to_owned(),
            ));
        }

        Ok(Self { scope, inherits })
    }

    /// Returns the inherited global role name.
    #[must_use]
    pub fn inherits(&self) -> &str {
        self.inherits.as_str()
    }

    /// Returns whether this role covers the named table.
    ///
    /// A role without a declared scope covers nothing.
    #[must_use]
    pub fn covers(&self, table: &str) -> bool {
        self.scope.as_ref().is_some_and(|scope| scope.covers(table))
    }
}

/// Named privilege catalog shared across domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRole {
    privileges: Vec<Privilege>,
}

impl GlobalRole {
    /// Creates a global role from an ordered privilege set.
    ///
    /// Duplicate privileges collapse to the first occurrence.
    #[must_use]
    pub fn new(privileges: Vec<Privilege>) -> Self {
        let mut deduplicated = Vec::with_capacity(privileges.len());
        for privilege in privileges {
            if !deduplicated.contains(&privilege) {
                deduplicated.push(privilege);
            }
        }

        Self {
            privileges: deduplicated,
        }
    }

    /// Returns the privileges granted by this role.
    #[must_use]
    pub fn privileges(&self) -> &[Privilege] {
        &self.privileges
    }
}

/// Catalog of global roles keyed by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalRoleCatalog {
    roles: BTreeMap<String, GlobalRole>,
}

impl GlobalRoleCatalog {
    /// Creates a catalog from named global roles.
    #[must_use]
    pub fn new(roles: BTreeMap<String, GlobalRole>) -> Self {
        Self { roles }
    }

    /// Looks up a global role by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&GlobalRole> {
        self.roles.get(name)
    }

    /// Returns whether the catalog holds no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Role definitions of one domain, keyed by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainRoleSet {
    roles: BTreeMap<String, RoleDefinition>,
}

impl DomainRoleSet {
    /// Creates a role set from named role definitions.
    #[must_use]
    pub fn new(roles: BTreeMap<String, RoleDefinition>) -> Self {
        Self { roles }
    }

    /// Iterates roles in stable name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleDefinition)> {
        self.roles
            .iter()
            .map(|(name, role)| (name.as_str(), role))
    }

    /// Returns whether the set holds no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Environment-specific identity-group assignments, keyed by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMappingSet {
    mappings: BTreeMap<String, Vec<String>>,
}

impl RoleMappingSet {
    /// Creates a mapping set from role-to-group assignments.
    #[must_use]
    pub fn new(mappings: BTreeMap<String, Vec<String>>) -> Self {
        Self { mappings }
    }

    /// Returns the identity groups mapped to a role, empty when unmapped.
    #[must_use]
    pub fn groups_for(&self, role_name: &str) -> &[String] {
        self.mappings
            .get(role_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns whether the set holds no mappings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Identity projection shared by [`PrivilegeIntent`] and [`ActualPrivilege`].
///
/// Set arithmetic between intent and actual uses this key everywhere, so the
/// split between identity fields and metadata fields lives in one place.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrivilegeKey {
    table: String,
    identity_group: String,
    privilege: Privilege,
}

impl PrivilegeKey {
    /// Creates a key from its identity fields.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        identity_group: impl Into<String>,
        privilege: Privilege,
    ) -> Self {
        Self {
            table: table.into(),
            identity_group: identity_group.into(),
            privilege,
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the identity group.
    #[must_use]
    pub fn identity_group(&self) -> &str {
        self.identity_group.as_str()
    }

    /// Returns the privilege.
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }
}

/// A privilege an identity group should hold on a table, per declared intent.
///
/// The reason is descriptive metadata; identity for set arithmetic is the
/// [`PrivilegeKey`] projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivilegeIntent {
    table: String,
    identity_group: String,
    privilege: Privilege,
    reason: String,
}

impl PrivilegeIntent {
    /// Creates a validated privilege intent.
    pub fn new(
        table: impl Into<String>,
        identity_group: impl Into<String>,
        privilege: Privilege,
        reason: impl Into<String>,
    ) -> AppResult<Self> {
        let table = table.into();
        let identity_group = identity_group.into();
        if table.trim().is_empty() {
            return Err(AppError::Validation(
                "privilege intent requires a table name".to_owned(),
            ));
        }
        if identity_group.trim().is_empty() {
            return Err(AppError::Validation(
                "privilege intent requires an identity group".to_owned(),
            ));
        }

        Ok(Self {
            table,
            identity_group,
            privilege,
            reason: reason.into(),
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the identity group.
    #[must_use]
    pub fn identity_group(&self) -> &str {
        self.identity_group.as_str()
    }

    /// Returns the privilege.
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Returns the reason this intent exists.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.as_str()
    }

    /// Returns the identity projection of this intent.
    #[must_use]
    pub fn key(&self) -> PrivilegeKey {
        PrivilegeKey::new(self.table.clone(), self.identity_group.clone(), self.privilege)
    }
}

/// A privilege currently held on the platform, as observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActualPrivilege {
    table: String,
    identity_group: String,
    privilege: Privilege,
}

impl ActualPrivilege {
    /// Creates a validated observed privilege.
    pub fn new(
        table: impl Into<String>,
        identity_group: impl Into<String>,
        privilege: Privilege,
    ) -> AppResult<Self> {
        let table = table.into();
        let identity_group = identity_group.into();
        if table.trim().is_empty() {
            return Err(AppError::Validation(
                "observed privilege requires a table name".to_owned(),
            ));
        }
        if identity_group.trim().is_empty() {
            return Err(AppError::Validation(
                "observed privilege requires an identity group".to_owned(),
            ));
        }

        Ok(Self {
            table,
            identity_group,
            privilege,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the identity group.
    #[must_use]
    pub fn identity_group(&self) -> &str {
        self.identity_group.as_str()
    }

    /// Returns the privilege.
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Returns the identity projection of this observation.
    #[must_use]
    pub fn key(&self) -> PrivilegeKey {
        PrivilegeKey::new(self.table.clone(), self.identity_group.clone(), self.privilege)
    }
}

/// Direction of a single privilege change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivilegeAction {
    /// Assert a privilege the intent declares but the platform lacks.
    Grant,
    /// Remove a privilege the platform holds without declared intent.
    Revoke,
}

impl PrivilegeAction {
    /// Returns the SQL verb for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
        }
    }
}

/// One required privilege change converging actual state toward intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivilegeDelta {
    action: PrivilegeAction,
    table: String,
    identity_group: String,
    privilege: Privilege,
    reason: String,
}

impl PrivilegeDelta {
    /// Creates a grant delta.
    pub fn grant(
        table: impl Into<String>,
        identity_group: impl Into<String>,
        privilege: Privilege,
        reason: impl Into<String>,
    ) -> AppResult<Self> {
        Self::new(PrivilegeAction::Grant, table, identity_group, privilege, reason)
    }

    /// Creates a revoke delta.
    pub fn revoke(
        table: impl Into<String>,
        identity_group: impl Into<String>,
        privilege: Privilege,
        reason: impl Into<String>,
    ) -> AppResult<Self> {
        Self::new(PrivilegeAction::Revoke, table, identity_group, privilege, reason)
    }

    fn new(
        action: PrivilegeAction,
        table: impl Into<String>,
        identity_group: impl Into<String>,
        privilege: Privilege,
        reason: impl Into<String>,
    ) -> AppResult<Self> {
        let table = table.into();
        let identity_group = identity_group.into();
        if table.trim().is_empty() || identity_group.trim().is_empty() {
            return Err(AppError::Validation(
                "privilege delta requires a table name and an identity group".to_owned(),
            ));
        }

        Ok(Self {
            action,
            table,
            identity_group,
            privilege,
            reason: reason.into(),
        })
    }

    /// Returns the change direction.
    #[must_use]
    pub fn action(&self) -> PrivilegeAction {
        self.action
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the identity group.
    #[must_use]
    pub fn identity_group(&self) -> &str {
        self.identity_group.as_str()
    }

    /// Returns the privilege.
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Returns the reason attached to this change.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.as_str()
    }

    /// Renders a short human-readable description of this change.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.action {
            PrivilegeAction::Grant => format!(
                "GRANT {} on '{}' to '{}'",
                self.privilege.as_str(),
                self.table,
                self.identity_group
            ),
            PrivilegeAction::Revoke => format!(
                "REVOKE {} on '{}' from '{}'",
                self.privilege.as_str(),
                self.table,
                self.identity_group
            ),
        }
    }
}
