use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use tabula_domain::{ActualPrivilege, ObservedMask, Privilege};

use crate::platform_ports::CatalogPlatform;


/// Reads the platform's current authorization facts for one table.
///
/// Failed reads degrade to empty observations: a table that does not exist
/// yet has no actual state, and a transient read failure must never block a
/// grant-only convergence. Principals that are not groups and privileges
/// outside the managed set are filtered out before the diff.
pub struct StateInspector {
    platform: Arc<dyn CatalogPlatform>,
}

impl StateInspector {
    /// Creates an inspector over a catalog platform.
    #[must_use]
    pub fn new(platform: Arc<dyn CatalogPlatform>) -> Self {
        Self { platform }
    }

    /// Returns the managed privileges currently held on one table.
    pub async fn observed_privileges(&self, domain: &str, table: &str) -> Vec<ActualPrivilege> {
        let rows = match self.platform.granted_privileges(domain, table).await {
            Ok(rows) => rows,
            Err(error) => {
                warn!(
                    domain,
                    table,
                    error = %error,
                    "failed to read granted privileges, treating as empty"
                );
                return Vec::new();
            }
        };

        let mut observed = Vec::new();
        for row in rows {
            if !row.principal_kind.eq_ignore_ascii_case("GROUP") {
                continue;
            }

            let Ok(privilege) = Privilege::from_str(&row.privilege) else {
                continue;
            };

            match ActualPrivilege::new(table, row.principal, privilege) {
                Ok(fact) => observed.push(fact),
                Err(error) => {
                    warn!(domain, table, error = %error, "skipping malformed privilege row");
                }
            }
        }

        observed
    }

    /// Returns the masks currently bound to columns of one table.
    pub async fn observed_masks(&self, domain: &str, table: &str) -> Vec<ObservedMask> {
        let rows = match self.platform.column_masks(domain, table).await {
            Ok(rows) => rows,
            Err(error) => {
                warn!(
                    domain,
                    table,
                    error = %error,
                    "failed to read column masks, treating as empty"
                );
                return Vec::new();
            }
        };

        let mut observed = Vec::new();
        for row in rows {
            let Some(expression) = row.expression else {
                continue;
            };

            match ObservedMask::new(table, row.column_name, expression) {
                Ok(mask) => observed.push(mask),
                Err(error) => {
                    warn!(domain, table, error = %error, "skipping malformed mask row");
                }
            }
        }

        observed
    }
}
