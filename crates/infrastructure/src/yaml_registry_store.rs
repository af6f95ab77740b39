use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tabula_application::RegistryStore;
use tabula_core::{AppError, AppResult, EnvironmentName};
use tabula_domain::{
    ColumnPrivacyMetadata, DomainRoleSet, GlobalRole, GlobalRoleCatalog, RoleDefinition,
    RoleMappingSet,
};
use tracing::debug;

/// Registry store reading declarative YAML documents from a directory tree.
///
/// Layout under the registry root:
/// - `access/global_roles.yaml`
/// - `access/domains/<domain>/domain.roles.yaml`
/// - `access/domains/<domain>/domain.mappings.<environment>.yaml`
/// - `contracts/<domain>/<table>.yaml`
///
/// A missing document is reported as `Ok(None)`; a document that exists but
/// fails to read or parse is a configuration error.
pub struct YamlRegistryStore {
    root: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalRoleDocument {
    #[serde(default)]
    roles: BTreeMap<String, GlobalRole>,
}

#[derive(Debug, Default, Deserialize)]
struct DomainRoleDocument {
    #[serde(default)]
    roles: BTreeMap<String, RoleDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct RoleMappingDocument {
    #[serde(default)]
    mappings: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct DataContractDocument {
    #[serde(default)]
    columns: Vec<ColumnPrivacyMetadata>,
}

impl YamlRegistryStore {
    /// Creates a store rooted at the given registry directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn domain_dir(&self, domain: &str) -> PathBuf {
        self.root.join("access").join("domains").join(domain)
    }

    async fn read_document<T>(&self, path: &Path) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "registry document absent");
                return Ok(None);
            }
            Err(error) => {
                return Err(AppError::Configuration(format!(
                    "failed to read registry document '{}': {error}",
                    path.display()
                )));
            }
        };

        let document = serde_yaml::from_str(&contents).map_err(|error| {
            AppError::Configuration(format!(
                "failed to parse registry document '{}': {error}",
                path.display()
            ))
        })?;

        Ok(Some(document))
    }
}

fn validate_segment(kind: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(AppError::Validation(format!(
            "{kind} '{value}' is not a valid registry path segment"
        )));
    }

    Ok(())
}

#[async_trait]
impl RegistryStore for YamlRegistryStore {
    async fn load_global_roles(&self) -> AppResult<Option<GlobalRoleCatalog>> {
        let path = self.root.join("access").join("global_roles.yaml");
        let document: Option<GlobalRoleDocument> = self.read_document(&path).await?;
        Ok(document.map(|document| GlobalRoleCatalog::new(document.roles)))
    }

    async fn load_domain_roles(&self, domain: &str) -> AppResult<Option<DomainRoleSet>> {
        validate_segment("domain", domain)?;
        let path = self.domain_dir(domain).join("domain.roles.yaml");
        let document: Option<DomainRoleDocument> = self.read_document(&path).await?;
        Ok(document.map(|document| DomainRoleSet::new(document.roles)))
    }

    async fn load_role_mappings(
        &self,
        domain: &str,
        environment: &EnvironmentName,
    ) -> AppResult<Option<RoleMappingSet>> {
        validate_segment("domain", domain)?;
        let path = self
            .domain_dir(domain)
            .join(format!("domain.mappings.{}.yaml", environment.as_str()));
        let document: Option<RoleMappingDocument> = self.read_document(&path).await?;
        Ok(document.map(|document| RoleMappingSet::new(document.mappings)))
    }

    async fn load_column_metadata(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<Option<Vec<ColumnPrivacyMetadata>>> {
        validate_segment("domain", domain)?;
        validate_segment("table", table)?;
        let path = self
            .root
            .join("contracts")
            .join(domain)
            .join(format!("{table}.yaml"));
        let document: Option<DataContractDocument> = self.read_document(&path).await?;
        Ok(document.map(|document| document.columns))
    }
}
