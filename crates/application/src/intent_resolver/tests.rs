use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tabula_core::{AppError, AppResult, EnvironmentName};
use tabula_domain::{
    ColumnPrivacyMetadata, DomainRoleSet, GlobalRole, GlobalRoleCatalog, MaskingStrategy,
    PrivacyClassification, Privilege, RoleDefinition, RoleMappingSet, RoleScope,
};

use crate::registry_ports::RegistryStore;

use super::IntentResolver;

#[derive(Default)]
struct FakeRegistryStore {
    global_roles: Option<GlobalRoleCatalog>,
    domain_roles: HashMap<String, DomainRoleSet>,
    role_mappings: HashMap<String, RoleMappingSet>,
    column_metadata: HashMap<(String, String), Vec<ColumnPrivacyMetadata>>,
    global_loads: AtomicUsize,
    fail_domain_roles: bool,
}

#[async_trait]
impl RegistryStore for FakeRegistryStore {
    async fn load_global_roles(&self) -> AppResult<Option<GlobalRoleCatalog>> {
        self.global_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.global_roles.clone())
    }

    async fn load_domain_roles(&self, domain: &str) -> AppResult<Option<DomainRoleSet>> {
        if self.fail_domain_roles {
            return Err(AppError::Configuration(
                "failed to parse role definitions".to_owned(),
            ));
        }

        Ok(self.domain_roles.get(domain).cloned())
    }

    async fn load_role_mappings(
        &self,
        domain: &str,
        _environment: &EnvironmentName,
    ) -> AppResult<Option<RoleMappingSet>> {
        Ok(self.role_mappings.get(domain).cloned())
    }

    async fn load_column_metadata(
        &self,
        domain: &str,
        table: &str,
    ) -> AppResult<Option<Vec<ColumnPrivacyMetadata>>> {
        Ok(self
            .column_metadata
            .get(&(domain.to_owned(), table.to_owned()))
            .cloned())
    }
}

fn environment() -> EnvironmentName {
    EnvironmentName::new("dev").unwrap_or_else(|_| unreachable!())
}

fn sales_registry() -> FakeRegistryStore {
    let mut global_roles = BTreeMap::new();
    global_roles.insert(
        "data_reader".to_owned(),
        GlobalRole::new(vec![Privilege::Select]),
    );
    global_roles.insert(
        "data_writer".to_owned(),
        GlobalRole::new(vec![Privilege::Select, Privilege::Modify]),
    );

    let mut roles = BTreeMap::new();
    if let Ok(role) = RoleDefinition::new(
        "data_reader",
        Some(RoleScope::include(vec!["orders".to_owned()])),
    ) {
        roles.insert("reader".to_owned(), role);
    }
    if let Ok(role) = RoleDefinition::new(
        "data_writer",
        Some(RoleScope::include(vec!["*".to_owned()])),
    ) {
        roles.insert("writer".to_owned(), role);
    }

    let mut mappings = BTreeMap::new();
    mappings.insert(
        "reader".to_owned(),
        vec!["grp-analysts".to_owned(), "grp-reporting".to_owned()],
    );
    mappings.insert("writer".to_owned(), vec!["grp-engineers".to_owned()]);

    let mut store = FakeRegistryStore {
        global_roles: Some(GlobalRoleCatalog::new(global_roles)),
        ..FakeRegistryStore::default()
    };
    store
        .domain_roles
        .insert("sales".to_owned(), DomainRoleSet::new(roles));
    store
        .role_mappings
        .insert("sales".to_owned(), RoleMappingSet::new(mappings));
    store
}

fn resolver(store: FakeRegistryStore) -> IntentResolver {
    IntentResolver::new(Arc::new(store), environment())
}

#[tokio::test]
async fn roles_expand_into_group_privilege_pairs() {
    let resolver = resolver(sales_registry());

    let intents = resolver.resolve_privileges("sales", "orders").await;
    assert!(intents.is_ok());
    let intents = intents.unwrap_or_default();

    let mut facts: Vec<(String, Privilege)> = intents
        .iter()
        .map(|intent| (intent.identity_group().to_owned(), intent.privilege()))
        .collect();
    facts.sort();

    assert_eq!(
        facts,
        vec![
            ("grp-analysts".to_owned(), Privilege::Select),
            ("grp-engineers".to_owned(), Privilege::Select),
            ("grp-engineers".to_owned(), Privilege::Modify),
            ("grp-reporting".to_owned(), Privilege::Select),
        ]
    );
}

#[tokio::test]
async fn intent_reasons_name_the_role_and_its_inheritance() {
    let resolver = resolver(sales_registry());

    let intents = resolver
        .resolve_privileges("sales", "orders")
        .await
        .unwrap_or_default();

    assert!(
        intents
            .iter()
            .filter(|intent| intent.identity_group() == "grp-analysts")
            .all(|intent| intent.reason() == "role 'reader' inherits 'data_reader'")
    );
}

#[tokio::test]
async fn out_of_scope_roles_contribute_nothing() {
    let resolver = resolver(sales_registry());

    let intents = resolver
        .resolve_privileges("sales", "customers")
        .await
        .unwrap_or_default();

    // Only the wildcard-scoped writer role covers tables beyond orders.
    assert!(
        intents
            .iter()
            .all(|intent| intent.identity_group() == "grp-engineers")
    );
    assert_eq!(intents.len(), 2);
}

#[tokio::test]
async fn unmapped_and_unresolvable_roles_are_skipped() {
    let mut roles = BTreeMap::new();
    if let Ok(role) = RoleDefinition::new(
        "data_reader",
        Some(RoleScope::include(vec!["orders".to_owned()])),
    ) {
        roles.insert("unmapped".to_owned(), role);
    }
    if let Ok(role) = RoleDefinition::new(
        "no_such_global_role",
        Some(RoleScope::include(vec!["orders".to_owned()])),
    ) {
        roles.insert("dangling".to_owned(), role);
    }

    let mut global_roles = BTreeMap::new();
    global_roles.insert(
        "data_reader".to_owned(),
        GlobalRole::new(vec![Privilege::Select]),
    );

    let mut mappings = BTreeMap::new();
    mappings.insert("dangling".to_owned(), vec!["grp-anyone".to_owned()]);

    let mut store = FakeRegistryStore {
        global_roles: Some(GlobalRoleCatalog::new(global_roles)),
        ..FakeRegistryStore::default()
    };
    store
        .domain_roles
        .insert("sales".to_owned(), DomainRoleSet::new(roles));
    store
        .role_mappings
        .insert("sales".to_owned(), RoleMappingSet::new(mappings));

    let resolver = resolver(store);
    let intents = resolver
        .resolve_privileges("sales", "orders")
        .await
        .unwrap_or_default();

    assert!(intents.is_empty());
}

#[tokio::test]
async fn unmanaged_domains_resolve_to_empty_intent() {
    let resolver = resolver(FakeRegistryStore::default());

    let intents = resolver.resolve_privileges("finance", "ledger").await;
    assert!(intents.is_ok_and(|intents| intents.is_empty()));
}

#[tokio::test]
async fn malformed_registry_documents_propagate() {
    let store = FakeRegistryStore {
        fail_domain_roles: true,
        ..FakeRegistryStore::default()
    };

    let resolver = resolver(store);
    let intents = resolver.resolve_privileges("sales", "orders").await;
    assert!(matches!(intents, Err(AppError::Configuration(_))));
}

#[tokio::test]
async fn registry_documents_are_cached_until_cleared() {
    let store = sales_registry();
    let registry = Arc::new(store);
    let resolver = IntentResolver::new(registry.clone(), environment());

    let first = resolver.resolve_privileges("sales", "orders").await;
    let second = resolver.resolve_privileges("sales", "customers").await;
    assert!(first.is_ok() && second.is_ok());
    assert_eq!(registry.global_loads.load(Ordering::SeqCst), 1);

    resolver.clear_cache().await;
    let third = resolver.resolve_privileges("sales", "orders").await;
    assert!(third.is_ok());
    assert_eq!(registry.global_loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn masking_intents_derive_exempt_groups_from_privilege_intent() {
    let mut store = sales_registry();
    let columns = vec![
        ColumnPrivacyMetadata::new("email", "string", PrivacyClassification::Pii, None, false),
        ColumnPrivacyMetadata::new("order_id", "bigint", PrivacyClassification::None, None, true),
    ];
    store.column_metadata.insert(
        ("sales".to_owned(), "orders".to_owned()),
        columns.into_iter().flatten().collect(),
    );

    let resolver = resolver(store);
    let intents = resolver
        .resolve_masking("sales", "orders")
        .await
        .unwrap_or_default();

    assert_eq!(intents.len(), 1);
    let Some(intent) = intents.first() else {
        return;
    };
    assert_eq!(intent.column_name(), "email");
    assert_eq!(intent.strategy(), MaskingStrategy::Hash);
    assert_eq!(intent.reason(), "pii data requires hash masking");

    let exempt: Vec<&str> = intent
        .exempt_groups()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(
        exempt,
        vec!["grp-analysts", "grp-engineers", "grp-reporting"]
    );
}

#[tokio::test]
async fn tables_without_a_contract_yield_no_masking_intent() {
    let resolver = resolver(sales_registry());

    let intents = resolver.resolve_masking("sales", "orders").await;
    assert!(intents.is_ok_and(|intents| intents.is_empty()));
}
