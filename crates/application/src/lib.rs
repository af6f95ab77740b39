//! Application services and ports.

#![forbid(unsafe_code)]

mod intent_resolver;
mod platform_ports;
mod reconciliation_service;
mod registry_ports;
mod state_inspector;

pub use intent_resolver::IntentResolver;
pub use platform_ports::{
    ApplyColumnMaskRequest, CatalogPlatform, ColumnMaskRow, GrantRow, NullResultSink, ResultSink,
};
pub use reconciliation_service::{
    AccessAuditReport, DEFAULT_MAX_CONCURRENCY, PrivacyPreview, ReconciliationService,
    TableSecurityOutcome,
};
pub use registry_ports::RegistryStore;
pub use state_inspector::StateInspector;
