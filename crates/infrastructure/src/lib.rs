//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_catalog_gateway;
mod in_memory_catalog_platform;
mod in_memory_registry_store;
mod tracing_result_sink;
mod yaml_registry_store;

pub use http_catalog_gateway::{HttpCatalogGateway, HttpCatalogGatewayConfig};
pub use in_memory_catalog_platform::InMemoryCatalogPlatform;
pub use in_memory_registry_store::InMemoryRegistryStore;
pub use tracing_result_sink::TracingResultSink;
pub use yaml_registry_store::YamlRegistryStore;
