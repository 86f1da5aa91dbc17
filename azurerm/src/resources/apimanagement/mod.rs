//! API Management resources

pub mod resource_api;
pub mod resource_api_management;
pub mod resource_api_version_set;
pub mod resource_backend;
pub mod resource_named_value;
pub mod resource_product;

mod service;
mod service_config;

pub use resource_api::ApiManagementApiResource;
pub use resource_api_management::ApiManagementResource;
pub use resource_api_version_set::ApiManagementApiVersionSetResource;
pub use resource_backend::ApiManagementBackendResource;
pub use resource_named_value::ApiManagementNamedValueResource;
pub use resource_product::ApiManagementProductResource;
