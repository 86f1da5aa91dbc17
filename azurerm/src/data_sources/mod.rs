//! Data source implementations

pub mod data_source_api_management;
pub mod data_source_servicebus_namespace;
pub mod data_source_servicebus_namespace_authorization_rule;

pub use data_source_api_management::ApiManagementDataSource;
pub use data_source_servicebus_namespace::ServiceBusNamespaceDataSource;
pub use data_source_servicebus_namespace_authorization_rule::ServiceBusNamespaceAuthorizationRuleDataSource;
