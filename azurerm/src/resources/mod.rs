//! Resource implementations

pub mod apimanagement;
pub(crate) mod common;
pub mod servicebus;
pub(crate) mod timeouts;

pub use apimanagement::{
    ApiManagementApiResource, ApiManagementApiVersionSetResource, ApiManagementBackendResource,
    ApiManagementNamedValueResource, ApiManagementProductResource, ApiManagementResource,
};
pub use servicebus::{
    ServiceBusNamespaceAuthorizationRuleResource,
    ServiceBusNamespaceDisasterRecoveryConfigResource, ServiceBusNamespaceNetworkRuleSetResource,
    ServiceBusNamespaceResource, ServiceBusQueueAuthorizationRuleResource, ServiceBusQueueResource,
    ServiceBusSubscriptionResource, ServiceBusSubscriptionRuleResource,
    ServiceBusTopicAuthorizationRuleResource, ServiceBusTopicResource,
};

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::api::test_helpers::create_test_client;
    use crate::provider_data::{AzureRmProviderData, Features};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tfplug::types::{Dynamic, DynamicValue};

    pub fn create_test_provider_data(server_url: &str) -> AzureRmProviderData {
        AzureRmProviderData::new(create_test_client(server_url), Features::default())
    }

    pub fn provider_data_any(server_url: &str) -> Option<tfplug::ProviderData> {
        Some(Arc::new(create_test_provider_data(server_url)))
    }

    /// Builds an object value from attribute pairs
    pub fn object(fields: &[(&str, Dynamic)]) -> DynamicValue {
        let map: HashMap<String, Dynamic> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        DynamicValue::new(Dynamic::Map(map))
    }

    pub fn block(fields: &[(&str, Dynamic)]) -> Dynamic {
        Dynamic::List(vec![Dynamic::Map(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )])
    }
}
