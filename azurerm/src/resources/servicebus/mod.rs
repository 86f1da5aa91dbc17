//! Service Bus resources

pub mod resource_disaster_recovery_config;
pub mod resource_namespace;
pub mod resource_namespace_authorization_rule;
pub mod resource_network_rule_set;
pub mod resource_queue;
pub mod resource_queue_authorization_rule;
pub mod resource_subscription;
pub mod resource_subscription_rule;
pub mod resource_topic;
pub mod resource_topic_authorization_rule;

mod authorization_rule;
mod entity;

pub use resource_disaster_recovery_config::ServiceBusNamespaceDisasterRecoveryConfigResource;
pub use resource_namespace::ServiceBusNamespaceResource;
pub use resource_namespace_authorization_rule::ServiceBusNamespaceAuthorizationRuleResource;
pub use resource_network_rule_set::ServiceBusNamespaceNetworkRuleSetResource;
pub use resource_queue::ServiceBusQueueResource;
pub use resource_queue_authorization_rule::ServiceBusQueueAuthorizationRuleResource;
pub use resource_subscription::ServiceBusSubscriptionResource;
pub use resource_subscription_rule::ServiceBusSubscriptionRuleResource;
pub use resource_topic::ServiceBusTopicResource;
pub use resource_topic_authorization_rule::ServiceBusTopicAuthorizationRuleResource;
