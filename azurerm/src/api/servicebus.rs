//! Service Bus management API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::context::Context;

use super::{ApiError, Client, SERVICEBUS_API_VERSION};
use crate::parse::{
    NamespaceDisasterRecoveryConfigId, NamespaceId, NamespaceNetworkRuleSetId, QueueId,
    ResourceId, SubscriptionId, SubscriptionRuleId, TopicId,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub properties: NamespaceProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_tls_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_local_auth: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_redundant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_messaging_partitions: Option<i64>,
    #[serde(skip_serializing)]
    pub service_bus_endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub provisioning_state: Option<String>,
}

/// Keys returned by the listKeys action of an authorization rule
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessKeys {
    pub primary_connection_string: Option<String>,
    pub secondary_connection_string: Option<String>,
    pub alias_primary_connection_string: Option<String>,
    pub alias_secondary_connection_string: Option<String>,
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
    pub key_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationRule {
    #[serde(default)]
    pub properties: AuthorizationRuleProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationRuleProperties {
    #[serde(default)]
    pub rights: Vec<String>,
}

impl AuthorizationRule {
    pub fn with_rights(listen: bool, send: bool, manage: bool) -> Self {
        let mut rights = Vec::new();
        if listen {
            rights.push("Listen".to_string());
        }
        if send {
            rights.push("Send".to_string());
        }
        if manage {
            rights.push("Manage".to_string());
        }
        Self {
            properties: AuthorizationRuleProperties { rights },
        }
    }

    pub fn has_right(&self, right: &str) -> bool {
        self.properties
            .rights
            .iter()
            .any(|r| r.eq_ignore_ascii_case(right))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Queue {
    #[serde(default)]
    pub properties: QueueProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_in_megabytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_size_in_kilobytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_duplicate_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_session: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_message_time_to_live: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_lettering_on_message_expiration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_detection_history_time_window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delivery_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_batched_operations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete_on_idle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_partitioning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_express: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_dead_lettered_messages_to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub properties: TopicProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_message_time_to_live: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_in_megabytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_size_in_kilobytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_duplicate_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_detection_history_time_window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_batched_operations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_ordering: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete_on_idle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_partitioning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_express: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub properties: SubscriptionProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_session: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_message_time_to_live: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_lettering_on_filter_evaluation_exceptions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_lettering_on_message_expiration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delivery_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_batched_operations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete_on_idle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_dead_lettered_messages_to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub properties: RuleProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_filter: Option<SqlExpression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_filter: Option<CorrelationFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SqlExpression>,
}

/// Body of both `sqlFilter` and `action`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlExpression {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkRuleSet {
    #[serde(default)]
    pub properties: NetworkRuleSetProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRuleSetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_service_access_enabled: Option<bool>,
    #[serde(default)]
    pub ip_rules: Vec<IpRule>,
    #[serde(default)]
    pub virtual_network_rules: Vec<VirtualNetworkRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRule {
    pub ip_mask: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkRule {
    #[serde(default)]
    pub subnet: SubResource,
    #[serde(default)]
    pub ignore_missing_vnet_service_endpoint: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubResource {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisasterRecoveryConfig {
    #[serde(default)]
    pub properties: DisasterRecoveryConfigProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterRecoveryConfigProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_name: Option<String>,
    #[serde(skip_serializing)]
    pub provisioning_state: Option<String>,
    #[serde(skip_serializing)]
    pub role: Option<String>,
}

/// Service Bus operations on an ARM client
pub struct ServiceBusApi<'a> {
    client: &'a Client,
}

impl<'a> ServiceBusApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_namespace(&self, id: &NamespaceId) -> Result<Namespace, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_namespace(
        &self,
        ctx: &Context,
        id: &NamespaceId,
        namespace: &Namespace,
    ) -> Result<Namespace, ApiError> {
        tracing::info!("Writing Service Bus namespace {}", id);
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, namespace)
            .await
    }

    pub async fn delete_namespace(&self, ctx: &Context, id: &NamespaceId) -> Result<(), ApiError> {
        tracing::info!("Deleting Service Bus namespace {}", id);
        self.client
            .delete(ctx, &id.id(), SERVICEBUS_API_VERSION)
            .await
    }

    /// Authorization rules live under namespaces, queues and topics alike
    pub async fn get_authorization_rule(
        &self,
        id: &impl ResourceId,
    ) -> Result<AuthorizationRule, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_authorization_rule(
        &self,
        ctx: &Context,
        id: &impl ResourceId,
        rule: &AuthorizationRule,
    ) -> Result<AuthorizationRule, ApiError> {
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, rule)
            .await
    }

    pub async fn delete_authorization_rule(
        &self,
        ctx: &Context,
        id: &impl ResourceId,
    ) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &id.id(), SERVICEBUS_API_VERSION)
            .await
    }

    pub async fn list_keys(&self, id: &impl ResourceId) -> Result<AccessKeys, ApiError> {
        self.client
            .post(&format!("{}/listKeys", id.id()), SERVICEBUS_API_VERSION)
            .await
    }

    pub async fn get_queue(&self, id: &QueueId) -> Result<Queue, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_queue(
        &self,
        ctx: &Context,
        id: &QueueId,
        queue: &Queue,
    ) -> Result<Queue, ApiError> {
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, queue)
            .await
    }

    pub async fn delete_queue(&self, ctx: &Context, id: &QueueId) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &id.id(), SERVICEBUS_API_VERSION)
            .await
    }

    pub async fn get_topic(&self, id: &TopicId) -> Result<Topic, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_topic(
        &self,
        ctx: &Context,
        id: &TopicId,
        topic: &Topic,
    ) -> Result<Topic, ApiError> {
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, topic)
            .await
    }

    pub async fn delete_topic(&self, ctx: &Context, id: &TopicId) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &id.id(), SERVICEBUS_API_VERSION)
            .await
    }

    pub async fn get_subscription(&self, id: &SubscriptionId) -> Result<Subscription, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_subscription(
        &self,
        ctx: &Context,
        id: &SubscriptionId,
        subscription: &Subscription,
    ) -> Result<Subscription, ApiError> {
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, subscription)
            .await
    }

    pub async fn delete_subscription(
        &self,
        ctx: &Context,
        id: &SubscriptionId,
    ) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &id.id(), SERVICEBUS_API_VERSION)
            .await
    }

    pub async fn get_rule(&self, id: &SubscriptionRuleId) -> Result<Rule, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_rule(
        &self,
        ctx: &Context,
        id: &SubscriptionRuleId,
        rule: &Rule,
    ) -> Result<Rule, ApiError> {
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, rule)
            .await
    }

    pub async fn delete_rule(&self, ctx: &Context, id: &SubscriptionRuleId) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &id.id(), SERVICEBUS_API_VERSION)
            .await
    }

    pub async fn get_network_rule_set(
        &self,
        id: &NamespaceNetworkRuleSetId,
    ) -> Result<NetworkRuleSet, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_network_rule_set(
        &self,
        ctx: &Context,
        id: &NamespaceNetworkRuleSetId,
        rule_set: &NetworkRuleSet,
    ) -> Result<NetworkRuleSet, ApiError> {
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, rule_set)
            .await
    }

    pub async fn get_disaster_recovery_config(
        &self,
        id: &NamespaceDisasterRecoveryConfigId,
    ) -> Result<DisasterRecoveryConfig, ApiError> {
        self.client.get(&id.id(), SERVICEBUS_API_VERSION).await
    }

    pub async fn create_or_update_disaster_recovery_config(
        &self,
        ctx: &Context,
        id: &NamespaceDisasterRecoveryConfigId,
        config: &DisasterRecoveryConfig,
    ) -> Result<DisasterRecoveryConfig, ApiError> {
        self.client
            .put(ctx, &id.id(), SERVICEBUS_API_VERSION, config)
            .await
    }

    pub async fn delete_disaster_recovery_config(
        &self,
        ctx: &Context,
        id: &NamespaceDisasterRecoveryConfigId,
    ) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &id.id(), SERVICEBUS_API_VERSION)
            .await
    }

    pub async fn break_pairing(
        &self,
        ctx: &Context,
        id: &NamespaceDisasterRecoveryConfigId,
    ) -> Result<(), ApiError> {
        tracing::info!("Breaking pairing of {}", id);
        self.client
            .post_and_wait(ctx, &format!("{}/breakPairing", id.id()), SERVICEBUS_API_VERSION)
            .await
    }

    /// Keys of a namespace rule as seen through the alias
    pub async fn disaster_recovery_list_keys(
        &self,
        id: &NamespaceDisasterRecoveryConfigId,
        rule_name: &str,
    ) -> Result<AccessKeys, ApiError> {
        self.client
            .post(
                &format!("{}/authorizationRules/{}/listKeys", id.id(), rule_name),
                SERVICEBUS_API_VERSION,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, mock_token};
    use crate::parse::QueueAuthorizationRuleId;
    use mockito::{Matcher, Server};

    const NS_PATH: &str =
        "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns1";

    fn namespace_id() -> NamespaceId {
        NamespaceId::new("00000000-0000-0000-0000-000000000000", "rg", "ns1")
    }

    #[tokio::test]
    async fn get_namespace_decodes_sku_and_properties() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let mock = server
            .mock("GET", NS_PATH)
            .match_query(Matcher::UrlEncoded(
                "api-version".into(),
                SERVICEBUS_API_VERSION.into(),
            ))
            .match_header("authorization", "Bearer test-token")
            .with_body(
                r#"{"location":"westeurope","sku":{"name":"Premium","tier":"Premium","capacity":2},
                   "properties":{"minimumTlsVersion":"1.2","publicNetworkAccess":"Enabled","disableLocalAuth":false,
                   "zoneRedundant":true,"premiumMessagingPartitions":1,
                   "serviceBusEndpoint":"https://ns1.servicebus.windows.net:443/"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let namespace = client.servicebus().get_namespace(&namespace_id()).await.unwrap();

        let sku = namespace.sku.unwrap();
        assert_eq!(sku.name, "Premium");
        assert_eq!(sku.capacity, Some(2));
        assert_eq!(namespace.properties.minimum_tls_version.as_deref(), Some("1.2"));
        assert_eq!(namespace.properties.zone_redundant, Some(true));
        assert_eq!(
            namespace.properties.service_bus_endpoint.as_deref(),
            Some("https://ns1.servicebus.windows.net:443/")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_keys_posts_to_rule() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = format!("{}/queues/q1/authorizationRules/rule1/listKeys", NS_PATH);
        let mock = server
            .mock("POST", path.as_str())
            .match_query(Matcher::Any)
            .with_body(
                r#"{"primaryConnectionString":"Endpoint=sb://p","secondaryConnectionString":"Endpoint=sb://s",
                   "primaryKey":"pk","secondaryKey":"sk","keyName":"rule1"}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let id = QueueAuthorizationRuleId::new(
            "00000000-0000-0000-0000-000000000000",
            "rg",
            "ns1",
            "q1",
            "rule1",
        );
        let keys = client.servicebus().list_keys(&id).await.unwrap();

        assert_eq!(keys.primary_key.as_deref(), Some("pk"));
        assert_eq!(keys.key_name.as_deref(), Some("rule1"));
        assert!(keys.alias_primary_connection_string.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn queue_put_sends_only_set_properties() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = format!("{}/queues/q1", NS_PATH);
        let mock = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(serde_json::json!({
                "properties": {"lockDuration": "PT1M", "maxDeliveryCount": 10}
            })))
            .with_body(r#"{"properties":{"lockDuration":"PT1M","maxDeliveryCount":10,"status":"Active"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let queue = Queue {
            properties: QueueProperties {
                lock_duration: Some("PT1M".to_string()),
                max_delivery_count: Some(10),
                ..Default::default()
            },
        };
        let id = QueueId::new("00000000-0000-0000-0000-000000000000", "rg", "ns1", "q1");
        let result = client
            .servicebus()
            .create_or_update_queue(&Context::new(), &id, &queue)
            .await
            .unwrap();

        assert_eq!(result.properties.status.as_deref(), Some("Active"));
        mock.assert_async().await;
    }

    #[test]
    fn authorization_rule_rights_round_trip() {
        let rule = AuthorizationRule::with_rights(true, true, false);
        assert_eq!(rule.properties.rights, vec!["Listen", "Send"]);
        assert!(rule.has_right("listen"));
        assert!(!rule.has_right("Manage"));
    }

    #[test]
    fn network_rule_set_serializes_camel_case() {
        let rule_set = NetworkRuleSet {
            properties: NetworkRuleSetProperties {
                default_action: Some("Deny".to_string()),
                trusted_service_access_enabled: Some(true),
                ip_rules: vec![IpRule {
                    ip_mask: "10.0.0.0/24".to_string(),
                    action: Some("Allow".to_string()),
                }],
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&rule_set).unwrap();
        assert_eq!(json["properties"]["defaultAction"], "Deny");
        assert_eq!(json["properties"]["trustedServiceAccessEnabled"], true);
        assert_eq!(json["properties"]["ipRules"][0]["ipMask"], "10.0.0.0/24");
    }
}
