//! Service Bus topic authorization rule resource

use super::authorization_rule::{AuthorizationRuleResource, RuleScope};
use crate::migration::{topic_authorization_rule_v0_to_v1, Upgrader};
use crate::parse::{ParseError, TopicAuthorizationRuleId, TopicId};

pub struct TopicRuleScope;

impl RuleScope for TopicRuleScope {
    const TYPE_NAME: &'static str = "azurerm_servicebus_topic_authorization_rule";
    const PARENT_ATTRIBUTE: &'static str = "topic_id";
    const PARENT_KIND: &'static str = "topic";
    const UPGRADERS: &'static [Upgrader] = &[topic_authorization_rule_v0_to_v1];

    type Id = TopicAuthorizationRuleId;
    type ParentId = TopicId;

    fn parse(input: &str) -> Result<Self::Id, ParseError> {
        TopicAuthorizationRuleId::parse(input)
    }

    fn parse_parent(input: &str) -> Result<Self::ParentId, ParseError> {
        TopicId::parse(input)
    }

    fn rule_id(parent: &TopicId, name: &str) -> TopicAuthorizationRuleId {
        TopicAuthorizationRuleId::new(
            &parent.subscription_id,
            &parent.resource_group,
            &parent.namespace_name,
            &parent.name,
            name,
        )
    }

    fn parent_of(id: &TopicAuthorizationRuleId) -> TopicId {
        id.topic_id()
    }

    fn name_of(id: &TopicAuthorizationRuleId) -> &str {
        &id.name
    }
}

pub type ServiceBusTopicAuthorizationRuleResource = AuthorizationRuleResource<TopicRuleScope>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::state_with;
    use tfplug::context::Context;
    use tfplug::resource::{Resource, UpgradeResourceStateRequest};
    use tfplug::types::{AttributePath, RawState};

    const TOPIC_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns1/topics/t1";

    #[test]
    fn test_rule_id_from_topic() {
        let topic = TopicId::parse(TOPIC_ID).unwrap();
        let id = TopicRuleScope::rule_id(&topic, "rule1");
        assert_eq!(id.topic_name, "t1");
        assert_eq!(TopicRuleScope::parent_of(&id), topic);
    }

    #[tokio::test]
    async fn test_upgrade_legacy_casing() {
        let resource = ServiceBusTopicAuthorizationRuleResource::new();
        let legacy = state_with(&[
            ("id", format!("{}/AuthorizationRules/rule1", TOPIC_ID).as_str()),
            ("name", "rule1"),
        ]);
        let response = resource
            .as_upgrade_state()
            .unwrap()
            .upgrade_state(
                Context::new(),
                UpgradeResourceStateRequest {
                    type_name: TopicRuleScope::TYPE_NAME.to_string(),
                    version: 0,
                    raw_state: RawState {
                        json: Some(legacy.encode_json().unwrap()),
                        flatmap: None,
                    },
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response
                .upgraded_state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            format!("{}/authorizationRules/rule1", TOPIC_ID)
        );
    }
}
