//! Service Bus queue authorization rule resource

use super::authorization_rule::{AuthorizationRuleResource, RuleScope};
use crate::migration::{queue_authorization_rule_v0_to_v1, Upgrader};
use crate::parse::{ParseError, QueueAuthorizationRuleId, QueueId};

pub struct QueueRuleScope;

impl RuleScope for QueueRuleScope {
    const TYPE_NAME: &'static str = "azurerm_servicebus_queue_authorization_rule";
    const PARENT_ATTRIBUTE: &'static str = "queue_id";
    const PARENT_KIND: &'static str = "queue";
    const UPGRADERS: &'static [Upgrader] = &[queue_authorization_rule_v0_to_v1];

    type Id = QueueAuthorizationRuleId;
    type ParentId = QueueId;

    fn parse(input: &str) -> Result<Self::Id, ParseError> {
        QueueAuthorizationRuleId::parse(input)
    }

    fn parse_parent(input: &str) -> Result<Self::ParentId, ParseError> {
        QueueId::parse(input)
    }

    fn rule_id(parent: &QueueId, name: &str) -> QueueAuthorizationRuleId {
        QueueAuthorizationRuleId::new(
            &parent.subscription_id,
            &parent.resource_group,
            &parent.namespace_name,
            &parent.name,
            name,
        )
    }

    fn parent_of(id: &QueueAuthorizationRuleId) -> QueueId {
        id.queue_id()
    }

    fn name_of(id: &QueueAuthorizationRuleId) -> &str {
        &id.name
    }
}

pub type ServiceBusQueueAuthorizationRuleResource = AuthorizationRuleResource<QueueRuleScope>;
