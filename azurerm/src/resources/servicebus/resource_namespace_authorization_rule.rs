//! Service Bus namespace authorization rule resource

use super::authorization_rule::{AuthorizationRuleResource, RuleScope};
use crate::migration::{namespace_authorization_rule_v0_to_v1, Upgrader};
use crate::parse::{NamespaceAuthorizationRuleId, NamespaceId, ParseError};

pub struct NamespaceRuleScope;

impl RuleScope for NamespaceRuleScope {
    const TYPE_NAME: &'static str = "azurerm_servicebus_namespace_authorization_rule";
    const PARENT_ATTRIBUTE: &'static str = "namespace_id";
    const PARENT_KIND: &'static str = "namespace";
    const UPGRADERS: &'static [Upgrader] = &[namespace_authorization_rule_v0_to_v1];

    type Id = NamespaceAuthorizationRuleId;
    type ParentId = NamespaceId;

    fn parse(input: &str) -> Result<Self::Id, ParseError> {
        NamespaceAuthorizationRuleId::parse(input)
    }

    fn parse_parent(input: &str) -> Result<Self::ParentId, ParseError> {
        NamespaceId::parse(input)
    }

    fn rule_id(parent: &NamespaceId, name: &str) -> NamespaceAuthorizationRuleId {
        NamespaceAuthorizationRuleId::new(
            &parent.subscription_id,
            &parent.resource_group,
            &parent.name,
            name,
        )
    }

    fn parent_of(id: &NamespaceAuthorizationRuleId) -> NamespaceId {
        id.namespace_id()
    }

    fn name_of(id: &NamespaceAuthorizationRuleId) -> &str {
        &id.name
    }
}

pub type ServiceBusNamespaceAuthorizationRuleResource = AuthorizationRuleResource<NamespaceRuleScope>;

#[cfg(test)]
#[path = "./resource_namespace_authorization_rule_test.rs"]
mod resource_namespace_authorization_rule_test;
