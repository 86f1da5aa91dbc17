//! Service Bus resource IDs

use super::{resource_id_conversions, ParseError, ResourceId, ResourceIdParser};

const PROVIDER: &str = "Microsoft.ServiceBus";

/// Consumes the `/subscriptions/{s}/resourceGroups/{rg}/providers/Microsoft.ServiceBus/namespaces/{ns}` prefix
fn parse_namespace_prefix(parser: &mut ResourceIdParser<'_>) -> Result<NamespaceId, ParseError> {
    let subscription_id = parser.value("subscriptions")?;
    let resource_group = parser.value("resourceGroups")?;
    parser.provider(PROVIDER)?;
    let name = parser.value("namespaces")?;
    Ok(NamespaceId {
        subscription_id,
        resource_group,
        name,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl NamespaceId {
    pub fn new(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let id = parse_namespace_prefix(&mut parser)?;
        parser.finish()?;
        Ok(id)
    }

    /// The `RootManageSharedAccessKey` rule every namespace is created with
    pub fn default_authorization_rule(&self) -> NamespaceAuthorizationRuleId {
        NamespaceAuthorizationRuleId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.name,
            "RootManageSharedAccessKey",
        )
    }
}

impl ResourceId for NamespaceId {
    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/namespaces/{}",
            self.subscription_id, self.resource_group, PROVIDER, self.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceAuthorizationRuleId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub name: String,
}

impl NamespaceAuthorizationRuleId {
    pub fn new(subscription_id: &str, resource_group: &str, namespace_name: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let name = parser.value("authorizationRules")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            name,
        })
    }

    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(&self.subscription_id, &self.resource_group, &self.namespace_name)
    }
}

impl ResourceId for NamespaceAuthorizationRuleId {
    fn id(&self) -> String {
        format!("{}/authorizationRules/{}", self.namespace_id().id(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub name: String,
}

impl QueueId {
    pub fn new(subscription_id: &str, resource_group: &str, namespace_name: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let name = parser.value("queues")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            name,
        })
    }

    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(&self.subscription_id, &self.resource_group, &self.namespace_name)
    }
}

impl ResourceId for QueueId {
    fn id(&self) -> String {
        format!("{}/queues/{}", self.namespace_id().id(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAuthorizationRuleId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub queue_name: String,
    pub name: String,
}

impl QueueAuthorizationRuleId {
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        namespace_name: &str,
        queue_name: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            queue_name: queue_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let queue_name = parser.value("queues")?;
        let name = parser.value("authorizationRules")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            queue_name,
            name,
        })
    }

    pub fn queue_id(&self) -> QueueId {
        QueueId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.namespace_name,
            &self.queue_name,
        )
    }
}

impl ResourceId for QueueAuthorizationRuleId {
    fn id(&self) -> String {
        format!("{}/authorizationRules/{}", self.queue_id().id(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub name: String,
}

impl TopicId {
    pub fn new(subscription_id: &str, resource_group: &str, namespace_name: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let name = parser.value("topics")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            name,
        })
    }

    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(&self.subscription_id, &self.resource_group, &self.namespace_name)
    }
}

impl ResourceId for TopicId {
    fn id(&self) -> String {
        format!("{}/topics/{}", self.namespace_id().id(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAuthorizationRuleId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub topic_name: String,
    pub name: String,
}

impl TopicAuthorizationRuleId {
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        namespace_name: &str,
        topic_name: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            topic_name: topic_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let topic_name = parser.value("topics")?;
        let name = parser.value("authorizationRules")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            topic_name,
            name,
        })
    }

    pub fn topic_id(&self) -> TopicId {
        TopicId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.namespace_name,
            &self.topic_name,
        )
    }
}

impl ResourceId for TopicAuthorizationRuleId {
    fn id(&self) -> String {
        format!("{}/authorizationRules/{}", self.topic_id().id(), self.name)
    }
}

/// A subscription to a topic (not an Azure subscription)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub topic_name: String,
    pub name: String,
}

impl SubscriptionId {
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        namespace_name: &str,
        topic_name: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            topic_name: topic_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let topic_name = parser.value("topics")?;
        let name = parser.value("subscriptions")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            topic_name,
            name,
        })
    }

    pub fn topic_id(&self) -> TopicId {
        TopicId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.namespace_name,
            &self.topic_name,
        )
    }
}

impl ResourceId for SubscriptionId {
    fn id(&self) -> String {
        format!("{}/subscriptions/{}", self.topic_id().id(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRuleId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub topic_name: String,
    pub subscription_name: String,
    pub name: String,
}

impl SubscriptionRuleId {
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        namespace_name: &str,
        topic_name: &str,
        subscription_name: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            topic_name: topic_name.to_string(),
            subscription_name: subscription_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let topic_name = parser.value("topics")?;
        let subscription_name = parser.value("subscriptions")?;
        let name = parser.value("rules")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            topic_name,
            subscription_name,
            name,
        })
    }

    pub fn topic_subscription_id(&self) -> SubscriptionId {
        SubscriptionId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.namespace_name,
            &self.topic_name,
            &self.subscription_name,
        )
    }
}

impl ResourceId for SubscriptionRuleId {
    fn id(&self) -> String {
        format!("{}/rules/{}", self.topic_subscription_id().id(), self.name)
    }
}

/// The singleton `networkRuleSets/default` child of a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceNetworkRuleSetId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub name: String,
}

impl NamespaceNetworkRuleSetId {
    pub const DEFAULT_NAME: &'static str = "default";

    pub fn new(subscription_id: &str, resource_group: &str, namespace_name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            name: Self::DEFAULT_NAME.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        parser.literal("networkRuleSets", Self::DEFAULT_NAME)?;
        parser.finish()?;
        Ok(Self::new(
            &namespace.subscription_id,
            &namespace.resource_group,
            &namespace.name,
        ))
    }

    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(&self.subscription_id, &self.resource_group, &self.namespace_name)
    }
}

impl ResourceId for NamespaceNetworkRuleSetId {
    fn id(&self) -> String {
        format!("{}/networkRuleSets/{}", self.namespace_id().id(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDisasterRecoveryConfigId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace_name: String,
    pub name: String,
}

impl NamespaceDisasterRecoveryConfigId {
    pub fn new(subscription_id: &str, resource_group: &str, namespace_name: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            namespace_name: namespace_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let namespace = parse_namespace_prefix(&mut parser)?;
        let name = parser.value("disasterRecoveryConfigs")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: namespace.subscription_id,
            resource_group: namespace.resource_group,
            namespace_name: namespace.name,
            name,
        })
    }

    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(&self.subscription_id, &self.resource_group, &self.namespace_name)
    }
}

impl ResourceId for NamespaceDisasterRecoveryConfigId {
    fn id(&self) -> String {
        format!(
            "{}/disasterRecoveryConfigs/{}",
            self.namespace_id().id(),
            self.name
        )
    }
}

resource_id_conversions!(
    NamespaceId,
    NamespaceAuthorizationRuleId,
    QueueId,
    QueueAuthorizationRuleId,
    TopicId,
    TopicAuthorizationRuleId,
    SubscriptionId,
    SubscriptionRuleId,
    NamespaceNetworkRuleSetId,
    NamespaceDisasterRecoveryConfigId,
);

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str =
        "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ServiceBus/namespaces/namespace1";

    #[test]
    fn namespace_id_formats_and_parses() {
        let id = NamespaceId::new("12345678-1234-9876-4563-123456789012", "resGroup1", "namespace1");
        assert_eq!(id.id(), NS);
        assert_eq!(NamespaceId::parse(NS).unwrap(), id);
        assert_eq!(id.to_string(), NS);
    }

    #[test]
    fn namespace_id_rejects_bad_input() {
        let cases = [
            "",
            "/",
            "/subscriptions/",
            "/subscriptions/12345678-1234-9876-4563-123456789012/",
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/",
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ServiceBus/",
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ServiceBus/namespaces/",
            "/SUBSCRIPTIONS/12345678-1234-9876-4563-123456789012/RESOURCEGROUPS/RESGROUP1/PROVIDERS/MICROSOFT.SERVICEBUS/NAMESPACES/NAMESPACE1",
        ];
        for case in cases {
            assert!(NamespaceId::parse(case).is_err(), "expected error for {:?}", case);
        }
    }

    #[test]
    fn authorization_rule_ids_require_camel_case_segment() {
        let valid = format!("{}/authorizationRules/rule1", NS);
        let id = NamespaceAuthorizationRuleId::parse(&valid).unwrap();
        assert_eq!(id.namespace_name, "namespace1");
        assert_eq!(id.name, "rule1");
        assert_eq!(id.id(), valid);

        let legacy = format!("{}/AuthorizationRules/rule1", NS);
        assert_eq!(
            NamespaceAuthorizationRuleId::parse(&legacy),
            Err(ParseError::MissingSegment("authorizationRules".to_string()))
        );
    }

    #[test]
    fn queue_and_topic_rule_ids_round_trip() {
        let queue_rule = QueueAuthorizationRuleId::new("sub", "rg", "ns", "queue1", "rule1");
        assert_eq!(
            queue_rule.id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns/queues/queue1/authorizationRules/rule1"
        );
        assert_eq!(QueueAuthorizationRuleId::parse(&queue_rule.id()).unwrap(), queue_rule);

        let topic_rule = TopicAuthorizationRuleId::new("sub", "rg", "ns", "topic1", "rule1");
        assert_eq!(TopicAuthorizationRuleId::parse(&topic_rule.id()).unwrap(), topic_rule);
        assert!(QueueAuthorizationRuleId::parse(&topic_rule.id()).is_err());
    }

    #[test]
    fn entity_ids_round_trip() {
        let queue = QueueId::parse(&format!("{}/queues/queue1", NS)).unwrap();
        assert_eq!(queue.namespace_name, "namespace1");
        assert_eq!(queue.name, "queue1");
        assert_eq!(queue.id(), format!("{}/queues/queue1", NS));
        assert_eq!(QueueId::parse(&queue.id()).unwrap(), queue);

        let topic: TopicId = format!("{}/topics/topic1", NS).parse().unwrap();
        assert_eq!(topic.name, "topic1");
        assert_eq!(topic.namespace_id().id(), NS);
        assert_eq!(TopicId::parse(&topic.to_string()).unwrap(), topic);

        let subscription =
            SubscriptionId::parse(&format!("{}/topics/topic1/subscriptions/sub1", NS)).unwrap();
        assert_eq!(subscription.topic_name, "topic1");
        assert_eq!(subscription.name, "sub1");
        assert_eq!(subscription.topic_id(), topic);
        assert_eq!(SubscriptionId::parse(&subscription.id()).unwrap(), subscription);
    }

    #[test]
    fn entity_ids_reject_bad_input() {
        assert_eq!(QueueId::parse(""), Err(ParseError::Empty));
        assert_eq!(
            QueueId::parse(&format!("{}/queues/", NS)),
            Err(ParseError::EmptySegment("queues".to_string()))
        );
        assert_eq!(
            QueueId::parse(&format!("{}/Queues/queue1", NS)),
            Err(ParseError::MissingSegment("queues".to_string()))
        );
        assert!(QueueId::parse(&format!("{}/topics/topic1", NS)).is_err());

        assert_eq!(TopicId::parse(""), Err(ParseError::Empty));
        assert_eq!(
            TopicId::parse(&format!("{}/topics/", NS)),
            Err(ParseError::EmptySegment("topics".to_string()))
        );
        assert!(TopicId::parse(&format!("{}/Topics/topic1", NS)).is_err());

        assert_eq!(SubscriptionId::parse(""), Err(ParseError::Empty));
        assert_eq!(
            SubscriptionId::parse(&format!("{}/subscriptions/sub1", NS)),
            Err(ParseError::MissingSegment("topics".to_string()))
        );
        assert_eq!(
            SubscriptionId::parse(&format!("{}/topics/topic1/subscriptions/", NS)),
            Err(ParseError::EmptySegment("subscriptions".to_string()))
        );
        assert!(SubscriptionId::parse(&format!("{}/topics/topic1", NS)).is_err());
    }

    #[test]
    fn queue_id_rejects_trailing_segments() {
        let input = format!("{}/queues/queue1/authorizationRules/rule1", NS);
        assert!(matches!(
            QueueId::parse(&input),
            Err(ParseError::UnexpectedSegment(_))
        ));
    }

    #[test]
    fn subscription_rule_id_round_trips() {
        let input = format!("{}/topics/topic1/subscriptions/sub1/rules/rule1", NS);
        let id: SubscriptionRuleId = input.parse().unwrap();
        assert_eq!(id.topic_name, "topic1");
        assert_eq!(id.subscription_name, "sub1");
        assert_eq!(id.name, "rule1");
        assert_eq!(id.to_string(), input);
        assert_eq!(
            id.topic_subscription_id().id(),
            format!("{}/topics/topic1/subscriptions/sub1", NS)
        );
    }

    #[test]
    fn network_rule_set_id_is_always_default() {
        let input = format!("{}/networkRuleSets/default", NS);
        let id = NamespaceNetworkRuleSetId::parse(&input).unwrap();
        assert_eq!(id.name, "default");
        assert_eq!(id.id(), input);

        assert!(NamespaceNetworkRuleSetId::parse(&format!("{}/networkRuleSets/other", NS)).is_err());
        assert!(NamespaceNetworkRuleSetId::parse(&format!("{}/networkrulesets/default", NS)).is_err());
    }

    #[test]
    fn disaster_recovery_config_id_round_trips() {
        let id = NamespaceDisasterRecoveryConfigId::new("sub", "rg", "primary", "alias1");
        assert_eq!(NamespaceDisasterRecoveryConfigId::parse(&id.id()).unwrap(), id);
        assert_eq!(id.namespace_id(), NamespaceId::new("sub", "rg", "primary"));
    }

    #[test]
    fn default_authorization_rule_is_root_manage() {
        let id = NamespaceId::new("sub", "rg", "ns");
        assert_eq!(
            id.default_authorization_rule().id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns/authorizationRules/RootManageSharedAccessKey"
        );
    }
}
