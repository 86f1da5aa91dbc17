use super::{rewrite_id, MigrationError};
use crate::parse::{
    NamespaceAuthorizationRuleId, NamespaceNetworkRuleSetId, QueueAuthorizationRuleId,
    TopicAuthorizationRuleId,
};
use tfplug::types::DynamicValue;

fn fix_authorization_rules_casing(id: &str) -> String {
    id.replace("/AuthorizationRules/", "/authorizationRules/")
}

pub fn namespace_authorization_rule_v0_to_v1(
    state: DynamicValue,
) -> Result<DynamicValue, MigrationError> {
    rewrite_id(
        state,
        fix_authorization_rules_casing,
        NamespaceAuthorizationRuleId::parse,
    )
}

pub fn queue_authorization_rule_v0_to_v1(
    state: DynamicValue,
) -> Result<DynamicValue, MigrationError> {
    rewrite_id(
        state,
        fix_authorization_rules_casing,
        QueueAuthorizationRuleId::parse,
    )
}

pub fn topic_authorization_rule_v0_to_v1(
    state: DynamicValue,
) -> Result<DynamicValue, MigrationError> {
    rewrite_id(
        state,
        fix_authorization_rules_casing,
        TopicAuthorizationRuleId::parse,
    )
}

pub fn namespace_network_rule_set_v0_to_v1(
    state: DynamicValue,
) -> Result<DynamicValue, MigrationError> {
    rewrite_id(
        state,
        |id| id.replace("/networkrulesets/", "/networkRuleSets/"),
        NamespaceNetworkRuleSetId::parse,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::state_with;
    use tfplug::types::AttributePath;

    const NAMESPACE: &str =
        "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns1";

    fn id_of(state: &DynamicValue) -> String {
        state.get_string(&AttributePath::new("id")).unwrap()
    }

    #[test]
    fn namespace_authorization_rule_casing() {
        let state = state_with(&[
            ("id", format!("{}/AuthorizationRules/rule1", NAMESPACE).as_str()),
            ("name", "rule1"),
        ]);

        let upgraded = namespace_authorization_rule_v0_to_v1(state).unwrap();
        assert_eq!(id_of(&upgraded), format!("{}/authorizationRules/rule1", NAMESPACE));
        assert_eq!(upgraded.get_string(&AttributePath::new("name")).unwrap(), "rule1");
    }

    #[test]
    fn queue_and_topic_authorization_rule_casing() {
        let queue = state_with(&[("id", format!("{}/queues/q1/AuthorizationRules/r", NAMESPACE).as_str())]);
        assert_eq!(
            id_of(&queue_authorization_rule_v0_to_v1(queue).unwrap()),
            format!("{}/queues/q1/authorizationRules/r", NAMESPACE)
        );

        let topic = state_with(&[("id", format!("{}/topics/t1/AuthorizationRules/r", NAMESPACE).as_str())]);
        assert_eq!(
            id_of(&topic_authorization_rule_v0_to_v1(topic).unwrap()),
            format!("{}/topics/t1/authorizationRules/r", NAMESPACE)
        );
    }

    #[test]
    fn already_current_ids_are_kept() {
        let id = format!("{}/authorizationRules/rule1", NAMESPACE);
        let upgraded =
            namespace_authorization_rule_v0_to_v1(state_with(&[("id", id.as_str())])).unwrap();
        assert_eq!(id_of(&upgraded), id);
    }

    #[test]
    fn queue_rule_on_a_topic_is_rejected() {
        let state = state_with(&[("id", format!("{}/topics/t1/AuthorizationRules/r", NAMESPACE).as_str())]);
        assert!(matches!(
            queue_authorization_rule_v0_to_v1(state),
            Err(MigrationError::InvalidId { .. })
        ));
    }

    #[test]
    fn network_rule_set_casing() {
        let state = state_with(&[("id", format!("{}/networkrulesets/default", NAMESPACE).as_str())]);
        assert_eq!(
            id_of(&namespace_network_rule_set_v0_to_v1(state).unwrap()),
            format!("{}/networkRuleSets/default", NAMESPACE)
        );
    }
}
