#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::mock_token;
    use crate::resources::test_helpers::{block, object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::types::ClientCapabilities;

    const SUBSCRIPTION_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns1/topics/events/subscriptions/audit";

    fn rule_path() -> String {
        format!("{}/rules/r1", SUBSCRIPTION_ID)
    }

    async fn configured(server_url: &str) -> ServiceBusSubscriptionRuleResource {
        let mut resource = ServiceBusSubscriptionRuleResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data_any(server_url),
                },
            )
            .await;
        resource
    }

    fn summaries(config: &DynamicValue) -> Vec<String> {
        validate_filter(config)
            .into_iter()
            .map(|d| d.summary)
            .collect()
    }

    #[test]
    fn test_sql_filter_requires_expression() {
        let config = object(&[("filter_type", "SqlFilter".into())]);
        assert_eq!(summaries(&config), vec!["Missing sql_filter"]);

        let config = object(&[
            ("filter_type", "SqlFilter".into()),
            ("sql_filter", "colour = 'red'".into()),
        ]);
        assert!(summaries(&config).is_empty());
    }

    #[test]
    fn test_sql_filter_rejects_correlation_block() {
        let config = object(&[
            ("filter_type", "SqlFilter".into()),
            ("sql_filter", "1=1".into()),
            ("correlation_filter", block(&[("label", "red".into())])),
        ]);
        assert_eq!(summaries(&config), vec!["Conflicting correlation_filter"]);
    }

    #[test]
    fn test_correlation_filter_needs_a_field() {
        let config = object(&[("filter_type", "CorrelationFilter".into())]);
        assert_eq!(summaries(&config), vec!["Missing correlation_filter"]);

        let config = object(&[
            ("filter_type", "CorrelationFilter".into()),
            ("correlation_filter", block(&[("label", Dynamic::Null)])),
        ]);
        assert_eq!(summaries(&config), vec!["Empty correlation_filter"]);

        let config = object(&[
            ("filter_type", "CorrelationFilter".into()),
            ("sql_filter", "1=1".into()),
            ("correlation_filter", block(&[("message_id", "m-1".into())])),
        ]);
        assert_eq!(summaries(&config), vec!["Conflicting sql_filter"]);
    }

    #[test]
    fn test_unknown_correlation_block_is_not_checked() {
        let config = object(&[
            ("filter_type", "CorrelationFilter".into()),
            ("correlation_filter", Dynamic::Unknown),
        ]);
        assert!(summaries(&config).is_empty());
    }

    #[test]
    fn test_expand_rule_drops_inactive_filter() {
        let config = object(&[
            ("filter_type", "CorrelationFilter".into()),
            ("action", "SET sys.label = 'seen'".into()),
            (
                "correlation_filter",
                block(&[
                    ("label", "red".into()),
                    ("to", Dynamic::Null),
                    (
                        "properties",
                        Dynamic::Map(
                            [("region".to_string(), Dynamic::String("eu".into()))]
                                .into_iter()
                                .collect(),
                        ),
                    ),
                ]),
            ),
        ]);
        let props = expand_rule(&config).properties;
        assert!(props.sql_filter.is_none());
        let filter = props.correlation_filter.unwrap();
        assert_eq!(filter.label.as_deref(), Some("red"));
        assert_eq!(filter.to, None);
        assert_eq!(
            filter.properties.unwrap().get("region").map(String::as_str),
            Some("eu")
        );
        assert_eq!(
            props.action.unwrap().sql_expression.as_deref(),
            Some("SET sys.label = 'seen'")
        );
    }

    #[tokio::test]
    async fn test_create_correlation_rule() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = rule_path();
        let body = r#"{"properties":{"filterType":"CorrelationFilter",
            "correlationFilter":{"label":"red","properties":{"region":"eu"}},
            "action":{}}}"#;

        let absent = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"NotFound","message":"no rule"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {
                    "filterType": "CorrelationFilter",
                    "correlationFilter": {"label": "red"}
                }
            })))
            .with_body(body)
            .create_async()
            .await;
        let _get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(body)
            .create_async()
            .await;

        let config = object(&[
            ("name", "r1".into()),
            ("subscription_id", SUBSCRIPTION_ID.into()),
            ("filter_type", "CorrelationFilter".into()),
            ("sql_filter", Dynamic::Null),
            ("action", Dynamic::Null),
            ("correlation_filter", block(&[("label", "red".into())])),
        ]);
        let mut planned = config.clone();
        planned.set_value(&attr("id"), Dynamic::Unknown).unwrap();

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config,
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(response.new_state.get_string(&attr("id")).unwrap(), path);
        assert_eq!(
            response.new_state.get(&attr("sql_filter")),
            Dynamic::Null
        );
        absent.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_sql_rule_clears_correlation_block() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _get = server
            .mock("GET", rule_path().as_str())
            .match_query(Matcher::Any)
            .with_body(
                r#"{"properties":{"filterType":"SqlFilter",
                "sqlFilter":{"sqlExpression":"colour = 'red'"},
                "correlationFilter":{"label":"ignored"},
                "action":{"sqlExpression":""}}}"#,
            )
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: object(&[("id", rule_path().as_str().into())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&attr("name")).unwrap(), "r1");
        assert_eq!(
            state.get_string(&attr("subscription_id")).unwrap(),
            SUBSCRIPTION_ID
        );
        assert_eq!(
            state.get_string(&attr("sql_filter")).unwrap(),
            "colour = 'red'"
        );
        assert_eq!(state.get(&attr("action")), Dynamic::Null);
        assert_eq!(
            state.get(&attr("correlation_filter")),
            Dynamic::List(vec![])
        );
    }

    #[tokio::test]
    async fn test_import_rejects_subscription_id() {
        let resource = ServiceBusSubscriptionRuleResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: SUBSCRIPTION_ID.to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
    }
}
