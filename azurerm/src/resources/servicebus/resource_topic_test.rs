#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::mock_token;
    use crate::resources::test_helpers::{object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::types::{ClientCapabilities, Dynamic};

    const NS_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns1";

    const TOPIC_BODY: &str = r#"{"properties":{
        "defaultMessageTimeToLive":"P14D","maxSizeInMegabytes":1024,"requiresDuplicateDetection":false,
        "duplicateDetectionHistoryTimeWindow":"PT10M","enableBatchedOperations":true,"status":"Active",
        "supportOrdering":true,"autoDeleteOnIdle":"P10675199DT2H48M5.4775807S",
        "enablePartitioning":false,"enableExpress":false}}"#;

    fn topic_path() -> String {
        format!("{}/topics/events", NS_ID)
    }

    async fn configured(server_url: &str) -> ServiceBusTopicResource {
        let mut resource = ServiceBusTopicResource::new();
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

    #[tokio::test]
    async fn test_resource_schema() {
        let resource = ServiceBusTopicResource::new();
        assert_eq!(resource.type_name(), "azurerm_servicebus_topic");

        let response = resource
            .schema(Context::new(), ResourceSchemaRequest {})
            .await;
        let attrs = &response.schema.block.attributes;
        assert!(attrs.iter().any(|a| a.name == "support_ordering" && a.optional));
        assert!(attrs.iter().all(|a| a.name != "requires_session"));
        assert!(attrs.iter().all(|a| a.name != "lock_duration"));
    }

    #[test]
    fn test_expand_topic() {
        let config = object(&[
            ("name", "events".into()),
            ("namespace_id", NS_ID.into()),
            ("support_ordering", true.into()),
            ("default_message_ttl", "P14D".into()),
            ("status", "Disabled".into()),
        ]);
        let props = expand_topic(&config).properties;
        assert_eq!(props.support_ordering, Some(true));
        assert_eq!(props.default_message_time_to_live.as_deref(), Some("P14D"));
        assert_eq!(props.status.as_deref(), Some("Disabled"));
        assert_eq!(props.enable_partitioning, None);
    }

    #[tokio::test]
    async fn test_update_topic() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = topic_path();

        let _namespace = server
            .mock("GET", NS_ID)
            .match_query(Matcher::Any)
            .with_body(r#"{"sku":{"name":"Standard"},"properties":{}}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"supportOrdering": true}
            })))
            .with_body(TOPIC_BODY)
            .create_async()
            .await;
        let _get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(TOPIC_BODY)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let prior = object(&[
            ("id", path.as_str().into()),
            ("name", "events".into()),
            ("namespace_id", NS_ID.into()),
            ("support_ordering", false.into()),
        ]);
        let planned = object(&[
            ("id", path.as_str().into()),
            ("name", "events".into()),
            ("namespace_id", NS_ID.into()),
            ("support_ordering", true.into()),
            ("default_message_ttl", Dynamic::Unknown),
        ]);
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: prior,
                    config: object(&[
                        ("name", "events".into()),
                        ("namespace_id", NS_ID.into()),
                        ("support_ordering", true.into()),
                    ]),
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response
                .new_state
                .get_string(&attr("default_message_ttl"))
                .unwrap(),
            "P14D"
        );
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_missing_topic() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _get = server
            .mock("GET", topic_path().as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"NotFound","message":"gone"}}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: object(&[("id", topic_path().as_str().into())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.new_state.is_none());
    }
}
