#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::mock_token;
    use crate::resources::test_helpers::{object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::context::Context;
    use tfplug::resource::{
        ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
        ImportResourceStateRequest, ReadResourceRequest, Resource, ResourceSchemaRequest,
        ResourceWithConfigure, ValidateResourceConfigRequest,
    };
    use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

    const NS_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns1";

    fn rule_path() -> String {
        format!("{}/authorizationRules/rule1", NS_ID)
    }

    async fn configured(server_url: &str) -> ServiceBusNamespaceAuthorizationRuleResource {
        let mut resource = ServiceBusNamespaceAuthorizationRuleResource::new();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data_any(server_url),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    fn planned_state() -> DynamicValue {
        object(&[
            ("id", Dynamic::Unknown),
            ("name", "rule1".into()),
            ("namespace_id", NS_ID.into()),
            ("listen", true.into()),
            ("send", true.into()),
            ("manage", true.into()),
            ("primary_key", Dynamic::Unknown),
            ("secondary_key", Dynamic::Unknown),
            ("primary_connection_string", Dynamic::Unknown),
            ("secondary_connection_string", Dynamic::Unknown),
            ("primary_connection_string_alias", Dynamic::Unknown),
            ("secondary_connection_string_alias", Dynamic::Unknown),
        ])
    }

    #[test]
    fn test_resource_type_name() {
        let resource = ServiceBusNamespaceAuthorizationRuleResource::new();
        assert_eq!(
            resource.type_name(),
            "azurerm_servicebus_namespace_authorization_rule"
        );
    }

    #[tokio::test]
    async fn test_resource_schema() {
        let resource = ServiceBusNamespaceAuthorizationRuleResource::new();
        let response = resource
            .schema(Context::new(), ResourceSchemaRequest {})
            .await;

        assert_eq!(response.schema.version, 1);
        let attrs = &response.schema.block.attributes;
        assert!(attrs.iter().any(|a| a.name == "namespace_id" && a.required));
        assert!(attrs.iter().any(|a| a.name == "manage" && a.optional));
        assert!(attrs
            .iter()
            .any(|a| a.name == "secondary_connection_string_alias" && a.sensitive));
    }

    #[tokio::test]
    async fn test_validate_manage_without_send() {
        let resource = ServiceBusNamespaceAuthorizationRuleResource::new();
        let config = object(&[
            ("name", "rule1".into()),
            ("namespace_id", NS_ID.into()),
            ("listen", true.into()),
            ("send", false.into()),
            ("manage", true.into()),
        ]);
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: NamespaceRuleScope::TYPE_NAME.to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("rights"));
    }

    #[tokio::test]
    async fn test_create_rule() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = rule_path();

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
            .match_body(Matcher::Json(serde_json::json!({
                "properties": {"rights": ["Listen", "Send", "Manage"]}
            })))
            .with_body(r#"{"properties":{"rights":["Listen","Send","Manage"]}}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"rights":["Listen","Send","Manage"]}}"#)
            .create_async()
            .await;
        let keys = server
            .mock("POST", format!("{}/listKeys", path).as_str())
            .match_query(Matcher::Any)
            .with_body(
                r#"{"primaryKey":"pk","secondaryKey":"sk",
                   "primaryConnectionString":"Endpoint=sb://ns1/;SharedAccessKeyName=rule1;SharedAccessKey=pk",
                   "secondaryConnectionString":"Endpoint=sb://ns1/;SharedAccessKeyName=rule1;SharedAccessKey=sk",
                   "aliasPrimaryConnectionString":"Endpoint=sb://alias/;SharedAccessKeyName=rule1;SharedAccessKey=pk"}"#,
            )
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let planned = planned_state();
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: NamespaceRuleScope::TYPE_NAME.to_string(),
                    config: planned.clone(),
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(
            state.get_string(&AttributePath::new("id")).unwrap(),
            path
        );
        assert_eq!(
            state.get_string(&AttributePath::new("primary_key")).unwrap(),
            "pk"
        );
        assert!(state
            .get_string(&AttributePath::new("primary_connection_string_alias"))
            .unwrap()
            .starts_with("Endpoint=sb://alias/"));
        assert_eq!(
            state.get(&AttributePath::new("secondary_connection_string_alias")),
            Dynamic::Null
        );

        absent.assert_async().await;
        put.assert_async().await;
        keys.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_fills_identity_from_id() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = rule_path();
        let _get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"rights":["Listen"]}}"#)
            .create_async()
            .await;
        let _keys = server
            .mock("POST", format!("{}/listKeys", path).as_str())
            .match_query(Matcher::Any)
            .with_body(r#"{"primaryKey":"pk","secondaryKey":"sk"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: NamespaceRuleScope::TYPE_NAME.to_string(),
                    current_state: object(&[("id", path.as_str().into())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "rule1");
        assert_eq!(
            state.get_string(&AttributePath::new("namespace_id")).unwrap(),
            NS_ID
        );
        assert!(state.get_bool(&AttributePath::new("listen")).unwrap());
        assert!(!state.get_bool(&AttributePath::new("manage")).unwrap());
    }

    #[tokio::test]
    async fn test_delete_rule_already_gone() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let delete = server
            .mock("DELETE", rule_path().as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"NotFound","message":"gone"}}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: NamespaceRuleScope::TYPE_NAME.to_string(),
                    prior_state: object(&[("id", rule_path().as_str().into())]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_import_rejects_queue_rule_id() {
        let resource = ServiceBusNamespaceAuthorizationRuleResource::new();
        let response = resource
            .as_import_state()
            .unwrap()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: NamespaceRuleScope::TYPE_NAME.to_string(),
                    id: format!("{}/queues/q1/authorizationRules/rule1", NS_ID),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
    }
}
