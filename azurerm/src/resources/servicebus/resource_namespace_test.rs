#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::mock_token;
    use crate::resources::test_helpers::{create_test_provider_data, object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::resource::ImportResourceStateRequest;
    use tfplug::types::ClientCapabilities;

    const NS_PATH: &str =
        "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns1";

    const NAMESPACE_BODY: &str = r#"{
        "location": "westeurope",
        "sku": {"name": "Standard", "tier": "Standard"},
        "tags": {"env": "test"},
        "properties": {
            "minimumTlsVersion": "1.2",
            "publicNetworkAccess": "Enabled",
            "disableLocalAuth": false,
            "zoneRedundant": false,
            "serviceBusEndpoint": "https://ns1.servicebus.windows.net:443/",
            "provisioningState": "Succeeded"
        }
    }"#;

    const KEYS_BODY: &str = r#"{
        "primaryConnectionString": "Endpoint=sb://ns1/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=pk",
        "secondaryConnectionString": "Endpoint=sb://ns1/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=sk",
        "primaryKey": "pk",
        "secondaryKey": "sk",
        "keyName": "RootManageSharedAccessKey"
    }"#;

    fn planned_state() -> DynamicValue {
        object(&[
            ("id", Dynamic::Unknown),
            ("name", "ns1".into()),
            ("resource_group_name", "rg".into()),
            ("location", "West Europe".into()),
            ("sku", "Standard".into()),
            ("capacity", 0i64.into()),
            ("premium_messaging_partitions", Dynamic::Unknown),
            ("local_auth_enabled", true.into()),
            ("public_network_access_enabled", true.into()),
            ("minimum_tls_version", Dynamic::Unknown),
            ("zone_redundant", Dynamic::Unknown),
            ("tags", Dynamic::Map([("env".to_string(), "test".into())].into())),
            ("endpoint", Dynamic::Unknown),
            ("default_primary_connection_string", Dynamic::Unknown),
            ("default_secondary_connection_string", Dynamic::Unknown),
            ("default_primary_key", Dynamic::Unknown),
            ("default_secondary_key", Dynamic::Unknown),
        ])
    }

    fn config_from(planned: &DynamicValue) -> DynamicValue {
        let mut config = planned.clone();
        for name in [
            "id",
            "premium_messaging_partitions",
            "minimum_tls_version",
            "zone_redundant",
            "endpoint",
            "default_primary_connection_string",
            "default_secondary_connection_string",
            "default_primary_key",
            "default_secondary_key",
        ] {
            config.set_null(&attr(name)).unwrap();
        }
        config
    }

    async fn configured(server_url: &str) -> ServiceBusNamespaceResource {
        let mut resource = ServiceBusNamespaceResource::new();
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

    fn validate_request(config: DynamicValue) -> ValidateResourceConfigRequest {
        ValidateResourceConfigRequest {
            type_name: TYPE_NAME.to_string(),
            config,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[test]
    fn test_resource_type_name() {
        let resource = ServiceBusNamespaceResource::new();
        assert_eq!(resource.type_name(), "azurerm_servicebus_namespace");
    }

    #[tokio::test]
    async fn test_resource_schema() {
        let resource = ServiceBusNamespaceResource::new();
        let response = resource
            .schema(Context::new(), ResourceSchemaRequest {})
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.schema.version, 0);

        let attrs = &response.schema.block.attributes;
        assert!(attrs.iter().any(|a| a.name == "name" && a.required));
        assert!(attrs.iter().any(|a| a.name == "sku" && a.required));
        assert!(attrs.iter().any(|a| a.name == "capacity" && a.optional));
        assert!(attrs
            .iter()
            .any(|a| a.name == "zone_redundant" && a.optional && a.computed));
        assert!(attrs
            .iter()
            .any(|a| a.name == "default_primary_key" && a.computed && a.sensitive));
        assert!(attrs.iter().any(|a| a.name == "endpoint" && a.computed));
    }

    #[test]
    fn test_premium_tier_change_detection() {
        let standard = Dynamic::String("Standard".into());
        let basic = Dynamic::String("Basic".into());
        let premium = Dynamic::String("Premium".into());

        assert!(premium_tier_changed(&standard, &premium));
        assert!(premium_tier_changed(&premium, &basic));
        assert!(!premium_tier_changed(&basic, &standard));
        assert!(!premium_tier_changed(&premium, &Dynamic::String("premium".into())));
    }

    #[tokio::test]
    async fn test_validate_capacity_requires_premium() {
        let resource = ServiceBusNamespaceResource::new();
        let config = object(&[("sku", "Standard".into()), ("capacity", 2i64.into())]);

        let response = resource
            .validate(Context::new(), validate_request(config))
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("Invalid capacity"));
    }

    #[tokio::test]
    async fn test_validate_premium_settings() {
        let resource = ServiceBusNamespaceResource::new();

        let valid = object(&[
            ("sku", "Premium".into()),
            ("capacity", 2i64.into()),
            ("premium_messaging_partitions", 2i64.into()),
        ]);
        let response = resource
            .validate(Context::new(), validate_request(valid))
            .await;
        assert!(response.diagnostics.is_empty());

        let partitions_on_standard = object(&[
            ("sku", "Standard".into()),
            ("premium_messaging_partitions", 2i64.into()),
        ]);
        let response = resource
            .validate(Context::new(), validate_request(partitions_on_standard))
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0]
            .summary
            .contains("premium_messaging_partitions"));
    }

    #[tokio::test]
    async fn test_validate_skips_unknown_sku() {
        let resource = ServiceBusNamespaceResource::new();
        let config = object(&[("sku", Dynamic::Unknown), ("capacity", 4i64.into())]);
        let response = resource
            .validate(Context::new(), validate_request(config))
            .await;
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn test_expand_namespace_drops_capacity_outside_premium() {
        let config = config_from(&planned_state());
        let namespace = expand_namespace(&config);

        assert_eq!(namespace.location.as_deref(), Some("westeurope"));
        let sku = namespace.sku.unwrap();
        assert_eq!(sku.name, "Standard");
        assert_eq!(sku.capacity, None);
        assert_eq!(namespace.properties.disable_local_auth, Some(false));
        assert_eq!(
            namespace.properties.public_network_access.as_deref(),
            Some("Enabled")
        );
        assert_eq!(namespace.tags.unwrap()["env"], "test");
    }

    #[tokio::test]
    async fn test_create_without_configure_fails() {
        let resource = ServiceBusNamespaceResource::new();
        let planned = planned_state();
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: config_from(&planned),
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn test_create_namespace() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;

        let absent = server
            .mock("GET", NS_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"NotFound","message":"not found"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", NS_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "location": "westeurope",
                "sku": {"name": "Standard"},
                "properties": {"disableLocalAuth": false, "publicNetworkAccess": "Enabled"}
            })))
            .with_body(NAMESPACE_BODY)
            .create_async()
            .await;
        let _get = server
            .mock("GET", NS_PATH)
            .match_query(Matcher::Any)
            .with_body(NAMESPACE_BODY)
            .create_async()
            .await;
        let keys = server
            .mock(
                "POST",
                format!("{}/authorizationRules/RootManageSharedAccessKey/listKeys", NS_PATH).as_str(),
            )
            .match_query(Matcher::Any)
            .with_body(KEYS_BODY)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let planned = planned_state();
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: config_from(&planned),
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state.get_string(&attr("id")).unwrap(), NS_PATH);
        assert_eq!(state.get_string(&attr("location")).unwrap(), "West Europe");
        assert_eq!(state.get_string(&attr("minimum_tls_version")).unwrap(), "1.2");
        assert_eq!(state.get_i64(&attr("premium_messaging_partitions")).unwrap(), 0);
        assert!(!state.get_bool(&attr("zone_redundant")).unwrap());
        assert_eq!(
            state.get_string(&attr("endpoint")).unwrap(),
            "https://ns1.servicebus.windows.net:443/"
        );
        assert_eq!(state.get_string(&attr("default_primary_key")).unwrap(), "pk");

        absent.assert_async().await;
        put.assert_async().await;
        keys.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_existing_namespace_requires_import() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _existing = server
            .mock("GET", NS_PATH)
            .match_query(Matcher::Any)
            .with_body(NAMESPACE_BODY)
            .create_async()
            .await;
        let put = server
            .mock("PUT", NS_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let planned = planned_state();
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: config_from(&planned),
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("needs to be imported"));
        assert!(response.new_state.is_null());
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_refreshes_from_remote() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _get = server
            .mock("GET", NS_PATH)
            .match_query(Matcher::Any)
            .with_body(NAMESPACE_BODY.replace("\"1.2\"", "\"1.1\""))
            .create_async()
            .await;
        let _keys = server
            .mock(
                "POST",
                format!("{}/authorizationRules/RootManageSharedAccessKey/listKeys", NS_PATH).as_str(),
            )
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"code":"AuthorizationFailed","message":"no"}}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let current = object(&[("id", NS_PATH.into()), ("minimum_tls_version", "1.2".into())]);
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: current,
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&attr("name")).unwrap(), "ns1");
        assert_eq!(state.get_string(&attr("resource_group_name")).unwrap(), "rg");
        assert_eq!(state.get_string(&attr("minimum_tls_version")).unwrap(), "1.1");
        assert_eq!(state.get_string(&attr("location")).unwrap(), "westeurope");
        assert_eq!(state.get(&attr("default_primary_key")), Dynamic::Null);
    }

    #[tokio::test]
    async fn test_read_missing_namespace_removes_from_state() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _get = server
            .mock("GET", NS_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: object(&[("id", NS_PATH.into())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_update_failure_keeps_prior_state() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _put = server
            .mock("PUT", NS_PATH)
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":"BadRequest","message":"capacity not allowed"}}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let prior = object(&[("id", NS_PATH.into()), ("sku", "Standard".into())]);
        let planned = planned_state();
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: prior.clone(),
                    config: config_from(&planned),
                    planned_state: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("capacity not allowed"));
        assert_eq!(response.new_state, prior);
    }

    #[tokio::test]
    async fn test_delete_namespace() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let delete = server
            .mock("DELETE", NS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: object(&[("id", NS_PATH.into())]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_import_state() {
        let resource = ServiceBusNamespaceResource {
            provider_data: Some(create_test_provider_data("http://localhost")),
        };
        let response = resource
            .as_import_state()
            .unwrap()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: NS_PATH.to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        assert_eq!(
            response.imported_resources[0]
                .state
                .get_string(&attr("id"))
                .unwrap(),
            NS_PATH
        );
    }
}
