#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::mock_token;
    use crate::resources::test_helpers::{block, object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::types::{ClientCapabilities, Dynamic};

    const NAMED_VALUE_PATH: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim1/namedValues/backend-key";
    const SECRET_ID: &str = "https://vault1.vault.azure.net/secrets/backend-key";

    fn config(value: Option<&str>, key_vault: bool, secret: bool) -> DynamicValue {
        let key_vault = if key_vault {
            block(&[
                ("secret_id", SECRET_ID.into()),
                ("identity_client_id", Dynamic::Null),
            ])
        } else {
            Dynamic::List(vec![])
        };
        object(&[
            ("name", "backend-key".into()),
            ("api_management_name", "apim1".into()),
            ("resource_group_name", "rg".into()),
            ("display_name", "BackendKey".into()),
            ("value", value.into()),
            ("secret", secret.into()),
            ("tags", Dynamic::List(vec!["backend".into()])),
            ("value_from_key_vault", key_vault),
        ])
    }

    async fn configured(server_url: &str) -> ApiManagementNamedValueResource {
        let mut resource = ApiManagementNamedValueResource::new();
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

    #[test]
    fn test_exactly_one_source() {
        assert!(validate_source(&config(Some("s3cr3t"), false, false)).is_empty());
        assert!(validate_source(&config(None, true, true)).is_empty());

        let both = validate_source(&config(Some("s3cr3t"), true, true));
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].summary, "Invalid named value source");

        let neither = validate_source(&config(None, false, false));
        assert_eq!(neither.len(), 1);
    }

    #[test]
    fn test_key_vault_requires_secret() {
        let diagnostics = validate_source(&config(None, true, false));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid secret");
    }

    #[test]
    fn test_expand_key_vault_reference() {
        let props = expand_named_value(&config(None, true, true)).properties;
        assert!(props.value.is_none());
        assert_eq!(props.secret, Some(true));
        assert_eq!(props.tags, Some(vec!["backend".to_string()]));
        let key_vault = props.key_vault.unwrap();
        assert_eq!(key_vault.secret_identifier.as_deref(), Some(SECRET_ID));
        assert!(key_vault.identity_client_id.is_none());
    }

    #[tokio::test]
    async fn test_create_secret_value() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;

        let _absent = server
            .mock("GET", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"missing"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"displayName": "BackendKey", "value": "s3cr3t", "secret": true}
            })))
            .with_status(202)
            .with_header("location", &format!("{}/operations/1", server.url()))
            .create_async()
            .await;
        let _operation = server
            .mock("GET", "/operations/1")
            .with_status(200)
            .create_async()
            .await;
        let _get = server
            .mock("GET", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"displayName":"BackendKey","secret":true,"tags":["backend"]}}"#)
            .create_async()
            .await;

        let config = config(Some("s3cr3t"), false, true);
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
        assert_eq!(
            response.new_state.get_string(&attr("value")).unwrap(),
            "s3cr3t"
        );
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_keeps_secret_value_from_state() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _get = server
            .mock("GET", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"displayName":"Renamed","secret":true}}"#)
            .create_async()
            .await;

        let mut current = config(Some("s3cr3t"), false, true);
        current
            .set_string(&attr("id"), NAMED_VALUE_PATH.to_string())
            .unwrap();

        let resource = configured(&server.url()).await;
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

        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&attr("value")).unwrap(), "s3cr3t");
        assert_eq!(state.get_string(&attr("display_name")).unwrap(), "Renamed");
        assert!(state.get(&attr("tags")).is_null());
    }

    #[tokio::test]
    async fn test_read_plain_value_and_key_vault_block() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _get = server
            .mock("GET", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .with_body(format!(
                r#"{{"properties":{{"displayName":"BackendKey","secret":false,"value":"plain","keyVault":{{"secretIdentifier":"{}"}}}}}}"#,
                SECRET_ID
            ))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: object(&[("id", NAMED_VALUE_PATH.into())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&attr("value")).unwrap(), "plain");
        let key_vault = state.get_blocks(&attr("value_from_key_vault"));
        assert_eq!(key_vault.len(), 1);
        assert_eq!(key_vault[0].get_string(&attr("secret_id")).unwrap(), SECRET_ID);
        assert!(key_vault[0].get(&attr("identity_client_id")).is_null());
    }
}
