//! Service Bus namespace authorization rule data source

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::parse::{NamespaceAuthorizationRuleId, NamespaceId, ResourceId};
use crate::resources::common::{
    attr, config_id, data_source_failed, data_source_response, not_configured, required_string,
    store_provider_data, WriteMode,
};
use crate::resources::ServiceBusNamespaceAuthorizationRuleResource;
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_servicebus_namespace_authorization_rule";

#[derive(Default)]
pub struct ServiceBusNamespaceAuthorizationRuleDataSource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusNamespaceAuthorizationRuleDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn rule_id(config: &DynamicValue) -> Result<NamespaceAuthorizationRuleId, Diagnostic> {
    let namespace = config_id(config, "namespace_id", NamespaceId::parse)?;
    Ok(NamespaceAuthorizationRuleId::new(
        &namespace.subscription_id,
        &namespace.resource_group,
        &namespace.name,
        &required_string(config, "name")?,
    ))
}

#[async_trait]
impl DataSource for ServiceBusNamespaceAuthorizationRuleDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Gets the rights and keys of a namespace authorization rule")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::authorization_rule_name())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("namespace_id", AttributeType::String)
                    .description("The ARM ID of the namespace")
                    .required()
                    .build(),
            );

        for right in ["listen", "send", "manage"] {
            builder = builder.attribute(
                AttributeBuilder::new(right, AttributeType::Bool)
                    .computed()
                    .build(),
            );
        }
        for secret in [
            "primary_key",
            "secondary_key",
            "primary_connection_string",
            "secondary_connection_string",
            "primary_connection_string_alias",
            "secondary_connection_string_alias",
        ] {
            builder = builder.attribute(
                AttributeBuilder::new(secret, AttributeType::String)
                    .computed()
                    .sensitive()
                    .build(),
            );
        }

        DataSourceSchemaResponse {
            schema: builder.build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        let mut diagnostics = vec![];
        if let Some(namespace) = request.config.get_optional_string(&attr("namespace_id")) {
            if let Err(e) = NamespaceId::parse(&namespace) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid namespace_id",
                        format!("parsing {:?}: {}", namespace, e),
                    )
                    .with_attribute(attr("namespace_id")),
                );
            }
        }
        ValidateDataSourceConfigResponse { diagnostics }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return data_source_failed(not_configured());
        };

        let id = match rule_id(&request.config) {
            Ok(id) => id,
            Err(diag) => return data_source_failed(diag),
        };

        tracing::debug!("Reading namespace authorization rule {}", id);
        let mut state = request.config;
        let result = ServiceBusNamespaceAuthorizationRuleResource::refresh(
            &provider_data.client,
            &id,
            &mut state,
            WriteMode::Refresh,
        )
        .await
        .map(|_| state);
        data_source_response(TYPE_NAME, &id.id(), result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ServiceBusNamespaceAuthorizationRuleDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        ConfigureDataSourceResponse {
            diagnostics: store_provider_data(&mut self.provider_data, request.provider_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::mock_token;
    use crate::resources::test_helpers::{object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::types::ClientCapabilities;

    const NAMESPACE_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/sb-orders";

    fn rule_path() -> String {
        format!("{}/authorizationRules/reader", NAMESPACE_ID)
    }

    #[tokio::test]
    async fn test_read_rule_rights_and_keys() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _rule = server
            .mock("GET", rule_path().as_str())
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"rights":["Listen"]}}"#)
            .create_async()
            .await;
        let _keys = server
            .mock("POST", format!("{}/listKeys", rule_path()).as_str())
            .match_query(Matcher::Any)
            .with_body(r#"{"primaryKey":"pk","secondaryKey":"sk","primaryConnectionString":"Endpoint=sb://sb-orders/;SharedAccessKeyName=reader"}"#)
            .create_async()
            .await;

        let mut data_source = ServiceBusNamespaceAuthorizationRuleDataSource::new();
        data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: provider_data_any(&server.url()),
                },
            )
            .await;

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: object(&[
                        ("name", "reader".into()),
                        ("namespace_id", NAMESPACE_ID.into()),
                    ]),
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.state;
        assert_eq!(state.get_string(&attr("id")).unwrap(), rule_path());
        assert!(state.get_bool(&attr("listen")).unwrap());
        assert!(!state.get_bool(&attr("manage")).unwrap());
        assert_eq!(state.get_string(&attr("secondary_key")).unwrap(), "sk");
        assert!(state.get(&attr("primary_connection_string_alias")).is_null());
    }

    #[tokio::test]
    async fn test_validate_namespace_id() {
        let data_source = ServiceBusNamespaceAuthorizationRuleDataSource::new();
        let response = data_source
            .validate(
                Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: object(&[
                        ("name", "reader".into()),
                        ("namespace_id", "sb-orders".into()),
                    ]),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid namespace_id");
    }
}
