//! Service Bus namespace data source

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};

use crate::parse::{NamespaceId, ResourceId};
use crate::resources::common::{
    data_source_failed, data_source_response, not_configured, required_string,
    store_provider_data, WriteMode,
};
use crate::resources::servicebus::resource_namespace;
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_servicebus_namespace";

#[derive(Default)]
pub struct ServiceBusNamespaceDataSource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusNamespaceDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn computed(name: &str, type_: AttributeType) -> Attribute {
    AttributeBuilder::new(name, type_).computed().build()
}

fn computed_secret(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .computed()
        .sensitive()
        .build()
}

#[async_trait]
impl DataSource for ServiceBusNamespaceDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Gets an existing Service Bus namespace and its default keys")
            .attribute(computed("id", AttributeType::String))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::namespace_name())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group_name", AttributeType::String)
                    .required()
                    .validator(attribute::resource_group_name())
                    .build(),
            )
            .attribute(computed("location", AttributeType::String))
            .attribute(computed("sku", AttributeType::String))
            .attribute(computed("capacity", AttributeType::Number))
            .attribute(computed("premium_messaging_partitions", AttributeType::Number))
            .attribute(computed("local_auth_enabled", AttributeType::Bool))
            .attribute(computed("public_network_access_enabled", AttributeType::Bool))
            .attribute(computed("minimum_tls_version", AttributeType::String))
            .attribute(computed("zone_redundant", AttributeType::Bool))
            .attribute(computed("tags", AttributeType::map_of(AttributeType::String)))
            .attribute(computed("endpoint", AttributeType::String))
            .attribute(computed_secret("default_primary_connection_string"))
            .attribute(computed_secret("default_secondary_connection_string"))
            .attribute(computed_secret("default_primary_key"))
            .attribute(computed_secret("default_secondary_key"))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return data_source_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match (
            required_string(&request.config, "resource_group_name"),
            required_string(&request.config, "name"),
        ) {
            (Ok(group), Ok(name)) => NamespaceId::new(client.subscription_id(), &group, &name),
            (Err(diag), _) | (_, Err(diag)) => return data_source_failed(diag),
        };

        tracing::debug!("Reading Service Bus namespace {}", id);
        let mut state = request.config;
        let result = resource_namespace::refresh(client, &id, &mut state, WriteMode::Refresh)
            .await
            .map(|_| state);
        data_source_response(TYPE_NAME, &id.id(), result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ServiceBusNamespaceDataSource {
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
    use crate::resources::common::attr;
    use crate::resources::test_helpers::{object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::types::{ClientCapabilities, Dynamic};

    const NAMESPACE_PATH: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/sb-orders";

    async fn configured(server_url: &str) -> ServiceBusNamespaceDataSource {
        let mut data_source = ServiceBusNamespaceDataSource::new();
        data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: provider_data_any(server_url),
                },
            )
            .await;
        data_source
    }

    fn request() -> ReadDataSourceRequest {
        ReadDataSourceRequest {
            type_name: TYPE_NAME.to_string(),
            config: object(&[
                ("name", "sb-orders".into()),
                ("resource_group_name", "rg".into()),
                ("location", Dynamic::Null),
            ]),
            provider_meta: None,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[tokio::test]
    async fn test_read_namespace_with_default_keys() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _namespace = server
            .mock("GET", NAMESPACE_PATH)
            .match_query(Matcher::Any)
            .with_body(
                r#"{"location":"westeurope","sku":{"name":"Standard","tier":"Standard"},
                "properties":{"serviceBusEndpoint":"https://sb-orders.servicebus.windows.net:443/","minimumTlsVersion":"1.2"}}"#,
            )
            .create_async()
            .await;
        let _keys = server
            .mock(
                "POST",
                format!("{}/authorizationRules/RootManageSharedAccessKey/listKeys", NAMESPACE_PATH)
                    .as_str(),
            )
            .match_query(Matcher::Any)
            .with_body(r#"{"primaryKey":"pk","secondaryKey":"sk","primaryConnectionString":"Endpoint=sb://sb-orders/;SharedAccessKey=pk"}"#)
            .create_async()
            .await;

        let data_source = configured(&server.url()).await;
        let response = data_source.read(Context::new(), request()).await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.state;
        assert_eq!(state.get_string(&attr("id")).unwrap(), NAMESPACE_PATH);
        assert_eq!(state.get_string(&attr("location")).unwrap(), "westeurope");
        assert_eq!(state.get_string(&attr("sku")).unwrap(), "Standard");
        assert_eq!(state.get_string(&attr("default_primary_key")).unwrap(), "pk");
        assert!(state.get(&attr("tags")).is_null());
    }

    #[tokio::test]
    async fn test_missing_namespace_is_an_error() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _namespace = server
            .mock("GET", NAMESPACE_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"missing"}}"#)
            .create_async()
            .await;

        let data_source = configured(&server.url()).await;
        let response = data_source.read(Context::new(), request()).await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].summary,
            "azurerm_servicebus_namespace not found"
        );
    }

    #[tokio::test]
    async fn test_read_without_provider_data() {
        let data_source = ServiceBusNamespaceDataSource::new();
        let response = data_source.read(Context::new(), request()).await;
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }
}
