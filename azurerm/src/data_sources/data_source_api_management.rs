//! API Management service data source

use async_trait::async_trait;
use std::collections::BTreeMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};

use crate::parse::{ApiManagementId, ResourceId};
use crate::resources::apimanagement::resource_api_management;
use crate::resources::common::{
    data_source_failed, data_source_response, not_configured, required_string,
    store_provider_data, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_api_management";

const COMPUTED_STRINGS: &[&str] = &[
    "location",
    "publisher_name",
    "publisher_email",
    "sku_name",
    "virtual_network_type",
    "min_api_version",
    "notification_sender_email",
    "gateway_url",
    "management_api_url",
    "portal_url",
    "developer_portal_url",
    "scm_url",
];

#[derive(Default)]
pub struct ApiManagementDataSource {
    provider_data: Option<AzureRmProviderData>,
}

impl ApiManagementDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ApiManagementDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let strings = AttributeType::list_of(AttributeType::String);
        let subnet = AttributeType::Object(BTreeMap::from([(
            "subnet_id".to_string(),
            AttributeType::String,
        )]));

        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Gets an existing API Management service")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::api_management_service_name())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group_name", AttributeType::String)
                    .required()
                    .validator(attribute::resource_group_name())
                    .build(),
            );

        for name in COMPUTED_STRINGS {
            builder = builder.attribute(
                AttributeBuilder::new(name, AttributeType::String)
                    .computed()
                    .build(),
            );
        }

        let schema = builder
            .attribute(
                AttributeBuilder::new(
                    "virtual_network_configuration",
                    AttributeType::list_of(subnet),
                )
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("public_network_access_enabled", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("client_certificate_enabled", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zones", strings.clone())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_ip_addresses", strings.clone())
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_ip_addresses", strings)
                    .computed()
                    .build(),
            )
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
            (Ok(group), Ok(name)) => ApiManagementId::new(client.subscription_id(), &group, &name),
            (Err(diag), _) | (_, Err(diag)) => return data_source_failed(diag),
        };

        tracing::debug!("Reading API Management service {}", id);
        let mut state = request.config;
        let result = resource_api_management::refresh(client, &id, &mut state, WriteMode::Refresh)
            .await
            .map(|_| state);
        data_source_response(TYPE_NAME, &id.id(), result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for ApiManagementDataSource {
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
    use tfplug::types::ClientCapabilities;

    const SERVICE_PATH: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim1";

    #[tokio::test]
    async fn test_read_service_urls() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _service = server
            .mock("GET", SERVICE_PATH)
            .match_query(Matcher::Any)
            .with_body(
                r#"{"location":"West Europe","sku":{"name":"Developer","capacity":1},
                "properties":{"publisherName":"Contoso","publisherEmail":"api@contoso.com",
                "gatewayUrl":"https://apim1.azure-api.net","publicIPAddresses":["20.1.2.3"],
                "virtualNetworkType":"External",
                "virtualNetworkConfiguration":{"subnetResourceId":"/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/apim"}}}"#,
            )
            .create_async()
            .await;

        let mut data_source = ApiManagementDataSource::new();
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
                    config: object(&[("name", "apim1".into()), ("resource_group_name", "rg".into())]),
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.state;
        assert_eq!(state.get_string(&attr("id")).unwrap(), SERVICE_PATH);
        assert_eq!(state.get_string(&attr("sku_name")).unwrap(), "Developer_1");
        assert_eq!(state.get_string(&attr("location")).unwrap(), "westeurope");
        assert_eq!(
            state.get_string(&attr("gateway_url")).unwrap(),
            "https://apim1.azure-api.net"
        );
        assert_eq!(
            state.get_string_list(&attr("public_ip_addresses")),
            vec!["20.1.2.3".to_string()]
        );
        assert_eq!(state.get_blocks(&attr("virtual_network_configuration")).len(), 1);
        assert!(state.get(&attr("private_ip_addresses")).is_null());
    }
}
