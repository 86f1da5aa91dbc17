use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, ResourceWithUpgradeState, UpdateResourceRequest,
    UpdateResourceResponse, UpgradeResourceStateRequest, UpgradeResourceStateResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::StringOneOfValidator;
use tracing::info;

use super::service::{non_empty, parent_attributes, parent_service_id};
use crate::api::apimanagement::{ApiVersionSet, ApiVersionSetProperties};
use crate::api::{ApiError, Client};
use crate::migration::{self, Upgrader};
use crate::parse::{ApiVersionSetId, ResourceId};
use crate::resources::common::{
    api_diagnostic, attr, create_failed, ensure_absent, import_by_id, not_configured, read_failed,
    read_response, required_string, state_id, store_provider_data, update_failed, StateWriter,
    WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_api_management_api_version_set";

const UPGRADERS: &[Upgrader] = &[migration::api_version_set_v0_to_v1];

const HEADER: &str = "Header";
const QUERY: &str = "Query";
const SEGMENT: &str = "Segment";

#[derive(Default)]
pub struct ApiManagementApiVersionSetResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ApiManagementApiVersionSetResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ApiManagementApiVersionSetResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let [service, group] = parent_attributes();

        let schema = SchemaBuilder::new()
            .version(1)
            .description("Manages a set of versions of an API")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::api_management_child_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(service)
            .attribute(group)
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("versioning_scheme", AttributeType::String)
                    .description("Where callers put the version: Header, Query or Segment")
                    .required()
                    .validator(StringOneOfValidator::create(&[HEADER, QUERY, SEGMENT]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version_header_name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version_query_name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: validate_scheme(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match version_set_id(client, &request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.api_management();
        if let Err(diag) = ensure_absent(api.get_api_version_set(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating API version set {}", id);
        if let Err(e) = api
            .create_or_update_api_version_set(&ctx, &id, &expand_version_set(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create API version set {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created API version set", &e));
        }

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return read_failed(request.current_state, request.private, not_configured());
        };

        let id = match state_id(&request.current_state, ApiVersionSetId::parse) {
            Ok(id) => id,
            Err(diag) => return read_failed(request.current_state, request.private, diag),
        };

        let mut state = request.current_state.clone();
        let result = refresh(&provider_data.client, &id, &mut state, WriteMode::Refresh)
            .await
            .map(|_| state);
        read_response(
            TYPE_NAME,
            &id.id(),
            result,
            request.current_state,
            request.private,
        )
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return update_failed(request.prior_state, not_configured());
        };
        let client = &provider_data.client;

        let id = match state_id(&request.prior_state, ApiVersionSetId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating API version set {}", id);
        if let Err(e) = client
            .api_management()
            .create_or_update_api_version_set(&ctx, &id, &expand_version_set(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(format!("Failed to update API version set {:?}", id.name), &e),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated API version set", &e));
        }

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(provider_data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return DeleteResourceResponse { diagnostics };
        };

        match state_id(&request.prior_state, ApiVersionSetId::parse) {
            Ok(id) => {
                info!("Deleting API version set {}", id);
                if let Err(e) = provider_data
                    .client
                    .api_management()
                    .delete_api_version_set(&ctx, &id)
                    .await
                {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete API version set {:?}", id.name),
                        &e,
                    ));
                }
            }
            Err(diag) => diagnostics.push(diag),
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_upgrade_state(&self) -> Option<&dyn ResourceWithUpgradeState> {
        Some(self)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ApiManagementApiVersionSetResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        ConfigureResourceResponse {
            diagnostics: store_provider_data(&mut self.provider_data, request.provider_data),
        }
    }
}

#[async_trait]
impl ResourceWithImportState for ApiManagementApiVersionSetResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, ApiVersionSetId::parse)
    }
}

#[async_trait]
impl ResourceWithUpgradeState for ApiManagementApiVersionSetResource {
    async fn upgrade_state(
        &self,
        _ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        migration::upgrade_resource_state(request, UPGRADERS)
    }
}

/// Each scheme names exactly the parameter it reads the version from
fn validate_scheme(config: &DynamicValue) -> Vec<Diagnostic> {
    let Some(scheme) = config.get(&attr("versioning_scheme")).as_str().map(str::to_string) else {
        return vec![];
    };

    let header = config.get(&attr("version_header_name"));
    let query = config.get(&attr("version_query_name"));
    let (header_wanted, query_wanted) = match scheme.as_str() {
        HEADER => (true, false),
        QUERY => (false, true),
        SEGMENT => (false, false),
        _ => return vec![],
    };

    let mut diagnostics = vec![];
    for (name, value, wanted) in [
        ("version_header_name", &header, header_wanted),
        ("version_query_name", &query, query_wanted),
    ] {
        if value.is_unknown() {
            continue;
        }
        if wanted && value.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    format!("Missing {}", name),
                    format!("`{}` must be set if `versioning_scheme` is `{}`", name, scheme),
                )
                .with_attribute(attr(name)),
            );
        } else if !wanted && !value.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    format!("Unexpected {}", name),
                    format!("`{}` can not be set if `versioning_scheme` is `{}`", name, scheme),
                )
                .with_attribute(attr(name)),
            );
        }
    }
    diagnostics
}

fn version_set_id(client: &Client, config: &DynamicValue) -> Result<ApiVersionSetId, Diagnostic> {
    let service = parent_service_id(client, config)?;
    Ok(ApiVersionSetId::new(
        &service.subscription_id,
        &service.resource_group,
        &service.name,
        &required_string(config, "name")?,
    ))
}

fn expand_version_set(config: &DynamicValue) -> ApiVersionSet {
    let text = |name: &str| config.get_optional_string(&attr(name));
    ApiVersionSet {
        properties: ApiVersionSetProperties {
            display_name: text("display_name").unwrap_or_default(),
            versioning_scheme: text("versioning_scheme").unwrap_or_default(),
            description: text("description"),
            version_header_name: text("version_header_name"),
            version_query_name: text("version_query_name"),
        },
    }
}

async fn refresh(
    client: &Client,
    id: &ApiVersionSetId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let remote = client.api_management().get_api_version_set(id).await?;
    let props = &remote.properties;

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("api_management_name", id.service_name.clone())
        .always("resource_group_name", id.resource_group.clone())
        .string("display_name", Some(props.display_name.as_str()))
        .string("versioning_scheme", Some(props.versioning_scheme.as_str()))
        .string("description", non_empty(props.description.as_deref()))
        .string(
            "version_header_name",
            non_empty(props.version_header_name.as_deref()),
        )
        .string(
            "version_query_name",
            non_empty(props.version_query_name.as_deref()),
        );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::mock_token;
    use crate::resources::test_helpers::{object, provider_data_any};
    use mockito::{Matcher, Server};
    use tfplug::types::{ClientCapabilities, Dynamic, RawState};

    const SERVICE_PATH: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim1";

    fn config(scheme: &str, header: Option<&str>, query: Option<&str>) -> DynamicValue {
        object(&[
            ("name", "orders".into()),
            ("api_management_name", "apim1".into()),
            ("resource_group_name", "rg".into()),
            ("display_name", "Orders".into()),
            ("versioning_scheme", scheme.into()),
            ("description", Dynamic::Null),
            ("version_header_name", header.into()),
            ("version_query_name", query.into()),
        ])
    }

    fn summaries(config: &DynamicValue) -> Vec<String> {
        validate_scheme(config)
            .into_iter()
            .map(|d| d.summary)
            .collect()
    }

    #[test]
    fn test_scheme_parameters() {
        assert!(summaries(&config(HEADER, Some("Api-Version"), None)).is_empty());
        assert!(summaries(&config(QUERY, None, Some("api-version"))).is_empty());
        assert!(summaries(&config(SEGMENT, None, None)).is_empty());

        assert_eq!(
            summaries(&config(HEADER, None, Some("v"))),
            vec!["Missing version_header_name", "Unexpected version_query_name"]
        );
        assert_eq!(
            summaries(&config(QUERY, None, None)),
            vec!["Missing version_query_name"]
        );
        assert_eq!(
            summaries(&config(SEGMENT, Some("Api-Version"), None)),
            vec!["Unexpected version_header_name"]
        );
    }

    #[test]
    fn test_unknown_parameter_is_not_judged() {
        let mut config = config(HEADER, None, None);
        config
            .set_value(&attr("version_header_name"), Dynamic::Unknown)
            .unwrap();
        assert!(validate_scheme(&config).is_empty());
    }

    #[tokio::test]
    async fn test_create_version_set() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = format!("{}/apiVersionSets/orders", SERVICE_PATH);

        let _absent = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"missing"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(serde_json::json!({
                "properties": {
                    "displayName": "Orders",
                    "versioningScheme": "Header",
                    "versionHeaderName": "Api-Version"
                }
            })))
            .with_body(r#"{"properties":{"displayName":"Orders","versioningScheme":"Header","versionHeaderName":"Api-Version"}}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_body(r#"{"properties":{"displayName":"Orders","versioningScheme":"Header","versionHeaderName":"Api-Version","description":""}}"#)
            .create_async()
            .await;

        let config = config(HEADER, Some("Api-Version"), None);
        let mut planned = config.clone();
        planned.set_value(&attr("id"), Dynamic::Unknown).unwrap();

        let mut resource = ApiManagementApiVersionSetResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data_any(&server.url()),
                },
            )
            .await;
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
        assert!(response.new_state.get(&attr("description")).is_null());
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_validate_through_resource() {
        let resource = ApiManagementApiVersionSetResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: config(QUERY, Some("Api-Version"), Some("v")),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_legacy_segment() {
        let resource = ApiManagementApiVersionSetResource::new();
        let legacy = format!(r#"{{"id":"{}/api-version-set/orders"}}"#, SERVICE_PATH);
        let response = resource
            .upgrade_state(
                Context::new(),
                UpgradeResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    version: 0,
                    raw_state: RawState {
                        json: Some(legacy.into_bytes()),
                        flatmap: Default::default(),
                    },
                },
            )
            .await;
        assert_eq!(
            response.upgraded_state.get_string(&attr("id")).unwrap(),
            format!("{}/apiVersionSets/orders", SERVICE_PATH)
        );
    }
}
