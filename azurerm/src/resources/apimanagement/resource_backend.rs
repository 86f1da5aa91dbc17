use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;
use tracing::info;

use super::service::{block_string, non_empty, parent_attributes, parent_service_id};
use crate::api::apimanagement::{
    Backend, BackendAuthorization, BackendCredentials, BackendProperties, BackendProxy, BackendTls,
};
use crate::api::{ApiError, Client};
use crate::parse::{BackendId, ResourceId};
use crate::resources::common::{
    api_diagnostic, attr, block_fields, create_failed, ensure_absent, import_by_id,
    not_configured, read_failed, read_response, required_string, state_id, store_provider_data,
    update_failed, StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_api_management_backend";

/// Separator for multiple values of one credential header or query parameter
const VALUE_SEPARATOR: char = ',';

#[derive(Default)]
pub struct ApiManagementBackendResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ApiManagementBackendResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ApiManagementBackendResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let [service, group] = parent_attributes();

        let authorization = NestedBlockBuilder::single_list("authorization")
            .attribute(AttributeBuilder::new("scheme", AttributeType::String).optional().build())
            .attribute(
                AttributeBuilder::new("parameter", AttributeType::String)
                    .optional()
                    .build(),
            )
            .max_items(1)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a backend that APIs forward requests to")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::api_management_backend_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(service)
            .attribute(group)
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .required()
                    .validator(StringOneOfValidator::create(&["http", "soap"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_id", AttributeType::String)
                    .description("Management URI of the backing Azure resource")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("title", AttributeType::String)
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("credentials")
                    .attribute(
                        AttributeBuilder::new(
                            "certificate",
                            AttributeType::list_of(AttributeType::String),
                        )
                        .description("Client certificate thumbprints")
                        .optional()
                        .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("header", AttributeType::map_of(AttributeType::String))
                            .description("Header values; several values are comma separated")
                            .optional()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("query", AttributeType::map_of(AttributeType::String))
                            .optional()
                            .build(),
                    )
                    .block(authorization)
                    .max_items(1)
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("proxy")
                    .attribute(AttributeBuilder::new("url", AttributeType::String).required().build())
                    .attribute(
                        AttributeBuilder::new("username", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("password", AttributeType::String)
                            .optional()
                            .sensitive()
                            .build(),
                    )
                    .max_items(1)
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("tls")
                    .attribute(
                        AttributeBuilder::new("validate_certificate_chain", AttributeType::Bool)
                            .optional()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("validate_certificate_name", AttributeType::Bool)
                            .optional()
                            .build(),
                    )
                    .max_items(1)
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
            diagnostics: validate_blocks(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match backend_id(client, &request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.api_management();
        if let Err(diag) = ensure_absent(api.get_backend(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating backend {}", id);
        if let Err(e) = api
            .create_or_update_backend(&ctx, &id, &expand_backend(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create backend {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created backend", &e));
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

        let id = match state_id(&request.current_state, BackendId::parse) {
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

        let id = match state_id(&request.prior_state, BackendId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating backend {}", id);
        if let Err(e) = client
            .api_management()
            .create_or_update_backend(&ctx, &id, &expand_backend(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(format!("Failed to update backend {:?}", id.name), &e),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated backend", &e));
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

        match state_id(&request.prior_state, BackendId::parse) {
            Ok(id) => {
                info!("Deleting backend {}", id);
                if let Err(e) = provider_data
                    .client
                    .api_management()
                    .delete_backend(&ctx, &id)
                    .await
                {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete backend {:?}", id.name),
                        &e,
                    ));
                }
            }
            Err(diag) => diagnostics.push(diag),
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ApiManagementBackendResource {
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
impl ResourceWithImportState for ApiManagementBackendResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, BackendId::parse)
    }
}

/// Blocks whose attributes are all optional still need one of them set
fn validate_blocks(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    let authorization = config
        .get_block(&attr("credentials"))
        .and_then(|c| c.get_block(&attr("authorization")));
    if let Some(authorization) = authorization {
        if authorization.get(&attr("scheme")).is_null()
            && authorization.get(&attr("parameter")).is_null()
        {
            diagnostics.push(
                Diagnostic::error(
                    "Empty authorization block",
                    "at least one of `scheme` or `parameter` must be set",
                )
                .with_attribute(
                    AttributePath::new("credentials")
                        .index(0)
                        .attribute("authorization"),
                ),
            );
        }
    }

    if let Some(tls) = config.get_block(&attr("tls")) {
        if tls.get(&attr("validate_certificate_chain")).is_null()
            && tls.get(&attr("validate_certificate_name")).is_null()
        {
            diagnostics.push(
                Diagnostic::error(
                    "Empty tls block",
                    "at least one of `validate_certificate_chain` or `validate_certificate_name` must be set",
                )
                .with_attribute(attr("tls")),
            );
        }
    }

    diagnostics
}

fn backend_id(client: &Client, config: &DynamicValue) -> Result<BackendId, Diagnostic> {
    let service = parent_service_id(client, config)?;
    Ok(BackendId::new(
        &service.subscription_id,
        &service.resource_group,
        &service.name,
        &required_string(config, "name")?,
    ))
}

fn split_values(values: HashMap<String, String>) -> HashMap<String, Vec<String>> {
    values
        .into_iter()
        .map(|(k, v)| {
            let parts = v.split(VALUE_SEPARATOR).map(str::to_string).collect();
            (k, parts)
        })
        .collect()
}

fn join_values(values: &HashMap<String, Vec<String>>) -> Dynamic {
    if values.is_empty() {
        return Dynamic::Null;
    }
    Dynamic::Map(
        values
            .iter()
            .map(|(k, v)| (k.clone(), Dynamic::String(v.join(","))))
            .collect(),
    )
}

fn expand_credentials(block: &DynamicValue) -> BackendCredentials {
    let authorization = block
        .get_block(&attr("authorization"))
        .map(|a| BackendAuthorization {
            scheme: block_string(Some(&a), "scheme").unwrap_or_default(),
            parameter: block_string(Some(&a), "parameter").unwrap_or_default(),
        });

    BackendCredentials {
        certificate: block.get_string_list(&attr("certificate")),
        header: split_values(block.get_string_map(&attr("header"))),
        query: split_values(block.get_string_map(&attr("query"))),
        authorization,
    }
}

fn expand_backend(config: &DynamicValue) -> Backend {
    let text = |name: &str| config.get_optional_string(&attr(name));

    let proxy = config.get_block(&attr("proxy")).map(|p| BackendProxy {
        url: block_string(Some(&p), "url").unwrap_or_default(),
        username: block_string(Some(&p), "username"),
        password: block_string(Some(&p), "password"),
    });
    let tls = config.get_block(&attr("tls")).map(|t| BackendTls {
        validate_certificate_chain: t.get_optional_bool(&attr("validate_certificate_chain")),
        validate_certificate_name: t.get_optional_bool(&attr("validate_certificate_name")),
    });

    Backend {
        properties: BackendProperties {
            protocol: text("protocol").unwrap_or_default(),
            url: text("url").unwrap_or_default(),
            description: text("description"),
            resource_id: text("resource_id"),
            title: text("title"),
            credentials: config
                .get_block(&attr("credentials"))
                .map(|c| expand_credentials(&c)),
            proxy,
            tls,
        },
    }
}

fn flatten_credentials(credentials: &BackendCredentials) -> HashMap<String, Dynamic> {
    let authorization = credentials.authorization.as_ref().map(|a| {
        Dynamic::Map(block_fields([
            ("scheme", non_empty(Some(a.scheme.as_str())).into()),
            ("parameter", non_empty(Some(a.parameter.as_str())).into()),
        ]))
    });
    let certificate = if credentials.certificate.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::List(
            credentials
                .certificate
                .iter()
                .cloned()
                .map(Dynamic::String)
                .collect(),
        )
    };

    block_fields([
        ("certificate", certificate),
        ("header", join_values(&credentials.header)),
        ("query", join_values(&credentials.query)),
        (
            "authorization",
            Dynamic::List(authorization.into_iter().collect()),
        ),
    ])
}

async fn refresh(
    client: &Client,
    id: &BackendId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let remote = client.api_management().get_backend(id).await?;
    let props = &remote.properties;

    // The password comes back masked, so the applied one is kept
    let known_password = state
        .get_block(&attr("proxy"))
        .and_then(|p| p.get_optional_string(&attr("password")));
    let proxy = props.proxy.as_ref().map(|p| {
        block_fields([
            ("url", p.url.clone().into()),
            ("username", p.username.clone().into()),
            ("password", known_password.clone().into()),
        ])
    });
    let tls = props.tls.as_ref().map(|t| {
        block_fields([
            ("validate_certificate_chain", t.validate_certificate_chain.into()),
            ("validate_certificate_name", t.validate_certificate_name.into()),
        ])
    });

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("api_management_name", id.service_name.clone())
        .always("resource_group_name", id.resource_group.clone())
        .string("protocol", Some(props.protocol.as_str()))
        .string("url", Some(props.url.as_str()))
        .string("description", non_empty(props.description.as_deref()))
        .string("resource_id", non_empty(props.resource_id.as_deref()))
        .string("title", non_empty(props.title.as_deref()))
        .block(
            "credentials",
            props.credentials.as_ref().map(flatten_credentials),
        )
        .block("proxy", proxy)
        .block("tls", tls);

    Ok(())
}

#[cfg(test)]
#[path = "./resource_backend_test.rs"]
mod resource_backend_test;
