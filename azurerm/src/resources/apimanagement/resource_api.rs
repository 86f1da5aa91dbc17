//! API Management API resource
//!
//! Each resource manages one revision of an API; the ID carries it as
//! `{name};rev={revision}`.

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;
use tracing::info;

use super::service::{block_string, non_empty, parent_attributes, parent_service_id};
use crate::api::apimanagement::{
    Api, ApiContact, ApiLicense, ApiProperties, SubscriptionKeyParameterNames,
};
use crate::api::{ApiError, Client};
use crate::migration::{self, Upgrader};
use crate::parse::{ApiId, ApiVersionSetId, ResourceId};
use crate::resources::common::{
    api_diagnostic, attr, block_fields, create_failed, ensure_absent, id_for_state, import_by_id,
    not_configured, read_failed, read_response, required_string, state_id, store_provider_data,
    update_failed, StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_api_management_api";

const UPGRADERS: &[Upgrader] = &[migration::api_v0_to_v1];

const API_TYPES: [&str; 4] = ["graphql", "http", "soap", "websocket"];
const DEFAULT_API_TYPE: &str = "http";

/// Names every API gets unless configured otherwise
const DEFAULT_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const DEFAULT_KEY_QUERY: &str = "subscription-key";

#[derive(Default)]
pub struct ApiManagementApiResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ApiManagementApiResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ApiManagementApiResource {
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
            .description("Manages one revision of an API within an API Management service")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::api_management_api_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(service)
            .attribute(group)
            .attribute(
                AttributeBuilder::new("revision", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("path", AttributeType::String)
                    .description("URL suffix appended to the gateway URL")
                    .optional()
                    .computed()
                    .validator(attribute::api_management_api_path())
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocols", AttributeType::set_of(AttributeType::String))
                    .description("Any of http, https, ws and wss")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("service_url", AttributeType::String)
                    .description("Backend URL the API forwards to")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_type", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::create(&API_TYPES))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("revision_description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version", AttributeType::String)
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version_set_id", AttributeType::String)
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version_description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subscription_required", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_api_id", AttributeType::String)
                    .description("API to copy when creating a new revision or version")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("terms_of_service_url", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_current", AttributeType::Bool)
                    .description("Whether this revision is the one served to callers")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_online", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("subscription_key_parameter_names")
                    .attribute(
                        AttributeBuilder::new("header", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("query", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .max_items(1)
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("contact")
                    .attribute(AttributeBuilder::new("name", AttributeType::String).optional().build())
                    .attribute(AttributeBuilder::new("email", AttributeType::String).optional().build())
                    .attribute(AttributeBuilder::new("url", AttributeType::String).optional().build())
                    .max_items(1)
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("license")
                    .attribute(AttributeBuilder::new("name", AttributeType::String).optional().build())
                    .attribute(AttributeBuilder::new("url", AttributeType::String).optional().build())
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
            diagnostics: validate_api(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;
        let config = &request.config;

        let id = match api_id(client, config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.api_management();
        if let Err(diag) = ensure_absent(api.get_api(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating API Management API {}", id);
        let body = Api {
            properties: expand_api(config, ApiProperties::default()),
        };
        if let Err(e) = api.create_or_update_api(&ctx, &id, &body).await {
            return create_failed(api_diagnostic(
                format!("Failed to create API Management API {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created API", &e));
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

        let id = match state_id(&request.current_state, ApiId::parse) {
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

        let id = match state_id(&request.prior_state, ApiId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        let api = client.api_management();
        let existing = match api.get_api(&id).await {
            Ok(existing) => existing,
            Err(e) => {
                return update_failed(
                    request.prior_state,
                    api_diagnostic(format!("Failed to read API Management API {:?}", id.name), &e),
                )
            }
        };

        info!("Updating API Management API {}", id);
        let body = Api {
            properties: expand_api(&request.config, existing.properties),
        };
        if let Err(e) = api.create_or_update_api(&ctx, &id, &body).await {
            return update_failed(
                request.prior_state,
                api_diagnostic(format!("Failed to update API Management API {:?}", id.name), &e),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated API", &e));
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

        let id = match state_id(&request.prior_state, ApiId::parse) {
            Ok(id) => id,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        // The current revision can only go together with the whole API
        let is_current = request
            .prior_state
            .get_optional_bool(&attr("is_current"))
            .unwrap_or(false);
        let (target, delete_revisions) = if is_current {
            let bare = ApiId::new(
                &id.subscription_id,
                &id.resource_group,
                &id.service_name,
                id.api_name(),
            );
            (bare, true)
        } else {
            (id.clone(), false)
        };

        info!("Deleting API Management API {}", target);
        if let Err(e) = provider_data
            .client
            .api_management()
            .delete_api(&ctx, &target, delete_revisions)
            .await
        {
            diagnostics.push(api_diagnostic(
                format!("Failed to delete API Management API {:?}", id.name),
                &e,
            ));
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
impl ResourceWithConfigure for ApiManagementApiResource {
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
impl ResourceWithImportState for ApiManagementApiResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        if ApiId::parse(&request.id).is_ok_and(|id| id.revision().is_none()) {
            return ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Invalid import ID",
                    format!(
                        "{:?} does not name a revision; append `;rev=<revision>` to the API name",
                        request.id
                    ),
                )],
            };
        }
        import_by_id(&ctx, request, ApiId::parse)
    }
}

#[async_trait]
impl ResourceWithUpgradeState for ApiManagementApiResource {
    async fn upgrade_state(
        &self,
        _ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        migration::upgrade_resource_state(request, UPGRADERS)
    }
}

fn validate_api(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    let version = config.get(&attr("version"));
    if version.as_str().is_some_and(|v| !v.is_empty())
        && config.get(&attr("version_set_id")).is_null()
    {
        diagnostics.push(
            Diagnostic::error(
                "Missing version_set_id",
                "setting `version` without the required `version_set_id`",
            )
            .with_attribute(attr("version")),
        );
    }

    let source = config.get(&attr("source_api_id"));
    if source.is_null() {
        let display_name = config.get(&attr("display_name"));
        let protocols = config.get(&attr("protocols"));
        let no_protocols = protocols.is_null() || protocols.as_list().is_some_and(|p| p.is_empty());
        if display_name.is_null() || no_protocols {
            diagnostics.push(Diagnostic::error(
                "Missing display_name or protocols",
                "`display_name`, `protocols` are required when `source_api_id` is not set",
            ));
        }
    } else if let Some(source) = source.as_str() {
        if let Err(e) = ApiId::parse(source) {
            diagnostics.push(
                Diagnostic::error("Invalid source_api_id", e.to_string())
                    .with_attribute(attr("source_api_id")),
            );
        }
    }

    if let Some(version_set) = config.get_optional_string(&attr("version_set_id")) {
        if let Err(e) = ApiVersionSetId::parse(&version_set) {
            diagnostics.push(
                Diagnostic::error("Invalid version_set_id", e.to_string())
                    .with_attribute(attr("version_set_id")),
            );
        }
    }

    diagnostics
}

fn api_id(client: &Client, config: &DynamicValue) -> Result<ApiId, Diagnostic> {
    let service = parent_service_id(client, config)?;
    Ok(ApiId::with_revision(
        &service.subscription_id,
        &service.resource_group,
        &service.name,
        &required_string(config, "name")?,
        &required_string(config, "revision")?,
    ))
}

/// Sets a property the user may also remove; removal is sent as an empty string
fn overlay_clearable(target: &mut Option<String>, configured: Option<String>) {
    match configured {
        Some(value) => *target = Some(value),
        None if target.is_some() => *target = Some(String::new()),
        None => {}
    }
}

/// Sets an optional+computed property only when configured
fn overlay(target: &mut Option<String>, configured: Option<String>) {
    if configured.is_some() {
        *target = configured;
    }
}

/// Layers the configuration over `base`, which is empty on create and the
/// remote API on update
fn expand_api(config: &DynamicValue, mut base: ApiProperties) -> ApiProperties {
    let text = |name: &str| config.get_optional_string(&attr(name));

    // `api_revision` is addressed through the ID; sending it back is rejected
    base.api_revision = None;
    base.is_current = None;
    base.is_online = None;

    overlay(&mut base.path, text("path"));
    overlay(&mut base.display_name, text("display_name"));
    overlay(&mut base.service_url, text("service_url"));
    overlay(&mut base.api_version, text("version"));
    overlay(&mut base.api_version_set_id, text("version_set_id"));
    overlay(&mut base.source_api_id, text("source_api_id"));
    overlay_clearable(&mut base.description, text("description"));
    overlay_clearable(&mut base.api_revision_description, text("revision_description"));
    overlay_clearable(&mut base.api_version_description, text("version_description"));
    overlay_clearable(&mut base.terms_of_service_url, text("terms_of_service_url"));

    base.api_type = text("api_type")
        .or(base.api_type)
        .or_else(|| Some(DEFAULT_API_TYPE.to_string()));

    let protocols = config.get_string_list(&attr("protocols"));
    if !protocols.is_empty() {
        base.protocols = Some(protocols);
    }

    if let Some(required) = config.get_optional_bool(&attr("subscription_required")) {
        base.subscription_required = Some(required);
    }

    let key_names = config.get_block(&attr("subscription_key_parameter_names"));
    if key_names.is_some() {
        base.subscription_key_parameter_names = Some(SubscriptionKeyParameterNames {
            header: block_string(key_names.as_ref(), "header").unwrap_or_default(),
            query: block_string(key_names.as_ref(), "query").unwrap_or_default(),
        });
    }

    let contact = config.get_block(&attr("contact"));
    base.contact = contact.as_ref().map(|c| ApiContact {
        name: block_string(Some(c), "name"),
        email: block_string(Some(c), "email"),
        url: block_string(Some(c), "url"),
    });

    let license = config.get_block(&attr("license"));
    base.license = license.as_ref().map(|l| ApiLicense {
        name: block_string(Some(l), "name"),
        url: block_string(Some(l), "url"),
    });

    base
}

/// Key parameter names for state; the service defaults only show up when
/// the block was configured
fn key_names_for_state(
    names: Option<&SubscriptionKeyParameterNames>,
    configured: bool,
) -> Option<HashMap<String, Dynamic>> {
    let names = names?;
    let is_default = names.header == DEFAULT_KEY_HEADER && names.query == DEFAULT_KEY_QUERY;
    if is_default && !configured {
        return None;
    }
    Some(block_fields([
        ("header", names.header.clone().into()),
        ("query", names.query.clone().into()),
    ]))
}

async fn refresh(
    client: &Client,
    id: &ApiId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let remote = client.api_management().get_api(id).await?;
    let props = &remote.properties;

    let key_names_configured = state
        .get_block(&attr("subscription_key_parameter_names"))
        .is_some()
        || state
            .get(&attr("subscription_key_parameter_names"))
            .is_unknown();
    let key_names = key_names_for_state(
        props.subscription_key_parameter_names.as_ref(),
        key_names_configured,
    );
    let contact = props.contact.as_ref().map(|c| {
        block_fields([
            ("name", c.name.clone().into()),
            ("email", c.email.clone().into()),
            ("url", c.url.clone().into()),
        ])
    });
    let license = props.license.as_ref().map(|l| {
        block_fields([("name", l.name.clone().into()), ("url", l.url.clone().into())])
    });
    let version_set_id = id_for_state(
        state.get_optional_string(&attr("version_set_id")),
        non_empty(props.api_version_set_id.as_deref()).map(str::to_string),
    );

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.api_name().to_string())
        .always("api_management_name", id.service_name.clone())
        .always("resource_group_name", id.resource_group.clone())
        .string(
            "revision",
            props.api_revision.as_deref().or(id.revision()),
        )
        .string("display_name", props.display_name.as_deref())
        .string("path", props.path.as_deref())
        .strings("protocols", props.protocols.as_deref().unwrap_or_default())
        .string("service_url", non_empty(props.service_url.as_deref()))
        .string(
            "api_type",
            Some(non_empty(props.api_type.as_deref()).unwrap_or(DEFAULT_API_TYPE)),
        )
        .string("description", non_empty(props.description.as_deref()))
        .string(
            "revision_description",
            non_empty(props.api_revision_description.as_deref()),
        )
        .string("version", non_empty(props.api_version.as_deref()))
        .string("version_set_id", version_set_id.as_deref())
        .string(
            "version_description",
            non_empty(props.api_version_description.as_deref()),
        )
        .bool(
            "subscription_required",
            Some(props.subscription_required.unwrap_or(true)),
        )
        .string(
            "terms_of_service_url",
            non_empty(props.terms_of_service_url.as_deref()),
        )
        .bool("is_current", Some(props.is_current.unwrap_or(false)))
        .bool("is_online", Some(props.is_online.unwrap_or(false)))
        .block("subscription_key_parameter_names", key_names)
        .block("contact", contact)
        .block("license", license);

    Ok(())
}

#[cfg(test)]
#[path = "./resource_api_test.rs"]
mod resource_api_test;
