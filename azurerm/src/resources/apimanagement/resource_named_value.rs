//! API Management named value resource
//!
//! A named value holds either a literal value or a reference to a Key Vault
//! secret. Secret values are write-only: the service never returns them, so
//! the value in state is whatever was last applied.

use async_trait::async_trait;
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
use tfplug::types::{Diagnostic, DynamicValue};
use tracing::info;

use super::service::{block_string, non_empty, parent_attributes, parent_service_id};
use crate::api::apimanagement::{KeyVaultContract, NamedValue, NamedValueProperties};
use crate::api::{ApiError, Client};
use crate::migration::{self, Upgrader};
use crate::parse::{NamedValueId, ResourceId};
use crate::resources::common::{
    api_diagnostic, attr, block_fields, create_failed, ensure_absent, import_by_id,
    not_configured, read_failed, read_response, required_string, state_id, store_provider_data,
    update_failed, StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_api_management_named_value";

const UPGRADERS: &[Upgrader] = &[migration::named_value_v0_to_v1];

#[derive(Default)]
pub struct ApiManagementNamedValueResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ApiManagementNamedValueResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ApiManagementNamedValueResource {
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
            .description("Manages a named value used by API Management policies")
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
                    .description("Name policies refer to the value by")
                    .required()
                    .validator(attribute::named_value_display_name())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("value", AttributeType::String)
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::list_of(AttributeType::String))
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("value_from_key_vault")
                    .description("Key Vault secret the value is resolved from")
                    .attribute(
                        AttributeBuilder::new("secret_id", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("identity_client_id", AttributeType::String)
                            .description("Client ID of the user-assigned identity used to read the secret")
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
            diagnostics: validate_source(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match named_value_id(client, &request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.api_management();
        if let Err(diag) = ensure_absent(api.get_named_value(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating named value {}", id);
        if let Err(e) = api
            .create_or_update_named_value(&ctx, &id, &expand_named_value(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create named value {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created named value", &e));
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

        let id = match state_id(&request.current_state, NamedValueId::parse) {
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

        let id = match state_id(&request.prior_state, NamedValueId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating named value {}", id);
        if let Err(e) = client
            .api_management()
            .create_or_update_named_value(&ctx, &id, &expand_named_value(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(format!("Failed to update named value {:?}", id.name), &e),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated named value", &e));
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

        match state_id(&request.prior_state, NamedValueId::parse) {
            Ok(id) => {
                info!("Deleting named value {}", id);
                if let Err(e) = provider_data
                    .client
                    .api_management()
                    .delete_named_value(&ctx, &id)
                    .await
                {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete named value {:?}", id.name),
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
impl ResourceWithConfigure for ApiManagementNamedValueResource {
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
impl ResourceWithImportState for ApiManagementNamedValueResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, NamedValueId::parse)
    }
}

#[async_trait]
impl ResourceWithUpgradeState for ApiManagementNamedValueResource {
    async fn upgrade_state(
        &self,
        _ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        migration::upgrade_resource_state(request, UPGRADERS)
    }
}

fn validate_source(config: &DynamicValue) -> Vec<Diagnostic> {
    let value = config.get(&attr("value"));
    let key_vault = config.get(&attr("value_from_key_vault"));
    if value.is_unknown() || key_vault.is_unknown() {
        return vec![];
    }

    let has_value = !value.is_null();
    let has_key_vault = key_vault.as_list().is_some_and(|b| !b.is_empty());

    let mut diagnostics = vec![];
    if has_value == has_key_vault {
        diagnostics.push(Diagnostic::error(
            "Invalid named value source",
            "exactly one of `value` or `value_from_key_vault` must be specified",
        ));
    }
    if has_key_vault && config.get_optional_bool(&attr("secret")) == Some(false) {
        diagnostics.push(
            Diagnostic::error(
                "Invalid secret",
                "`secret` must be true when `value_from_key_vault` is set",
            )
            .with_attribute(attr("secret")),
        );
    }
    diagnostics
}

fn named_value_id(client: &Client, config: &DynamicValue) -> Result<NamedValueId, Diagnostic> {
    let service = parent_service_id(client, config)?;
    Ok(NamedValueId::new(
        &service.subscription_id,
        &service.resource_group,
        &service.name,
        &required_string(config, "name")?,
    ))
}

fn expand_named_value(config: &DynamicValue) -> NamedValue {
    let key_vault = config.get_block(&attr("value_from_key_vault"));
    let tags = config.get_string_list(&attr("tags"));

    NamedValue {
        properties: NamedValueProperties {
            display_name: config
                .get_optional_string(&attr("display_name"))
                .unwrap_or_default(),
            value: config.get_optional_string(&attr("value")),
            secret: config.get_optional_bool(&attr("secret")),
            tags: (!tags.is_empty()).then_some(tags),
            key_vault: key_vault.as_ref().map(|kv| KeyVaultContract {
                secret_identifier: block_string(Some(kv), "secret_id"),
                identity_client_id: block_string(Some(kv), "identity_client_id"),
            }),
        },
    }
}

async fn refresh(
    client: &Client,
    id: &NamedValueId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let remote = client.api_management().get_named_value(id).await?;
    let props = &remote.properties;
    let secret = props.secret.unwrap_or(false);

    let key_vault = props.key_vault.as_ref().and_then(|kv| {
        let secret_id = non_empty(kv.secret_identifier.as_deref())?;
        Some(block_fields([
            ("secret_id", secret_id.into()),
            (
                "identity_client_id",
                non_empty(kv.identity_client_id.as_deref()).into(),
            ),
        ]))
    });

    let mut writer = StateWriter::new(state, mode);
    writer
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("api_management_name", id.service_name.clone())
        .always("resource_group_name", id.resource_group.clone())
        .string("display_name", Some(props.display_name.as_str()))
        .bool("secret", Some(secret))
        .strings("tags", props.tags.as_deref().unwrap_or_default())
        .block("value_from_key_vault", key_vault);

    if !secret {
        writer.string("value", props.value.as_deref());
    }

    Ok(())
}

#[cfg(test)]
#[path = "./resource_named_value_test.rs"]
mod resource_named_value_test;
