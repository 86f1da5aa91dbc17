//! Service Bus namespace resource

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, RequiresReplaceIf, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberOneOfValidator, StringOneOfValidator};
use tracing::{info, warn};

use crate::api::servicebus::{Namespace, NamespaceProperties, Sku};
use crate::api::{ApiError, Client};
use crate::parse::{NamespaceId, ResourceId};
use crate::resources::common::{
    api_diagnostic, attr, create_failed, enabled_flag, ensure_absent, flag_enabled, import_by_id,
    location_changed, location_for_state, normalize_location, not_configured, read_failed,
    read_response, required_string, state_id, store_provider_data, tags, update_failed,
    StateWriter, WriteMode,
};
use crate::validate::{self, attribute};
use crate::AzureRmProviderData;

pub(crate) const TYPE_NAME: &str = "azurerm_servicebus_namespace";

#[derive(Default)]
pub struct ServiceBusNamespaceResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusNamespaceResource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_premium(value: &Dynamic) -> bool {
    value
        .as_str()
        .is_some_and(|sku| sku.eq_ignore_ascii_case("Premium"))
}

/// Moving into or out of the Premium tier needs a new namespace
fn premium_tier_changed(prior: &Dynamic, planned: &Dynamic) -> bool {
    is_premium(prior) != is_premium(planned)
}

#[async_trait]
impl Resource for ServiceBusNamespaceResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a Service Bus namespace")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The ARM ID of the namespace")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the namespace")
                    .required()
                    .validator(attribute::namespace_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group_name", AttributeType::String)
                    .description("The resource group holding the namespace")
                    .required()
                    .validator(attribute::resource_group_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("location", AttributeType::String)
                    .description("The Azure region of the namespace")
                    .required()
                    .plan_modifier(RequiresReplaceIf::create(
                        "moving to another region forces a new namespace",
                        location_changed,
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sku", AttributeType::String)
                    .description("Basic, Standard or Premium")
                    .required()
                    .validator(StringOneOfValidator::create(&validate::NAMESPACE_SKUS))
                    .plan_modifier(RequiresReplaceIf::create(
                        "changing to or from Premium forces a new namespace",
                        premium_tier_changed,
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("capacity", AttributeType::Number)
                    .description("Messaging units of a Premium namespace")
                    .optional()
                    .default(StaticDefault::number(0.0))
                    .validator(NumberOneOfValidator::create(&validate::NAMESPACE_CAPACITIES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("premium_messaging_partitions", AttributeType::Number)
                    .description("Number of messaging partitions of a Premium namespace")
                    .optional()
                    .computed()
                    .validator(NumberOneOfValidator::create(
                        &validate::PREMIUM_MESSAGING_PARTITIONS,
                    ))
                    .plan_modifier(RequiresReplace::create())
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("local_auth_enabled", AttributeType::Bool)
                    .description("Whether SAS authentication is enabled")
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_network_access_enabled", AttributeType::Bool)
                    .description("Whether the namespace is reachable from public networks")
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("minimum_tls_version", AttributeType::String)
                    .description("Minimum TLS version clients must use: 1.0, 1.1 or 1.2")
                    .optional()
                    .computed()
                    .validator(StringOneOfValidator::create(&["1.0", "1.1", "1.2"]))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zone_redundant", AttributeType::Bool)
                    .description("Whether the namespace is spread across availability zones")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplace::create())
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .description("Tags assigned to the namespace")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("The URL used to reach the namespace")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(secret_attribute("default_primary_connection_string"))
            .attribute(secret_attribute("default_secondary_connection_string"))
            .attribute(secret_attribute("default_primary_key"))
            .attribute(secret_attribute("default_secondary_key"))
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
            diagnostics: validate_sku_settings(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match namespace_id(client, &request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        if let Err(diag) = ensure_absent(client.servicebus().get_namespace(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating Service Bus Namespace {}", id);
        let namespace = expand_namespace(&request.config);
        if let Err(e) = client
            .servicebus()
            .create_or_update_namespace(&ctx, &id, &namespace)
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create Service Bus Namespace {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created Service Bus Namespace", &e));
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

        let id = match state_id(&request.current_state, NamespaceId::parse) {
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

        let id = match state_id(&request.prior_state, NamespaceId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating Service Bus Namespace {}", id);
        let namespace = expand_namespace(&request.config);
        if let Err(e) = client
            .servicebus()
            .create_or_update_namespace(&ctx, &id, &namespace)
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(
                    format!("Failed to update Service Bus Namespace {:?}", id.name),
                    &e,
                ),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated Service Bus Namespace", &e));
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

        match state_id(&request.prior_state, NamespaceId::parse) {
            Ok(id) => {
                info!("Deleting Service Bus Namespace {}", id);
                if let Err(e) = provider_data
                    .client
                    .servicebus()
                    .delete_namespace(&ctx, &id)
                    .await
                {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete Service Bus Namespace {:?}", id.name),
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
impl ResourceWithConfigure for ServiceBusNamespaceResource {
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
impl ResourceWithImportState for ServiceBusNamespaceResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, NamespaceId::parse)
    }
}

fn secret_attribute(name: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description("Credential of the RootManageSharedAccessKey rule")
        .computed()
        .sensitive()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

fn validate_sku_settings(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let Some(sku) = config.get_optional_string(&attr("sku")) else {
        return diagnostics;
    };

    // An unset capacity plans as 0, which Premium rejects
    if !config.get(&attr("capacity")).is_unknown() {
        let capacity = config.get_optional_i64(&attr("capacity")).unwrap_or(0);
        if let Err(e) = validate::namespace_capacity(&sku, capacity) {
            diagnostics.push(Diagnostic::error("Invalid capacity", e).with_attribute(attr("capacity")));
        }
    }
    if let Some(partitions) = config.get_optional_i64(&attr("premium_messaging_partitions")) {
        if let Err(e) = validate::premium_messaging_partitions(&sku, partitions) {
            diagnostics.push(
                Diagnostic::error("Invalid premium_messaging_partitions", e)
                    .with_attribute(attr("premium_messaging_partitions")),
            );
        }
    }

    diagnostics
}

fn namespace_id(client: &Client, config: &DynamicValue) -> Result<NamespaceId, Diagnostic> {
    Ok(NamespaceId::new(
        client.subscription_id(),
        &required_string(config, "resource_group_name")?,
        &required_string(config, "name")?,
    ))
}

fn expand_namespace(config: &DynamicValue) -> Namespace {
    let sku = config
        .get_optional_string(&attr("sku"))
        .unwrap_or_else(|| "Standard".to_string());
    let premium = sku.eq_ignore_ascii_case("Premium");

    Namespace {
        location: config
            .get_optional_string(&attr("location"))
            .map(|l| normalize_location(&l)),
        sku: Some(Sku {
            name: sku.clone(),
            tier: Some(sku),
            capacity: if premium {
                config.get_optional_i64(&attr("capacity"))
            } else {
                None
            },
        }),
        tags: tags(config),
        properties: NamespaceProperties {
            minimum_tls_version: config.get_optional_string(&attr("minimum_tls_version")),
            public_network_access: config
                .get_optional_bool(&attr("public_network_access_enabled"))
                .map(enabled_flag),
            disable_local_auth: config
                .get_optional_bool(&attr("local_auth_enabled"))
                .map(|enabled| !enabled),
            zone_redundant: config.get_optional_bool(&attr("zone_redundant")),
            premium_messaging_partitions: if premium {
                config.get_optional_i64(&attr("premium_messaging_partitions"))
            } else {
                None
            },
            ..Default::default()
        },
    }
}

/// Reads the namespace and its default keys into `state`
pub(crate) async fn refresh(
    client: &Client,
    id: &NamespaceId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let api = client.servicebus();
    let namespace = api.get_namespace(id).await?;

    let keys = match api.list_keys(&id.default_authorization_rule()).await {
        Ok(keys) => Some(keys),
        Err(e) => {
            warn!("Unable to list default keys for {}: {}", id, e);
            None
        }
    };

    let prior_location = state.get_optional_string(&attr("location"));
    let sku = namespace.sku.as_ref();
    let props = &namespace.properties;

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("resource_group_name", id.resource_group.clone())
        .string(
            "location",
            location_for_state(prior_location, namespace.location.clone()).as_deref(),
        )
        .string("sku", sku.map(|s| s.name.as_str()))
        .i64("capacity", Some(sku.and_then(|s| s.capacity).unwrap_or(0)))
        .i64(
            "premium_messaging_partitions",
            Some(props.premium_messaging_partitions.unwrap_or(0)),
        )
        .bool(
            "local_auth_enabled",
            Some(!props.disable_local_auth.unwrap_or(false)),
        )
        .bool(
            "public_network_access_enabled",
            Some(flag_enabled(props.public_network_access.as_deref()).unwrap_or(true)),
        )
        .string("minimum_tls_version", props.minimum_tls_version.as_deref())
        .bool("zone_redundant", Some(props.zone_redundant.unwrap_or(false)))
        .string_map("tags", namespace.tags.as_ref())
        .string("endpoint", props.service_bus_endpoint.as_deref())
        .string(
            "default_primary_connection_string",
            keys.as_ref().and_then(|k| k.primary_connection_string.as_deref()),
        )
        .string(
            "default_secondary_connection_string",
            keys.as_ref().and_then(|k| k.secondary_connection_string.as_deref()),
        )
        .string(
            "default_primary_key",
            keys.as_ref().and_then(|k| k.primary_key.as_deref()),
        )
        .string(
            "default_secondary_key",
            keys.as_ref().and_then(|k| k.secondary_key.as_deref()),
        );

    Ok(())
}

#[cfg(test)]
#[path = "./resource_namespace_test.rs"]
mod resource_namespace_test;
