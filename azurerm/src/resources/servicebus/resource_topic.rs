//! Service Bus topic resource

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};
use tracing::info;

use super::entity::{
    configured_max_size, duration_attribute, express_not_supported, namespace_is_premium,
    ENTITY_STATUSES,
};
use crate::api::servicebus::{Topic, TopicProperties};
use crate::api::{ApiError, Client};
use crate::parse::{NamespaceId, ResourceId, TopicId};
use crate::resources::common::{
    api_diagnostic, attr, config_id, create_failed, ensure_absent, import_by_id, not_configured,
    read_failed, read_response, required_string, state_id, store_provider_data, update_failed,
    StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_servicebus_topic";

#[derive(Default)]
pub struct ServiceBusTopicResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusTopicResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ServiceBusTopicResource {
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
            .description("Manages a Service Bus topic")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the topic")
                    .required()
                    .validator(attribute::topic_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("namespace_id", AttributeType::String)
                    .description("The ARM ID of the parent namespace")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(duration_attribute(
                "auto_delete_on_idle",
                "Idle interval after which the topic is deleted",
            ))
            .attribute(duration_attribute(
                "default_message_ttl",
                "Default time to live of a message",
            ))
            .attribute(duration_attribute(
                "duplicate_detection_history_time_window",
                "Window in which duplicate messages are detected",
            ))
            .attribute(
                AttributeBuilder::new("batched_operations_enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("express_enabled", AttributeType::Bool)
                    .description("Hold messages in memory before writing them; not available on Premium")
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("partitioning_enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("requires_duplicate_detection", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("support_ordering", AttributeType::Bool)
                    .description("Whether the topic delivers messages in order")
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_message_size_in_kilobytes", AttributeType::Number)
                    .description("Largest accepted message; Premium namespaces only")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::between(1024.0, 102400.0))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_size_in_megabytes", AttributeType::Number)
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .optional()
                    .default(StaticDefault::string("Active"))
                    .validator(StringOneOfValidator::create(&ENTITY_STATUSES))
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
        let mut diagnostics = vec![];
        if let Some(namespace_id) = request.config.get_optional_string(&attr("namespace_id")) {
            if let Err(e) = NamespaceId::parse(&namespace_id) {
                diagnostics.push(
                    Diagnostic::error("Invalid namespace_id", e.to_string())
                        .with_attribute(attr("namespace_id")),
                );
            }
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match topic_id(&request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        if let Err(diag) = ensure_absent(client.servicebus().get_topic(&id).await, &id.id()) {
            return create_failed(diag);
        }

        if let Err(diag) = write_topic(client, &ctx, &id, &request.config).await {
            return create_failed(diag);
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created Service Bus Topic", &e));
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

        let id = match state_id(&request.current_state, TopicId::parse) {
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

        let id = match state_id(&request.prior_state, TopicId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        if let Err(diag) = write_topic(client, &ctx, &id, &request.config).await {
            return update_failed(request.prior_state, diag);
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated Service Bus Topic", &e));
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

        match state_id(&request.prior_state, TopicId::parse) {
            Ok(id) => {
                info!("Deleting Service Bus Topic {}", id);
                if let Err(e) = provider_data.client.servicebus().delete_topic(&ctx, &id).await {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete Service Bus Topic {:?}", id.name),
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
impl ResourceWithConfigure for ServiceBusTopicResource {
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
impl ResourceWithImportState for ServiceBusTopicResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, TopicId::parse)
    }
}

fn topic_id(config: &DynamicValue) -> Result<TopicId, Diagnostic> {
    let namespace = config_id(config, "namespace_id", NamespaceId::parse)?;
    let name = required_string(config, "name")?;
    Ok(TopicId::new(
        &namespace.subscription_id,
        &namespace.resource_group,
        &namespace.name,
        &name,
    ))
}

/// Checks the namespace tier, then PUTs the topic
async fn write_topic(
    client: &Client,
    ctx: &Context,
    id: &TopicId,
    config: &DynamicValue,
) -> Result<(), Diagnostic> {
    let premium = namespace_is_premium(client, &id.namespace_id())
        .await
        .map_err(|e| api_diagnostic("Failed to read parent Service Bus Namespace", &e))?;

    if premium && config.get_optional_bool(&attr("express_enabled")) == Some(true) {
        return Err(express_not_supported("Topic", &id.name));
    }
    if !premium && config.get_optional_i64(&attr("max_message_size_in_kilobytes")).is_some() {
        return Err(Diagnostic::error(
            "Invalid max_message_size_in_kilobytes",
            "max_message_size_in_kilobytes is only supported for Premium namespaces",
        )
        .with_attribute(attr("max_message_size_in_kilobytes")));
    }

    info!("Writing Service Bus Topic {}", id);
    client
        .servicebus()
        .create_or_update_topic(ctx, id, &expand_topic(config))
        .await
        .map_err(|e| api_diagnostic(format!("Failed to write Service Bus Topic {:?}", id.name), &e))?;
    Ok(())
}

fn expand_topic(config: &DynamicValue) -> Topic {
    let string = |name: &str| {
        config
            .get_optional_string(&attr(name))
            .filter(|v| !v.is_empty())
    };
    let flag = |name: &str| config.get_optional_bool(&attr(name));
    let number = |name: &str| config.get_optional_i64(&attr(name));

    Topic {
        properties: TopicProperties {
            default_message_time_to_live: string("default_message_ttl"),
            max_size_in_megabytes: number("max_size_in_megabytes"),
            max_message_size_in_kilobytes: number("max_message_size_in_kilobytes"),
            requires_duplicate_detection: flag("requires_duplicate_detection"),
            duplicate_detection_history_time_window: string(
                "duplicate_detection_history_time_window",
            ),
            enable_batched_operations: flag("batched_operations_enabled"),
            status: string("status"),
            support_ordering: flag("support_ordering"),
            auto_delete_on_idle: string("auto_delete_on_idle"),
            enable_partitioning: flag("partitioning_enabled"),
            enable_express: flag("express_enabled"),
        },
    }
}

async fn refresh(
    client: &Client,
    id: &TopicId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let topic = client.servicebus().get_topic(id).await?;
    let premium = namespace_is_premium(client, &id.namespace_id()).await?;
    let props = &topic.properties;
    let partitioned = props.enable_partitioning.unwrap_or(false);

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("namespace_id", id.namespace_id().id())
        .string("auto_delete_on_idle", props.auto_delete_on_idle.as_deref())
        .string(
            "default_message_ttl",
            props.default_message_time_to_live.as_deref(),
        )
        .string(
            "duplicate_detection_history_time_window",
            props.duplicate_detection_history_time_window.as_deref(),
        )
        .bool("batched_operations_enabled", props.enable_batched_operations)
        .bool("express_enabled", Some(props.enable_express.unwrap_or(false)))
        .bool("partitioning_enabled", Some(partitioned))
        .bool(
            "requires_duplicate_detection",
            props.requires_duplicate_detection,
        )
        .bool("support_ordering", props.support_ordering)
        .i64(
            "max_message_size_in_kilobytes",
            props.max_message_size_in_kilobytes,
        )
        .i64(
            "max_size_in_megabytes",
            props
                .max_size_in_megabytes
                .map(|size| configured_max_size(size, partitioned, premium)),
        )
        .string("status", props.status.as_deref());

    Ok(())
}

#[cfg(test)]
#[path = "./resource_topic_test.rs"]
mod resource_topic_test;
