//! Service Bus topic subscription resource

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

use super::entity::{duration_attribute, ENTITY_STATUSES};
use crate::api::servicebus::{Subscription, SubscriptionProperties};
use crate::api::{ApiError, Client};
use crate::parse::{ResourceId, SubscriptionId, TopicId};
use crate::resources::common::{
    api_diagnostic, attr, config_id, create_failed, ensure_absent, import_by_id, not_configured,
    read_failed, read_response, required_string, state_id, store_provider_data, update_failed,
    StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_servicebus_subscription";

#[derive(Default)]
pub struct ServiceBusSubscriptionResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusSubscriptionResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ServiceBusSubscriptionResource {
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
            .description("Manages a subscription to a Service Bus topic")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::subscription_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("topic_id", AttributeType::String)
                    .description("The ARM ID of the parent topic")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_delivery_count", AttributeType::Number)
                    .description("Deliveries before a message is dead-lettered")
                    .required()
                    .validator(NumberRangeValidator::at_least(1.0))
                    .build(),
            )
            .attribute(duration_attribute(
                "auto_delete_on_idle",
                "Idle interval after which the subscription is deleted",
            ))
            .attribute(duration_attribute(
                "default_message_ttl",
                "Default time to live of a message",
            ))
            .attribute(duration_attribute(
                "lock_duration",
                "How long a received message stays locked",
            ))
            .attribute(
                AttributeBuilder::new("dead_lettering_on_message_expiration", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "dead_lettering_on_filter_evaluation_error",
                    AttributeType::Bool,
                )
                .optional()
                .default(StaticDefault::bool(true))
                .build(),
            )
            .attribute(
                AttributeBuilder::new("batched_operations_enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("requires_session", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("forward_to", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("forward_dead_lettered_messages_to", AttributeType::String)
                    .optional()
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
        if let Some(topic_id) = request.config.get_optional_string(&attr("topic_id")) {
            if let Err(e) = TopicId::parse(&topic_id) {
                diagnostics.push(
                    Diagnostic::error("Invalid topic_id", e.to_string())
                        .with_attribute(attr("topic_id")),
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

        let id = match subscription_id(&request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.servicebus();
        if let Err(diag) = ensure_absent(api.get_subscription(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating Service Bus Subscription {}", id);
        if let Err(e) = api
            .create_or_update_subscription(&ctx, &id, &expand_subscription(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create Service Bus Subscription {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic(
                "Failed to read created Service Bus Subscription",
                &e,
            ));
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

        let id = match state_id(&request.current_state, SubscriptionId::parse) {
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

        let id = match state_id(&request.prior_state, SubscriptionId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating Service Bus Subscription {}", id);
        if let Err(e) = client
            .servicebus()
            .create_or_update_subscription(&ctx, &id, &expand_subscription(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(
                    format!("Failed to update Service Bus Subscription {:?}", id.name),
                    &e,
                ),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic(
                "Failed to read updated Service Bus Subscription",
                &e,
            ));
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

        match state_id(&request.prior_state, SubscriptionId::parse) {
            Ok(id) => {
                info!("Deleting Service Bus Subscription {}", id);
                if let Err(e) = provider_data
                    .client
                    .servicebus()
                    .delete_subscription(&ctx, &id)
                    .await
                {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete Service Bus Subscription {:?}", id.name),
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
impl ResourceWithConfigure for ServiceBusSubscriptionResource {
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
impl ResourceWithImportState for ServiceBusSubscriptionResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, SubscriptionId::parse)
    }
}

fn subscription_id(config: &DynamicValue) -> Result<SubscriptionId, Diagnostic> {
    let topic = config_id(config, "topic_id", TopicId::parse)?;
    let name = required_string(config, "name")?;
    Ok(SubscriptionId::new(
        &topic.subscription_id,
        &topic.resource_group,
        &topic.namespace_name,
        &topic.name,
        &name,
    ))
}

fn expand_subscription(config: &DynamicValue) -> Subscription {
    let string = |name: &str| {
        config
            .get_optional_string(&attr(name))
            .filter(|v| !v.is_empty())
    };
    let flag = |name: &str| config.get_optional_bool(&attr(name));

    Subscription {
        properties: SubscriptionProperties {
            lock_duration: string("lock_duration"),
            requires_session: flag("requires_session"),
            default_message_time_to_live: string("default_message_ttl"),
            dead_lettering_on_filter_evaluation_exceptions: flag(
                "dead_lettering_on_filter_evaluation_error",
            ),
            dead_lettering_on_message_expiration: flag("dead_lettering_on_message_expiration"),
            max_delivery_count: config.get_optional_i64(&attr("max_delivery_count")),
            status: string("status"),
            enable_batched_operations: flag("batched_operations_enabled"),
            auto_delete_on_idle: string("auto_delete_on_idle"),
            forward_to: string("forward_to"),
            forward_dead_lettered_messages_to: string("forward_dead_lettered_messages_to"),
        },
    }
}

async fn refresh(
    client: &Client,
    id: &SubscriptionId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let subscription = client.servicebus().get_subscription(id).await?;
    let props = &subscription.properties;
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("topic_id", id.topic_id().id())
        .i64("max_delivery_count", props.max_delivery_count)
        .string("auto_delete_on_idle", props.auto_delete_on_idle.as_deref())
        .string(
            "default_message_ttl",
            props.default_message_time_to_live.as_deref(),
        )
        .string("lock_duration", props.lock_duration.as_deref())
        .bool(
            "dead_lettering_on_message_expiration",
            props.dead_lettering_on_message_expiration,
        )
        .bool(
            "dead_lettering_on_filter_evaluation_error",
            props.dead_lettering_on_filter_evaluation_exceptions,
        )
        .bool("batched_operations_enabled", props.enable_batched_operations)
        .bool("requires_session", props.requires_session)
        .string("forward_to", non_empty(&props.forward_to).as_deref())
        .string(
            "forward_dead_lettered_messages_to",
            non_empty(&props.forward_dead_lettered_messages_to).as_deref(),
        )
        .string("status", props.status.as_deref());

    Ok(())
}
