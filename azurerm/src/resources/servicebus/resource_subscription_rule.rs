//! Service Bus subscription rule resource

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
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;
use tracing::info;

use crate::api::servicebus::{CorrelationFilter, Rule, RuleProperties, SqlExpression};
use crate::api::{ApiError, Client};
use crate::parse::{ResourceId, SubscriptionId, SubscriptionRuleId};
use crate::resources::common::{
    api_diagnostic, attr, block_fields, config_id, create_failed, ensure_absent, import_by_id,
    not_configured, read_failed, read_response, required_string, state_id, store_provider_data,
    update_failed, StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_servicebus_subscription_rule";

const SQL_FILTER: &str = "SqlFilter";
const CORRELATION_FILTER: &str = "CorrelationFilter";

/// String fields of the `correlation_filter` block
const CORRELATION_FIELDS: [&str; 8] = [
    "correlation_id",
    "message_id",
    "to",
    "reply_to",
    "label",
    "session_id",
    "reply_to_session_id",
    "content_type",
];

#[derive(Default)]
pub struct ServiceBusSubscriptionRuleResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusSubscriptionRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ServiceBusSubscriptionRuleResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let mut correlation_filter = NestedBlockBuilder::single_list("correlation_filter")
            .description("Matches messages on system and user properties");
        for field in CORRELATION_FIELDS {
            correlation_filter = correlation_filter
                .attribute(AttributeBuilder::new(field, AttributeType::String).optional().build());
        }
        let correlation_filter = correlation_filter
            .attribute(
                AttributeBuilder::new("properties", AttributeType::map_of(AttributeType::String))
                    .description("User properties that must match")
                    .optional()
                    .build(),
            )
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a filter rule on a Service Bus topic subscription")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::subscription_rule_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subscription_id", AttributeType::String)
                    .description("The ARM ID of the parent topic subscription")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("filter_type", AttributeType::String)
                    .description("SqlFilter or CorrelationFilter")
                    .required()
                    .validator(StringOneOfValidator::create(&[SQL_FILTER, CORRELATION_FILTER]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sql_filter", AttributeType::String)
                    .description("SQL expression matched against messages; required for SqlFilter")
                    .optional()
                    .validator(attribute::sql_filter())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("action", AttributeType::String)
                    .description("SQL action applied to matching messages")
                    .optional()
                    .build(),
            )
            .block(correlation_filter)
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
        let mut diagnostics = validate_filter(&request.config);

        if let Some(parent) = request.config.get_optional_string(&attr("subscription_id")) {
            if let Err(e) = SubscriptionId::parse(&parent) {
                diagnostics.push(
                    Diagnostic::error("Invalid subscription_id", e.to_string())
                        .with_attribute(attr("subscription_id")),
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

        let id = match rule_id(&request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.servicebus();
        if let Err(diag) = ensure_absent(api.get_rule(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating Service Bus Subscription Rule {}", id);
        if let Err(e) = api
            .create_or_update_rule(&ctx, &id, &expand_rule(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create Service Bus Subscription Rule {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created subscription rule", &e));
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

        let id = match state_id(&request.current_state, SubscriptionRuleId::parse) {
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

        let id = match state_id(&request.prior_state, SubscriptionRuleId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating Service Bus Subscription Rule {}", id);
        if let Err(e) = client
            .servicebus()
            .create_or_update_rule(&ctx, &id, &expand_rule(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(
                    format!("Failed to update Service Bus Subscription Rule {:?}", id.name),
                    &e,
                ),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated subscription rule", &e));
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

        match state_id(&request.prior_state, SubscriptionRuleId::parse) {
            Ok(id) => {
                info!("Deleting Service Bus Subscription Rule {}", id);
                if let Err(e) = provider_data.client.servicebus().delete_rule(&ctx, &id).await {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete Service Bus Subscription Rule {:?}", id.name),
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
impl ResourceWithConfigure for ServiceBusSubscriptionRuleResource {
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
impl ResourceWithImportState for ServiceBusSubscriptionRuleResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, SubscriptionRuleId::parse)
    }
}

fn filter_error(summary: &str, detail: &str, attribute: &str) -> Diagnostic {
    Diagnostic::error(summary, detail).with_attribute(attr(attribute))
}

/// Each filter type needs its own settings and forbids the other's
fn validate_filter(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let Some(filter_type) = config.get_optional_string(&attr("filter_type")) else {
        return diagnostics;
    };

    let sql_filter = config.get(&attr("sql_filter"));
    let correlation = config.get(&attr("correlation_filter"));
    let correlation_set = correlation.as_list().is_some_and(|items| !items.is_empty());

    match filter_type.as_str() {
        SQL_FILTER => {
            if sql_filter.is_null() {
                diagnostics.push(filter_error(
                    "Missing sql_filter",
                    "`sql_filter` must be set when `filter_type` is set to `SqlFilter`",
                    "sql_filter",
                ));
            }
            if correlation_set {
                diagnostics.push(filter_error(
                    "Conflicting correlation_filter",
                    "`correlation_filter` cannot be set when `filter_type` is set to `SqlFilter`",
                    "correlation_filter",
                ));
            }
        }
        CORRELATION_FILTER => {
            if sql_filter.is_known() {
                diagnostics.push(filter_error(
                    "Conflicting sql_filter",
                    "`sql_filter` cannot be set when `filter_type` is set to `CorrelationFilter`",
                    "sql_filter",
                ));
            }
            if correlation.is_unknown() {
                return diagnostics;
            }
            match config.get_block(&attr("correlation_filter")) {
                None => diagnostics.push(filter_error(
                    "Missing correlation_filter",
                    "`correlation_filter` must be set when `filter_type` is set to `CorrelationFilter`",
                    "correlation_filter",
                )),
                Some(block) if !correlation_has_field(&block) => diagnostics.push(filter_error(
                    "Empty correlation_filter",
                    "at least one property must be set in the `correlation_filter` block",
                    "correlation_filter",
                )),
                Some(_) => {}
            }
        }
        _ => {}
    }

    diagnostics
}

fn correlation_has_field(block: &DynamicValue) -> bool {
    CORRELATION_FIELDS
        .iter()
        .any(|field| !block.get(&attr(field)).is_null())
        || !block.get(&attr("properties")).is_null()
}

fn rule_id(config: &DynamicValue) -> Result<SubscriptionRuleId, Diagnostic> {
    let parent = config_id(config, "subscription_id", SubscriptionId::parse)?;
    let name = required_string(config, "name")?;
    Ok(SubscriptionRuleId::new(
        &parent.subscription_id,
        &parent.resource_group,
        &parent.namespace_name,
        &parent.topic_name,
        &parent.name,
        &name,
    ))
}

fn sql_expression(value: Option<String>) -> Option<SqlExpression> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| SqlExpression {
            sql_expression: Some(v),
        })
}

fn expand_rule(config: &DynamicValue) -> Rule {
    let filter_type = config.get_optional_string(&attr("filter_type"));
    let correlation = (filter_type.as_deref() == Some(CORRELATION_FILTER))
        .then(|| config.get_block(&attr("correlation_filter")))
        .flatten()
        .map(|block| {
            let field = |name: &str| block.get_optional_string(&attr(name));
            let properties = block.get_string_map(&attr("properties"));
            CorrelationFilter {
                correlation_id: field("correlation_id"),
                message_id: field("message_id"),
                to: field("to"),
                reply_to: field("reply_to"),
                label: field("label"),
                session_id: field("session_id"),
                reply_to_session_id: field("reply_to_session_id"),
                content_type: field("content_type"),
                properties: (!properties.is_empty()).then_some(properties),
            }
        });
    let sql_filter = if filter_type.as_deref() == Some(SQL_FILTER) {
        sql_expression(config.get_optional_string(&attr("sql_filter")))
    } else {
        None
    };

    Rule {
        properties: RuleProperties {
            filter_type,
            sql_filter,
            correlation_filter: correlation,
            action: sql_expression(config.get_optional_string(&attr("action"))),
        },
    }
}

fn flatten_correlation_filter(filter: &CorrelationFilter) -> HashMap<String, Dynamic> {
    let properties = match &filter.properties {
        Some(p) if !p.is_empty() => Dynamic::Map(
            p.iter()
                .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
                .collect(),
        ),
        _ => Dynamic::Null,
    };
    block_fields([
        ("correlation_id", filter.correlation_id.clone().into()),
        ("message_id", filter.message_id.clone().into()),
        ("to", filter.to.clone().into()),
        ("reply_to", filter.reply_to.clone().into()),
        ("label", filter.label.clone().into()),
        ("session_id", filter.session_id.clone().into()),
        ("reply_to_session_id", filter.reply_to_session_id.clone().into()),
        ("content_type", filter.content_type.clone().into()),
        ("properties", properties),
    ])
}

async fn refresh(
    client: &Client,
    id: &SubscriptionRuleId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let rule = client.servicebus().get_rule(id).await?;
    let props = &rule.properties;
    let expression = |e: &Option<SqlExpression>| {
        e.as_ref()
            .and_then(|e| e.sql_expression.clone())
            .filter(|s| !s.is_empty())
    };

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("subscription_id", id.topic_subscription_id().id())
        .string("filter_type", props.filter_type.as_deref())
        .string("sql_filter", expression(&props.sql_filter).as_deref())
        .string("action", expression(&props.action).as_deref())
        .block(
            "correlation_filter",
            props
                .correlation_filter
                .as_ref()
                .filter(|_| props.filter_type.as_deref() == Some(CORRELATION_FILTER))
                .map(flatten_correlation_filter),
        );

    Ok(())
}

#[cfg(test)]
#[path = "./resource_subscription_rule_test.rs"]
mod resource_subscription_rule_test;
