use async_trait::async_trait;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tracing::info;

use super::service::{non_empty, parent_attributes, parent_service_id};
use crate::api::apimanagement::{Product, ProductProperties};
use crate::api::{ApiError, Client};
use crate::parse::{ProductId, ResourceId};
use crate::resources::common::{
    api_diagnostic, attr, create_failed, ensure_absent, import_by_id, not_configured, read_failed,
    read_response, required_string, state_id, store_provider_data, update_failed, StateWriter,
    WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_api_management_product";

const STATE_PUBLISHED: &str = "published";
const STATE_NOT_PUBLISHED: &str = "notPublished";

#[derive(Default)]
pub struct ApiManagementProductResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ApiManagementProductResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ApiManagementProductResource {
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
            .version(0)
            .description("Manages a product grouping APIs for subscription")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("product_id", AttributeType::String)
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
                AttributeBuilder::new("published", AttributeType::Bool)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subscription_required", AttributeType::Bool)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("approval_required", AttributeType::Bool)
                    .description("Whether subscriptions need administrator approval")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subscriptions_limit", AttributeType::Number)
                    .description("Maximum number of subscriptions per user")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("terms", AttributeType::String)
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
            diagnostics: validate_subscription_settings(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match product_id(client, &request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.api_management();
        if let Err(diag) = ensure_absent(api.get_product(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating product {}", id);
        if let Err(e) = api
            .create_or_update_product(&ctx, &id, &expand_product(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create product {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created product", &e));
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

        let id = match state_id(&request.current_state, ProductId::parse) {
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

        let id = match state_id(&request.prior_state, ProductId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating product {}", id);
        if let Err(e) = client
            .api_management()
            .create_or_update_product(&ctx, &id, &expand_product(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(format!("Failed to update product {:?}", id.name), &e),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated product", &e));
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

        match state_id(&request.prior_state, ProductId::parse) {
            Ok(id) => {
                info!("Deleting product {}", id);
                if let Err(e) = provider_data
                    .client
                    .api_management()
                    .delete_product(&ctx, &id)
                    .await
                {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete product {:?}", id.name),
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
impl ResourceWithConfigure for ApiManagementProductResource {
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
impl ResourceWithImportState for ApiManagementProductResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, ProductId::parse)
    }
}

/// Approval and limits only apply to products that take subscriptions.
/// Unknown values are left for apply time.
fn validate_subscription_settings(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    let required = config.get(&attr("subscription_required"));
    let approval = config.get(&attr("approval_required"));
    let limit = config.get(&attr("subscriptions_limit"));
    if required.is_unknown() || approval.is_unknown() || limit.is_unknown() {
        return diagnostics;
    }

    let subscription_required = config
        .get_optional_bool(&attr("subscription_required"))
        .unwrap_or(false);
    let approval_required = config
        .get_optional_bool(&attr("approval_required"))
        .unwrap_or(false);
    let limited = limit.is_known();

    if limited && !subscription_required {
        diagnostics.push(
            Diagnostic::error(
                "Invalid subscriptions_limit",
                "`subscription_required` must be true to set `subscriptions_limit`",
            )
            .with_attribute(attr("subscriptions_limit")),
        );
    }
    if approval_required && !subscription_required {
        diagnostics.push(
            Diagnostic::error(
                "Invalid approval_required",
                "`subscription_required` must be true to use `approval_required`",
            )
            .with_attribute(attr("approval_required")),
        );
    }
    if approval_required && !limited {
        diagnostics.push(
            Diagnostic::error(
                "Missing subscriptions_limit",
                "`subscriptions_limit` must be set to use `approval_required`",
            )
            .with_attribute(attr("subscriptions_limit")),
        );
    }

    diagnostics
}

fn product_id(client: &Client, config: &DynamicValue) -> Result<ProductId, Diagnostic> {
    let service = parent_service_id(client, config)?;
    Ok(ProductId::new(
        &service.subscription_id,
        &service.resource_group,
        &service.name,
        &required_string(config, "product_id")?,
    ))
}

fn expand_product(config: &DynamicValue) -> Product {
    let subscription_required = config
        .get_optional_bool(&attr("subscription_required"))
        .unwrap_or(false);
    let published = config.get_optional_bool(&attr("published")).unwrap_or(false);

    // The service rejects approval and limits on open products
    let (approval_required, subscriptions_limit) = if subscription_required {
        (
            config.get_optional_bool(&attr("approval_required")),
            config.get_optional_i64(&attr("subscriptions_limit")),
        )
    } else {
        (None, None)
    };

    Product {
        properties: ProductProperties {
            display_name: config
                .get_optional_string(&attr("display_name"))
                .unwrap_or_default(),
            description: config.get_optional_string(&attr("description")),
            terms: config.get_optional_string(&attr("terms")),
            subscription_required: Some(subscription_required),
            approval_required,
            subscriptions_limit,
            state: Some(
                if published {
                    STATE_PUBLISHED
                } else {
                    STATE_NOT_PUBLISHED
                }
                .to_string(),
            ),
        },
    }
}

async fn refresh(
    client: &Client,
    id: &ProductId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let remote = client.api_management().get_product(id).await?;
    let props = &remote.properties;
    let published = props.state.as_deref().map(|s| s == STATE_PUBLISHED);
    let subscription_required = props.subscription_required.unwrap_or(false);

    let mut writer = StateWriter::new(state, mode);
    writer
        .always("id", id.id())
        .always("product_id", id.name.clone())
        .always("api_management_name", id.service_name.clone())
        .always("resource_group_name", id.resource_group.clone())
        .string("display_name", Some(props.display_name.as_str()))
        .bool("published", published)
        .bool("subscription_required", Some(subscription_required))
        .string("description", non_empty(props.description.as_deref()))
        .string("terms", non_empty(props.terms.as_deref()));

    // Open products report these as defaults the configuration never set
    if subscription_required {
        writer
            .bool("approval_required", props.approval_required)
            .i64("subscriptions_limit", props.subscriptions_limit);
    } else {
        writer
            .bool("approval_required", None)
            .i64("subscriptions_limit", None);
    }

    Ok(())
}
