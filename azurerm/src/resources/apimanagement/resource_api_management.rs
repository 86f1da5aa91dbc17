//! API Management service resource

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
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;
use tracing::{debug, info};

use super::service_config::{
    self, all_disabled, expand_additional_locations, expand_certificates, expand_custom_properties,
    expand_hostnames, expand_identity, expand_policy, expand_sign_in, expand_sign_up,
    flatten_additional_locations, flatten_certificates, flatten_hostnames, flatten_identity,
    flatten_policy, flatten_protocols, flatten_security, flatten_sign_in, flatten_sign_up,
    validate_settings,
};
use crate::api::apimanagement::{
    ApiManagementService, ApiVersionConstraint, Policy, ServiceProperties, ServiceSku,
    VirtualNetworkConfiguration,
};
use crate::api::{ApiError, Client};
use crate::parse::{ApiId, ApiManagementId, DeletedServiceId, ProductId, ResourceId, SubnetId};
use crate::provider_data::ApiManagementFeatures;
use crate::resources::common::{
    api_diagnostic, attr, block_fields, create_failed, enabled_flag, ensure_absent, flag_enabled,
    id_for_state, import_by_id, location_changed, location_for_state, normalize_location,
    not_configured, read_failed, read_response, required_string, state_id, store_provider_data,
    tags, update_failed, StateWriter, WriteMode,
};
use crate::resources::timeouts::{Operation, Timeouts};
use crate::validate::{self, attribute};
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_api_management";
const WHAT: &str = "API Management service";

const TIMEOUTS: Timeouts = Timeouts::minutes(60, 5, 60, 60);

const CONSUMPTION: &str = "Consumption";

const VNET_NONE: &str = "None";
const VNET_TYPES: [&str; 3] = [VNET_NONE, "External", "Internal"];

/// Sample content every new non-Consumption service is seeded with
const SAMPLE_APIS: [&str; 1] = ["echo-api"];
const SAMPLE_PRODUCTS: [&str; 2] = ["starter", "unlimited"];

#[derive(Default)]
pub struct ApiManagementResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ApiManagementResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_service(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;
        let config = &request.config;

        let id = match service_id(client, config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };
        let location = match required_string(config, "location") {
            Ok(location) => normalize_location(&location),
            Err(diag) => return create_failed(diag),
        };

        if config.get_optional_bool(&attr("public_network_access_enabled")) == Some(false) {
            return create_failed(
                Diagnostic::error(
                    "Invalid public_network_access_enabled",
                    "`public_network_access_enabled` cannot be set to false when creating an API Management service",
                )
                .with_attribute(attr("public_network_access_enabled")),
            );
        }

        let api = client.api_management();
        if let Err(diag) = ensure_absent(api.get_service(&id).await, &id.id()) {
            return create_failed(diag);
        }

        let deleted_id = DeletedServiceId::new(&id.subscription_id, &location, &id.name);
        let restore = match soft_deleted_service(
            client,
            &id,
            &deleted_id,
            &provider_data.features.api_management,
        )
        .await
        {
            Ok(restore) => restore,
            Err(diag) => return create_failed(diag),
        };

        let mut service = expand_service(config);
        if restore {
            info!("Recovering soft-deleted API Management service {}", deleted_id);
            service.properties.restore = Some(true);
        } else {
            info!("Creating API Management service {}", id);
        }

        if let Err(e) = api.create_or_update_service(&ctx, &id, &service).await {
            return create_failed(api_diagnostic(
                format!("Failed to create API Management service {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];

        let consumption = is_consumption(config);
        if !restore && !consumption {
            if let Err(e) = remove_sample_content(client, &ctx, &id).await {
                diagnostics.push(api_diagnostic(
                    "Failed to remove sample APIs and products",
                    &e,
                ));
            }
        }

        if !consumption {
            if let Err(e) = api
                .update_signin_settings(&ctx, &id, &expand_sign_in(config))
                .await
            {
                diagnostics.push(api_diagnostic("Failed to set sign-in settings", &e));
            }
            if let Err(e) = api
                .update_signup_settings(&ctx, &id, &expand_sign_up(config))
                .await
            {
                diagnostics.push(api_diagnostic("Failed to set sign-up settings", &e));
            }
        }

        if let Some(policy) = expand_policy(config) {
            if let Err(e) = api.create_or_update_service_policy(&ctx, &id, &policy).await {
                diagnostics.push(api_diagnostic("Failed to set service policy", &e));
            }
        }

        if let Err(e) = refresh_all(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic(
                "Failed to read created API Management service",
                &e,
            ));
        }

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read_service(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return read_failed(request.current_state, request.private, not_configured());
        };

        let id = match state_id(&request.current_state, ApiManagementId::parse) {
            Ok(id) => id,
            Err(diag) => return read_failed(request.current_state, request.private, diag),
        };

        let mut state = request.current_state.clone();
        let result = refresh_all(&provider_data.client, &id, &mut state, WriteMode::Refresh)
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

    async fn update_service(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return update_failed(request.prior_state, not_configured());
        };
        let client = &provider_data.client;
        let api = client.api_management();

        let id = match state_id(&request.prior_state, ApiManagementId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating API Management service {}", id);
        if let Err(e) = api
            .create_or_update_service(&ctx, &id, &expand_service(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(
                    format!("Failed to update API Management service {:?}", id.name),
                    &e,
                ),
            );
        }

        let mut diagnostics = vec![];
        let prior = &request.prior_state;
        let planned = &request.planned_state;

        if !is_consumption(planned) {
            let sign_in = expand_sign_in(planned);
            if sign_in != expand_sign_in(prior) {
                if let Err(e) = api.update_signin_settings(&ctx, &id, &sign_in).await {
                    diagnostics.push(api_diagnostic("Failed to update sign-in settings", &e));
                }
            }
            let sign_up = expand_sign_up(planned);
            if sign_up != expand_sign_up(prior) {
                if let Err(e) = api.update_signup_settings(&ctx, &id, &sign_up).await {
                    diagnostics.push(api_diagnostic("Failed to update sign-up settings", &e));
                }
            }
        }

        let prior_policy = expand_policy(prior);
        let policy = expand_policy(&request.config);
        if policy != prior_policy {
            if let Err(e) = replace_policy(client, &ctx, &id, prior_policy.is_some(), policy).await {
                diagnostics.push(api_diagnostic("Failed to update service policy", &e));
            }
        }

        let mut new_state = request.planned_state;
        if let Err(e) = refresh_all(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic(
                "Failed to read updated API Management service",
                &e,
            ));
        }

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete_service(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(provider_data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return DeleteResourceResponse { diagnostics };
        };
        let client = &provider_data.client;

        let id = match state_id(&request.prior_state, ApiManagementId::parse) {
            Ok(id) => id,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let api = client.api_management();
        if let Err(e) = api.delete_service(&ctx, &id).await {
            diagnostics.push(api_diagnostic(
                format!("Failed to delete API Management service {:?}", id.name),
                &e,
            ));
            return DeleteResourceResponse { diagnostics };
        }

        if !provider_data.features.api_management.purge_soft_delete_on_destroy {
            return DeleteResourceResponse { diagnostics };
        }
        let Some(location) = request
            .prior_state
            .get_optional_string(&attr("location"))
        else {
            return DeleteResourceResponse { diagnostics };
        };

        let deleted_id =
            DeletedServiceId::new(&id.subscription_id, &normalize_location(&location), &id.name);
        match api.get_deleted_service(&deleted_id).await {
            Ok(_) => {
                if let Err(e) = api.purge_deleted_service(&ctx, &deleted_id).await {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to purge soft-deleted API Management service {:?}", id.name),
                        &e,
                    ));
                }
            }
            Err(e) if e.is_not_found() => {
                debug!("No soft-deleted service left at {}", deleted_id);
            }
            Err(e) => diagnostics.push(api_diagnostic(
                format!("Failed to look up soft-deleted API Management service {:?}", id.name),
                &e,
            )),
        }

        DeleteResourceResponse { diagnostics }
    }
}

/// Joining a virtual network works in place; leaving or switching does not
fn virtual_network_type_forces_new(prior: &Dynamic, _planned: &Dynamic) -> bool {
    prior.as_str().unwrap_or(VNET_NONE) != VNET_NONE
}

fn sku_tier(sku_name: &str) -> Option<&str> {
    validate::split_sku_name(sku_name).map(|(tier, _)| tier)
}

fn is_consumption(value: &DynamicValue) -> bool {
    value
        .get_optional_string(&attr("sku_name"))
        .is_some_and(|sku| sku_tier(&sku) == Some(CONSUMPTION))
}

#[async_trait]
impl Resource for ApiManagementResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Manages an API Management service")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The ARM ID of the service")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(attribute::api_management_service_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group_name", AttributeType::String)
                    .required()
                    .validator(attribute::resource_group_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("location", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplaceIf::create(
                        "moving to another region forces a new service",
                        location_changed,
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("publisher_name", AttributeType::String)
                    .required()
                    .validator(attribute::api_management_publisher_name())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("publisher_email", AttributeType::String)
                    .required()
                    .validator(attribute::api_management_publisher_email())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sku_name", AttributeType::String)
                    .description("Tier and capacity, e.g. Developer_1 or Premium_2")
                    .required()
                    .validator(attribute::apim_sku_name())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("virtual_network_type", AttributeType::String)
                    .description("None, External or Internal")
                    .optional()
                    .default(StaticDefault::string(VNET_NONE))
                    .validator(StringOneOfValidator::create(&VNET_TYPES))
                    .plan_modifier(RequiresReplaceIf::create(
                        "only joining a virtual network can be done in place",
                        virtual_network_type_forces_new,
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_network_access_enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("client_certificate_enabled", AttributeType::Bool)
                    .description("Whether the gateway requests client certificates; Consumption only")
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("min_api_version", AttributeType::String)
                    .description("Oldest control plane API version clients may use")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("notification_sender_email", AttributeType::String)
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zones", AttributeType::set_of(AttributeType::String))
                    .description("Availability zones; Premium only")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .optional()
                    .build(),
            )
            .attribute(computed_url("gateway_url"))
            .attribute(computed_url("management_api_url"))
            .attribute(computed_url("portal_url"))
            .attribute(computed_url("developer_portal_url"))
            .attribute(computed_url("scm_url"))
            .attribute(computed_url("gateway_regional_url"))
            .attribute(computed_addresses("public_ip_addresses"))
            .attribute(computed_addresses("private_ip_addresses"))
            .block(
                NestedBlockBuilder::single_list("virtual_network_configuration")
                    .description("Subnet the service is deployed into")
                    .attribute(
                        AttributeBuilder::new("subnet_id", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .max_items(1)
                    .build(),
            );
        for block in service_config::blocks() {
            builder = builder.block(block);
        }
        let schema = builder.block(TIMEOUTS.block()).build();

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
            diagnostics: validate_service(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let timeouts = TIMEOUTS.configured(&request.config);
        let ctx = ctx.with_timeout(timeouts.get(Operation::Create));
        timeouts
            .run(Operation::Create, WHAT, self.create_service(ctx, request))
            .await
            .unwrap_or_else(create_failed)
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let timeouts = TIMEOUTS.configured(&request.current_state);
        let current_state = request.current_state.clone();
        let private = request.private.clone();
        timeouts
            .run(Operation::Read, WHAT, self.read_service(ctx, request))
            .await
            .unwrap_or_else(|diag| read_failed(current_state, private, diag))
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let timeouts = TIMEOUTS.configured(&request.config);
        let ctx = ctx.with_timeout(timeouts.get(Operation::Update));
        let prior_state = request.prior_state.clone();
        timeouts
            .run(Operation::Update, WHAT, self.update_service(ctx, request))
            .await
            .unwrap_or_else(|diag| update_failed(prior_state, diag))
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let timeouts = TIMEOUTS.configured(&request.prior_state);
        let ctx = ctx.with_timeout(timeouts.get(Operation::Delete));
        timeouts
            .run(Operation::Delete, WHAT, self.delete_service(ctx, request))
            .await
            .unwrap_or_else(|diag| DeleteResourceResponse {
                diagnostics: vec![diag],
            })
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ApiManagementResource {
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
impl ResourceWithImportState for ApiManagementResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, ApiManagementId::parse)
    }
}

fn computed_url(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

fn computed_addresses(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::list_of(AttributeType::String))
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

fn validate_service(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let tier = config
        .get_optional_string(&attr("sku_name"))
        .and_then(|sku| sku_tier(&sku).map(str::to_string));

    if let Some(tier) = &tier {
        if config.get_optional_bool(&attr("client_certificate_enabled")) == Some(true)
            && tier != CONSUMPTION
        {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid client_certificate_enabled",
                    "`client_certificate_enabled` is only supported when the sku tier is `Consumption`",
                )
                .with_attribute(attr("client_certificate_enabled")),
            );
        }

        let zones = config.get(&attr("zones"));
        if zones.as_list().is_some_and(|z| !z.is_empty()) && tier != "Premium" {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid zones",
                    "`zones` is only supported when the sku tier is `Premium`",
                )
                .with_attribute(attr("zones")),
            );
        }
    }

    diagnostics.extend(validate_settings(config, tier.as_deref()));

    let vnet_type = config.get(&attr("virtual_network_type"));
    let vnet_block = config.get(&attr("virtual_network_configuration"));
    if let Some(vnet_type) = vnet_type.as_str() {
        let has_block = vnet_block.as_list().is_some_and(|b| !b.is_empty());
        if vnet_type != VNET_NONE && !has_block && !vnet_block.is_unknown() {
            diagnostics.push(
                Diagnostic::error(
                    "Missing virtual_network_configuration",
                    format!(
                        "`virtual_network_configuration` must be specified when `virtual_network_type` is `{}`",
                        vnet_type
                    ),
                )
                .with_attribute(attr("virtual_network_configuration")),
            );
        }
    }

    if let Some(subnet) = config
        .get_block(&attr("virtual_network_configuration"))
        .and_then(|b| b.get_optional_string(&attr("subnet_id")))
    {
        if let Err(e) = SubnetId::parse(&subnet) {
            diagnostics.push(
                Diagnostic::error("Invalid subnet_id", e.to_string())
                    .with_attribute(attr("virtual_network_configuration")),
            );
        }
    }

    diagnostics
}

fn service_id(client: &Client, config: &DynamicValue) -> Result<ApiManagementId, Diagnostic> {
    Ok(ApiManagementId::new(
        client.subscription_id(),
        &required_string(config, "resource_group_name")?,
        &required_string(config, "name")?,
    ))
}

/// Decides whether create must recover a soft-deleted service of the same name
async fn soft_deleted_service(
    client: &Client,
    id: &ApiManagementId,
    deleted_id: &DeletedServiceId,
    features: &ApiManagementFeatures,
) -> Result<bool, Diagnostic> {
    let deleted = match client.api_management().get_deleted_service(deleted_id).await {
        Ok(deleted) => deleted,
        Err(e) if e.is_not_found() => return Ok(false),
        Err(e) => {
            return Err(api_diagnostic(
                format!("Failed to check for soft-deleted API Management service {:?}", id.name),
                &e,
            ))
        }
    };

    if !features.recover_soft_deleted {
        return Err(Diagnostic::error(
            "Soft-deleted API Management service exists",
            format!(
                "An existing soft-deleted API Management exists with the Name {:?} in the location {:?}, however `recover_soft_deleted` is disabled. Either enable it in the provider `features` block or purge the soft-deleted service",
                deleted_id.name, deleted_id.location
            ),
        ));
    }

    if let Some(owner) = deleted.properties.service_id.as_deref() {
        if !owner.eq_ignore_ascii_case(&id.id()) {
            return Err(Diagnostic::error(
                "Soft-deleted API Management service belongs elsewhere",
                format!(
                    "the soft-deleted API Management {:?} belonged to {:?} and cannot be recovered as {:?}",
                    deleted_id.name,
                    owner,
                    id.id()
                ),
            ));
        }
    }

    Ok(true)
}

async fn remove_sample_content(
    client: &Client,
    ctx: &Context,
    id: &ApiManagementId,
) -> Result<(), ApiError> {
    let api = client.api_management();

    for sample in api.list_apis(id).await? {
        if SAMPLE_APIS.contains(&sample.name.as_str()) {
            debug!("Removing sample API {:?} from {}", sample.name, id);
            let api_id = ApiId::new(&id.subscription_id, &id.resource_group, &id.name, &sample.name);
            api.delete_api(ctx, &api_id, true).await?;
        }
    }

    for sample in api.list_products(id).await? {
        if SAMPLE_PRODUCTS.contains(&sample.name.as_str()) {
            debug!("Removing sample product {:?} from {}", sample.name, id);
            let product_id =
                ProductId::new(&id.subscription_id, &id.resource_group, &id.name, &sample.name);
            api.delete_product(ctx, &product_id).await?;
        }
    }

    Ok(())
}

fn expand_service(config: &DynamicValue) -> ApiManagementService {
    let (sku_name, capacity) = config
        .get_optional_string(&attr("sku_name"))
        .as_deref()
        .and_then(validate::split_sku_name)
        .map(|(tier, capacity)| (tier.to_string(), capacity))
        .unwrap_or_default();

    let consumption = sku_name == CONSUMPTION;
    let zones = config.get_string_list(&attr("zones"));
    let virtual_network_configuration = config
        .get_block(&attr("virtual_network_configuration"))
        .and_then(|b| b.get_optional_string(&attr("subnet_id")))
        .map(|subnet_resource_id| VirtualNetworkConfiguration { subnet_resource_id });

    let sku = ServiceSku {
        name: sku_name,
        capacity,
    };
    let additional_locations = expand_additional_locations(config, &sku);

    ApiManagementService {
        location: config
            .get_optional_string(&attr("location"))
            .map(|l| normalize_location(&l)),
        sku,
        zones: (!zones.is_empty()).then_some(zones),
        tags: tags(config),
        identity: Some(expand_identity(config)),
        properties: ServiceProperties {
            publisher_name: config
                .get_optional_string(&attr("publisher_name"))
                .unwrap_or_default(),
            publisher_email: config
                .get_optional_string(&attr("publisher_email"))
                .unwrap_or_default(),
            virtual_network_type: config.get_optional_string(&attr("virtual_network_type")),
            virtual_network_configuration,
            public_network_access: config
                .get_optional_bool(&attr("public_network_access_enabled"))
                .map(enabled_flag),
            enable_client_certificate: config
                .get_optional_bool(&attr("client_certificate_enabled")),
            api_version_constraint: config
                .get_optional_string(&attr("min_api_version"))
                .map(|v| ApiVersionConstraint {
                    min_api_version: Some(v),
                }),
            notification_sender_email: config
                .get_optional_string(&attr("notification_sender_email")),
            custom_properties: Some(expand_custom_properties(config, consumption)),
            hostname_configurations: Some(expand_hostnames(config)),
            additional_locations: (!additional_locations.is_empty()).then_some(additional_locations),
            certificates: Some(expand_certificates(config)),
            ..Default::default()
        },
    }
}

/// Writes the attributes shared with the data source and returns the service read
pub(crate) async fn refresh(
    client: &Client,
    id: &ApiManagementId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<ApiManagementService, ApiError> {
    let service = client.api_management().get_service(id).await?;
    let props = &service.properties;

    let prior_location = state.get_optional_string(&attr("location"));
    let prior_subnet = state
        .get_block(&attr("virtual_network_configuration"))
        .and_then(|b| b.get_optional_string(&attr("subnet_id")));
    let subnet = props
        .virtual_network_configuration
        .as_ref()
        .and_then(|vnet| {
            id_for_state(prior_subnet, Some(vnet.subnet_resource_id.clone()))
        })
        .map(|subnet_id| block_fields([("subnet_id", subnet_id.into())]));

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("resource_group_name", id.resource_group.clone())
        .string(
            "location",
            location_for_state(prior_location, service.location.clone()).as_deref(),
        )
        .string("publisher_name", Some(props.publisher_name.as_str()))
        .string("publisher_email", Some(props.publisher_email.as_str()))
        .string(
            "sku_name",
            Some(format!("{}_{}", service.sku.name, service.sku.capacity).as_str()),
        )
        .string(
            "virtual_network_type",
            Some(props.virtual_network_type.as_deref().unwrap_or(VNET_NONE)),
        )
        .block("virtual_network_configuration", subnet)
        .bool(
            "public_network_access_enabled",
            Some(flag_enabled(props.public_network_access.as_deref()).unwrap_or(true)),
        )
        .bool(
            "client_certificate_enabled",
            Some(props.enable_client_certificate.unwrap_or(false)),
        )
        .string(
            "min_api_version",
            props
                .api_version_constraint
                .as_ref()
                .and_then(|c| c.min_api_version.as_deref()),
        )
        .string(
            "notification_sender_email",
            props.notification_sender_email.as_deref(),
        )
        .strings("zones", service.zones.as_deref().unwrap_or_default())
        .string_map("tags", service.tags.as_ref())
        .string("gateway_url", props.gateway_url.as_deref())
        .string("management_api_url", props.management_api_url.as_deref())
        .string("portal_url", props.portal_url.as_deref())
        .string("developer_portal_url", props.developer_portal_url.as_deref())
        .string("scm_url", props.scm_url.as_deref())
        .strings("public_ip_addresses", &props.public_ip_addresses)
        .strings("private_ip_addresses", &props.private_ip_addresses);

    Ok(service)
}

async fn refresh_all(
    client: &Client,
    id: &ApiManagementId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let service = refresh(client, id, state, mode).await?;
    refresh_settings(client, id, &service, state, mode).await
}

fn has_block(state: &DynamicValue, name: &str) -> bool {
    state
        .get(&attr(name))
        .as_list()
        .is_some_and(|blocks| !blocks.is_empty())
}

/// Settings blocks only the resource carries
///
/// The service always reports gateway toggles and portal settings, so those
/// blocks are stored once configured or once enabled outside Terraform.
async fn refresh_settings(
    client: &Client,
    id: &ApiManagementId,
    service: &ApiManagementService,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let api = client.api_management();
    let props = &service.properties;
    let custom_properties = props.custom_properties.clone().unwrap_or_default();

    let security = Some(flatten_security(&custom_properties))
        .filter(|f| has_block(state, "security") || !all_disabled(f));
    let protocols = Some(flatten_protocols(&custom_properties))
        .filter(|f| has_block(state, "protocols") || !all_disabled(f));

    let (sign_in, sign_up) = if mode == WriteMode::Refresh && service.sku.name != CONSUMPTION {
        let sign_in = flatten_sign_in(&api.get_signin_settings(id).await?);
        let sign_up = flatten_sign_up(&api.get_signup_settings(id).await?);
        (
            Some(sign_in).filter(|f| has_block(state, "sign_in") || !all_disabled(f)),
            Some(sign_up).filter(|f| has_block(state, "sign_up") || !all_disabled(f)),
        )
    } else {
        (None, None)
    };

    let prior_policy = state.get_block(&attr("policy"));
    let policy = match (&prior_policy, mode) {
        (Some(_), WriteMode::Refresh) => true,
        (Some(_), WriteMode::Apply) => state.get(&attr("policy")).contains_unknown(),
        (None, _) => false,
    };
    let policy = if policy {
        let remote = api.get_service_policy(id).await?;
        Some(flatten_policy(remote.as_ref(), prior_policy.as_ref()))
    } else {
        None
    };

    let hostnames = flatten_hostnames(
        props.hostname_configurations.as_deref().unwrap_or_default(),
        state.get_block(&attr("hostname_configuration")).as_ref(),
    );
    let locations = flatten_additional_locations(
        props.additional_locations.as_deref().unwrap_or_default(),
        &state.get_blocks(&attr("additional_location")),
    );
    let certificates = flatten_certificates(
        props.certificates.as_deref().unwrap_or_default(),
        &state.get_blocks(&attr("certificate")),
    );

    let mut writer = StateWriter::new(state, mode);
    writer
        .block("identity", flatten_identity(service.identity.as_ref()))
        .block("hostname_configuration", hostnames)
        .blocks("additional_location", locations)
        .blocks("certificate", certificates)
        .string("gateway_regional_url", props.gateway_regional_url.as_deref());
    for (name, fields) in [
        ("security", security),
        ("protocols", protocols),
        ("sign_in", sign_in),
        ("sign_up", sign_up),
    ] {
        if fields.is_some() {
            writer.block(name, fields);
        }
    }
    if let Some(policy) = policy {
        writer.block("policy", policy);
    }

    Ok(())
}

/// Swaps the service policy; the old one is removed first
async fn replace_policy(
    client: &Client,
    ctx: &Context,
    id: &ApiManagementId,
    had_policy: bool,
    policy: Option<Policy>,
) -> Result<(), ApiError> {
    let api = client.api_management();
    if had_policy {
        api.delete_service_policy(ctx, id).await?;
    }
    if let Some(policy) = policy {
        api.create_or_update_service_policy(ctx, id, &policy).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "./resource_api_management_test.rs"]
mod resource_api_management_test;
