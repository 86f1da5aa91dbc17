//! Service Bus geo-disaster-recovery alias resource
//!
//! Pairing, re-pairing and deletion all run against the primary namespace,
//! which only accepts one of these operations at a time. Every write holds
//! the namespace lock and waits for the alias to settle before returning.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, ResourceWithModifyPlan, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tracing::{debug, info, warn};

use super::resource_namespace::TYPE_NAME as NAMESPACE_TYPE_NAME;
use crate::api::servicebus::{DisasterRecoveryConfig, DisasterRecoveryConfigProperties};
use crate::api::{ApiError, Client};
use crate::parse::{
    NamespaceAuthorizationRuleId, NamespaceDisasterRecoveryConfigId, NamespaceId, ResourceId,
};
use crate::resources::common::{
    api_diagnostic, attr, config_id, create_failed, ensure_absent, id_for_state, import_by_id,
    not_configured, read_failed, read_response, required_string, state_id, store_provider_data,
    update_failed, StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_servicebus_namespace_disaster_recovery_config";

/// Values derived from the alias authorization rule
const ALIAS_SECRETS: [&str; 4] = [
    "primary_connection_string_alias",
    "secondary_connection_string_alias",
    "default_primary_key",
    "default_secondary_key",
];

#[derive(Default)]
pub struct ServiceBusNamespaceDisasterRecoveryConfigResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusNamespaceDisasterRecoveryConfigResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ServiceBusNamespaceDisasterRecoveryConfigResource {
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
            .description("Pairs a primary and a secondary Service Bus namespace under an alias")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The alias name, used in the alias connection strings")
                    .required()
                    .validator(attribute::namespace_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("primary_namespace_id", AttributeType::String)
                    .description("The ARM ID of the primary namespace")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("partner_namespace_id", AttributeType::String)
                    .description("The ARM ID of the secondary namespace")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("alias_authorization_rule_id", AttributeType::String)
                    .description("Namespace authorization rule whose keys are exposed through the alias")
                    .optional()
                    .build(),
            )
            .attribute(alias_secret(ALIAS_SECRETS[0]))
            .attribute(alias_secret(ALIAS_SECRETS[1]))
            .attribute(alias_secret(ALIAS_SECRETS[2]))
            .attribute(alias_secret(ALIAS_SECRETS[3]))
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
        let config = &request.config;
        let mut diagnostics = vec![];

        for name in ["primary_namespace_id", "partner_namespace_id"] {
            if let Some(value) = config.get_optional_string(&attr(name)) {
                if let Err(e) = NamespaceId::parse(&value) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid {}", name), e.to_string())
                            .with_attribute(attr(name)),
                    );
                }
            }
        }
        if let Some(rule) = config.get_optional_string(&attr("alias_authorization_rule_id")) {
            if let Err(e) = NamespaceAuthorizationRuleId::parse(&rule) {
                diagnostics.push(
                    Diagnostic::error("Invalid alias_authorization_rule_id", e.to_string())
                        .with_attribute(attr("alias_authorization_rule_id")),
                );
            }
        }

        if let (Some(primary), Some(partner)) = (
            config.get_optional_string(&attr("primary_namespace_id")),
            config.get_optional_string(&attr("partner_namespace_id")),
        ) {
            if primary.eq_ignore_ascii_case(&partner) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid partner_namespace_id",
                        "a namespace cannot be paired with itself",
                    )
                    .with_attribute(attr("partner_namespace_id")),
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

        let id = match alias_id(&request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };
        let partner = match required_string(&request.config, "partner_namespace_id") {
            Ok(partner) => partner,
            Err(diag) => return create_failed(diag),
        };

        let _lock = provider_data
            .locks
            .by_name(&id.namespace_name, NAMESPACE_TYPE_NAME)
            .await;

        let api = client.servicebus();
        if let Err(diag) = ensure_absent(api.get_disaster_recovery_config(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Pairing Service Bus Namespace {} with {}", id.namespace_id(), partner);
        if let Err(e) = pair(client, &ctx, &id, &partner).await {
            return create_failed(api_diagnostic(
                format!("Failed to create disaster recovery config {:?}", id.name),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic(
                "Failed to read created disaster recovery config",
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

        let id = match state_id(&request.current_state, NamespaceDisasterRecoveryConfigId::parse) {
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

        let id = match state_id(&request.prior_state, NamespaceDisasterRecoveryConfigId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };
        let partner = match required_string(&request.config, "partner_namespace_id") {
            Ok(partner) => partner,
            Err(diag) => return update_failed(request.prior_state, diag),
        };
        let prior_partner = request
            .prior_state
            .get_optional_string(&attr("partner_namespace_id"));

        let _lock = provider_data
            .locks
            .by_name(&id.namespace_name, NAMESPACE_TYPE_NAME)
            .await;

        let partner_changed = !prior_partner.is_some_and(|p| p.eq_ignore_ascii_case(&partner));
        if partner_changed {
            info!("Re-pairing {} with {}", id, partner);
            let result = async {
                client.servicebus().break_pairing(&ctx, &id).await?;
                wait_until_settled(client, &ctx, &id).await?;
                pair(client, &ctx, &id, &partner).await
            }
            .await;
            if let Err(e) = result {
                return update_failed(
                    request.prior_state,
                    api_diagnostic(
                        format!("Failed to re-pair disaster recovery config {:?}", id.name),
                        &e,
                    ),
                );
            }
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic(
                "Failed to read updated disaster recovery config",
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

        let id = match state_id(&request.prior_state, NamespaceDisasterRecoveryConfigId::parse) {
            Ok(id) => id,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let _lock = provider_data
            .locks
            .by_name(&id.namespace_name, NAMESPACE_TYPE_NAME)
            .await;

        info!("Deleting disaster recovery config {}", id);
        if let Err(e) = unpair_and_delete(&provider_data.client, &ctx, &id).await {
            diagnostics.push(api_diagnostic(
                format!("Failed to delete disaster recovery config {:?}", id.name),
                &e,
            ));
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }

    fn as_modify_plan(&self) -> Option<&dyn ResourceWithModifyPlan> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithModifyPlan for ServiceBusNamespaceDisasterRecoveryConfigResource {
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut planned_state = request.proposed_new_state;
        if !request.prior_state.is_null() && !planned_state.is_null() {
            plan_alias_secrets(&request.prior_state, &mut planned_state);
        }

        ModifyPlanResponse {
            planned_state,
            requires_replace: vec![],
            planned_private: request.prior_private,
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ServiceBusNamespaceDisasterRecoveryConfigResource {
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
impl ResourceWithImportState for ServiceBusNamespaceDisasterRecoveryConfigResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, NamespaceDisasterRecoveryConfigId::parse)
    }
}

fn alias_secret(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .computed()
        .sensitive()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

/// Another authorization rule exposes other keys through the alias
fn plan_alias_secrets(prior: &DynamicValue, planned: &mut DynamicValue) {
    let rule = attr("alias_authorization_rule_id");
    let rule_changed = planned.get(&rule).is_unknown()
        || match (
            prior.get_optional_string(&rule),
            planned.get_optional_string(&rule),
        ) {
            (Some(prior), Some(planned)) => !prior.eq_ignore_ascii_case(&planned),
            (prior, planned) => prior.is_some() != planned.is_some(),
        };
    if !rule_changed {
        return;
    }

    debug!("Alias authorization rule changed, alias keys will be re-read");
    for name in ALIAS_SECRETS {
        let _ = planned.mark_unknown(&attr(name));
    }
}

fn alias_id(config: &DynamicValue) -> Result<NamespaceDisasterRecoveryConfigId, Diagnostic> {
    let primary = config_id(config, "primary_namespace_id", NamespaceId::parse)?;
    let name = required_string(config, "name")?;
    Ok(NamespaceDisasterRecoveryConfigId::new(
        &primary.subscription_id,
        &primary.resource_group,
        &primary.name,
        &name,
    ))
}

async fn pair(
    client: &Client,
    ctx: &Context,
    id: &NamespaceDisasterRecoveryConfigId,
    partner: &str,
) -> Result<(), ApiError> {
    let config = DisasterRecoveryConfig {
        properties: DisasterRecoveryConfigProperties {
            partner_namespace: Some(partner.to_string()),
            ..Default::default()
        },
    };
    client
        .servicebus()
        .create_or_update_disaster_recovery_config(ctx, id, &config)
        .await?;
    wait_until_settled(client, ctx, id).await
}

/// Pairing changes are accepted immediately and finish in the background
async fn wait_until_settled(
    client: &Client,
    ctx: &Context,
    id: &NamespaceDisasterRecoveryConfigId,
) -> Result<(), ApiError> {
    client
        .poll_until(
            ctx,
            &format!("disaster recovery config {} to settle", id),
            move || async move {
                let config = client.servicebus().get_disaster_recovery_config(id).await?;
                let state = config.properties.provisioning_state.unwrap_or_default();
                debug!("Disaster recovery config {} is {:?}", id, state);
                match state.as_str() {
                    "Succeeded" => Ok(true),
                    "Failed" => Err(ApiError::OperationFailed {
                        status: state.clone(),
                        message: format!("pairing of {} failed", id),
                    }),
                    _ => Ok(false),
                }
            },
        )
        .await
}

async fn unpair_and_delete(
    client: &Client,
    ctx: &Context,
    id: &NamespaceDisasterRecoveryConfigId,
) -> Result<(), ApiError> {
    let api = client.servicebus();
    match api.break_pairing(ctx, id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e),
    }
    wait_until_settled(client, ctx, id).await?;

    api.delete_disaster_recovery_config(ctx, id).await?;

    // The alias lingers on the service after the DELETE is accepted
    client
        .poll_until(
            ctx,
            &format!("disaster recovery config {} to be removed", id),
            move || async move {
                match client.servicebus().get_disaster_recovery_config(id).await {
                    Ok(_) => Ok(false),
                    Err(e) if e.is_not_found() => Ok(true),
                    Err(e) => Err(e),
                }
            },
        )
        .await
}

async fn refresh(
    client: &Client,
    id: &NamespaceDisasterRecoveryConfigId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let api = client.servicebus();
    let config = api.get_disaster_recovery_config(id).await?;

    let rule_name = state
        .get_optional_string(&attr("alias_authorization_rule_id"))
        .and_then(|rule| NamespaceAuthorizationRuleId::parse(&rule).ok())
        .map(|rule| rule.name)
        .unwrap_or_else(|| id.namespace_id().default_authorization_rule().name);

    let keys = match api.disaster_recovery_list_keys(id, &rule_name).await {
        Ok(keys) => Some(keys),
        Err(e) => {
            warn!("Unable to list alias keys of {}: {}", id, e);
            None
        }
    };

    let partner = id_for_state(
        state.get_optional_string(&attr("partner_namespace_id")),
        config
            .properties
            .partner_namespace
            .filter(|p| !p.is_empty()),
    );

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("name", id.name.clone())
        .always("primary_namespace_id", id.namespace_id().id())
        .string("partner_namespace_id", partner.as_deref())
        .string(
            "primary_connection_string_alias",
            keys.as_ref()
                .and_then(|k| k.alias_primary_connection_string.as_deref()),
        )
        .string(
            "secondary_connection_string_alias",
            keys.as_ref()
                .and_then(|k| k.alias_secondary_connection_string.as_deref()),
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
#[path = "./resource_disaster_recovery_config_test.rs"]
mod resource_disaster_recovery_config_test;
