//! Service Bus namespace network rule set resource
//!
//! Every Premium namespace owns exactly one rule set named `default`. Creating
//! the resource takes over that rule set and deleting it puts the permissive
//! defaults back.

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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;
use tracing::info;

use crate::api::servicebus::{
    IpRule, NetworkRuleSet, NetworkRuleSetProperties, SubResource, VirtualNetworkRule,
};
use crate::api::{ApiError, Client};
use crate::migration::{self, Upgrader};
use crate::parse::{NamespaceId, NamespaceNetworkRuleSetId, ResourceId, SubnetId};
use crate::resources::common::{
    already_exists, api_diagnostic, attr, block_fields, config_id, create_failed, enabled_flag,
    flag_enabled, import_by_id, not_configured, read_failed, read_response, state_id,
    store_provider_data, update_failed, StateWriter, WriteMode,
};
use crate::resources::servicebus::entity::namespace_is_premium;
use crate::AzureRmProviderData;

const TYPE_NAME: &str = "azurerm_servicebus_namespace_network_rule_set";

const UPGRADERS: &[Upgrader] = &[migration::namespace_network_rule_set_v0_to_v1];

const ALLOW: &str = "Allow";
const DENY: &str = "Deny";

#[derive(Default)]
pub struct ServiceBusNamespaceNetworkRuleSetResource {
    provider_data: Option<AzureRmProviderData>,
}

impl ServiceBusNamespaceNetworkRuleSetResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for ServiceBusNamespaceNetworkRuleSetResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Manages the network rule set of a Premium Service Bus namespace")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("namespace_id", AttributeType::String)
                    .description("The ARM ID of the namespace")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("default_action", AttributeType::String)
                    .description("Action for traffic no rule matches: Allow or Deny")
                    .optional()
                    .default(StaticDefault::string(ALLOW))
                    .validator(StringOneOfValidator::create(&[ALLOW, DENY]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_network_access_enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("trusted_services_allowed", AttributeType::Bool)
                    .description("Whether trusted Microsoft services bypass the rules")
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ip_rules", AttributeType::set_of(AttributeType::String))
                    .description("IP addresses or CIDR ranges allowed to connect")
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("network_rules", NestingMode::Set)
                    .description("Subnets allowed to connect")
                    .attribute(
                        AttributeBuilder::new("subnet_id", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new(
                            "ignore_missing_vnet_service_endpoint",
                            AttributeType::Bool,
                        )
                        .optional()
                        .default(StaticDefault::bool(false))
                        .build(),
                    )
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

        if let Some(namespace) = request.config.get_optional_string(&attr("namespace_id")) {
            if let Err(e) = NamespaceId::parse(&namespace) {
                diagnostics.push(
                    Diagnostic::error("Invalid namespace_id", e.to_string())
                        .with_attribute(attr("namespace_id")),
                );
            }
        }

        for rule in request.config.get_blocks(&attr("network_rules")) {
            if let Some(subnet) = rule.get_optional_string(&attr("subnet_id")) {
                if let Err(e) = SubnetId::parse(&subnet) {
                    diagnostics.push(
                        Diagnostic::error("Invalid subnet_id", e.to_string())
                            .with_attribute(attr("network_rules")),
                    );
                }
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let namespace = match config_id(&request.config, "namespace_id", NamespaceId::parse) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };
        let id = NamespaceNetworkRuleSetId::new(
            &namespace.subscription_id,
            &namespace.resource_group,
            &namespace.name,
        );

        if let Err(diag) = ensure_premium(client, &namespace).await {
            return create_failed(diag);
        }

        match client.servicebus().get_network_rule_set(&id).await {
            Ok(existing) if !is_default(&existing) => {
                return create_failed(already_exists(&id.id()));
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return create_failed(api_diagnostic(
                    format!("Failed to check for existing network rule set of {}", namespace),
                    &e,
                ))
            }
        }

        info!("Creating Service Bus Namespace Network Rule Set {}", id);
        if let Err(e) = client
            .servicebus()
            .create_or_update_network_rule_set(&ctx, &id, &expand_rule_set(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create network rule set of {}", namespace),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created network rule set", &e));
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

        let id = match state_id(&request.current_state, NamespaceNetworkRuleSetId::parse) {
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

        let id = match state_id(&request.prior_state, NamespaceNetworkRuleSetId::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        if let Err(diag) = ensure_premium(client, &id.namespace_id()).await {
            return update_failed(request.prior_state, diag);
        }

        info!("Updating Service Bus Namespace Network Rule Set {}", id);
        if let Err(e) = client
            .servicebus()
            .create_or_update_network_rule_set(&ctx, &id, &expand_rule_set(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(
                    format!("Failed to update network rule set of {}", id.namespace_id()),
                    &e,
                ),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated network rule set", &e));
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

        match state_id(&request.prior_state, NamespaceNetworkRuleSetId::parse) {
            Ok(id) => {
                info!("Resetting Service Bus Namespace Network Rule Set {}", id);
                match provider_data
                    .client
                    .servicebus()
                    .create_or_update_network_rule_set(&ctx, &id, &default_rule_set())
                    .await
                {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => diagnostics.push(api_diagnostic(
                        format!("Failed to reset network rule set of {}", id.namespace_id()),
                        &e,
                    )),
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
impl ResourceWithConfigure for ServiceBusNamespaceNetworkRuleSetResource {
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
impl ResourceWithImportState for ServiceBusNamespaceNetworkRuleSetResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, NamespaceNetworkRuleSetId::parse)
    }
}

#[async_trait]
impl ResourceWithUpgradeState for ServiceBusNamespaceNetworkRuleSetResource {
    async fn upgrade_state(
        &self,
        _ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        migration::upgrade_resource_state(request, UPGRADERS)
    }
}

async fn ensure_premium(client: &Client, namespace: &NamespaceId) -> Result<(), Diagnostic> {
    match namespace_is_premium(client, namespace).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Diagnostic::error(
            "Network rule sets need a Premium namespace",
            format!(
                "Service Bus Namespace {:?} must use the Premium SKU to manage a network rule set",
                namespace.name
            ),
        )
        .with_attribute(attr("namespace_id"))),
        Err(e) => Err(api_diagnostic(
            format!("Failed to read Service Bus Namespace {:?}", namespace.name),
            &e,
        )),
    }
}

/// The rule set a namespace starts with
fn default_rule_set() -> NetworkRuleSet {
    NetworkRuleSet {
        properties: NetworkRuleSetProperties {
            default_action: Some(ALLOW.to_string()),
            public_network_access: Some(enabled_flag(true)),
            trusted_service_access_enabled: Some(false),
            ip_rules: vec![],
            virtual_network_rules: vec![],
        },
    }
}

fn is_default(rule_set: &NetworkRuleSet) -> bool {
    let props = &rule_set.properties;
    props.default_action.as_deref().unwrap_or(ALLOW) == ALLOW
        && props.ip_rules.is_empty()
        && props.virtual_network_rules.is_empty()
}

fn expand_rule_set(config: &DynamicValue) -> NetworkRuleSet {
    let ip_rules = config
        .get_string_list(&attr("ip_rules"))
        .into_iter()
        .map(|ip_mask| IpRule {
            ip_mask,
            action: Some(ALLOW.to_string()),
        })
        .collect();

    let virtual_network_rules = config
        .get_blocks(&attr("network_rules"))
        .into_iter()
        .filter_map(|rule| {
            let subnet = rule.get_optional_string(&attr("subnet_id"))?;
            Some(VirtualNetworkRule {
                subnet: SubResource { id: subnet },
                ignore_missing_vnet_service_endpoint: rule
                    .get_optional_bool(&attr("ignore_missing_vnet_service_endpoint"))
                    .unwrap_or(false),
            })
        })
        .collect();

    NetworkRuleSet {
        properties: NetworkRuleSetProperties {
            default_action: config.get_optional_string(&attr("default_action")),
            public_network_access: config
                .get_optional_bool(&attr("public_network_access_enabled"))
                .map(enabled_flag),
            trusted_service_access_enabled: config
                .get_optional_bool(&attr("trusted_services_allowed")),
            ip_rules,
            virtual_network_rules,
        },
    }
}

/// ARM may report subnet IDs with different casing than configured
fn subnet_id_for_state(known: &[String], remote: &str) -> String {
    known
        .iter()
        .find(|id| id.eq_ignore_ascii_case(remote))
        .cloned()
        .unwrap_or_else(|| remote.to_string())
}

fn flatten_network_rules(
    rules: &[VirtualNetworkRule],
    known_subnets: &[String],
) -> Vec<HashMap<String, Dynamic>> {
    rules
        .iter()
        .map(|rule| {
            block_fields([
                (
                    "subnet_id",
                    subnet_id_for_state(known_subnets, &rule.subnet.id).into(),
                ),
                (
                    "ignore_missing_vnet_service_endpoint",
                    rule.ignore_missing_vnet_service_endpoint.into(),
                ),
            ])
        })
        .collect()
}

async fn refresh(
    client: &Client,
    id: &NamespaceNetworkRuleSetId,
    state: &mut DynamicValue,
    mode: WriteMode,
) -> Result<(), ApiError> {
    let rule_set = client.servicebus().get_network_rule_set(id).await?;
    let props = &rule_set.properties;

    let known_subnets: Vec<String> = state
        .get_blocks(&attr("network_rules"))
        .iter()
        .filter_map(|rule| rule.get_optional_string(&attr("subnet_id")))
        .collect();
    let ip_rules: Vec<String> = props.ip_rules.iter().map(|r| r.ip_mask.clone()).collect();

    StateWriter::new(state, mode)
        .always("id", id.id())
        .always("namespace_id", id.namespace_id().id())
        .string(
            "default_action",
            Some(props.default_action.as_deref().unwrap_or(ALLOW)),
        )
        .bool(
            "public_network_access_enabled",
            Some(flag_enabled(props.public_network_access.as_deref()).unwrap_or(true)),
        )
        .bool(
            "trusted_services_allowed",
            Some(props.trusted_service_access_enabled.unwrap_or(false)),
        )
        .strings("ip_rules", &ip_rules)
        .blocks(
            "network_rules",
            flatten_network_rules(&props.virtual_network_rules, &known_subnets),
        );

    Ok(())
}

#[cfg(test)]
#[path = "./resource_network_rule_set_test.rs"]
mod resource_network_rule_set_test;
