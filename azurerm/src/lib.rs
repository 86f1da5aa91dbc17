//! Terraform provider for Azure API Management and Service Bus

pub mod api;
pub mod data_sources;
pub mod locks;
pub mod migration;
pub mod parse;
pub mod provider_data;
pub mod resources;
pub mod validate;

pub use provider_data::AzureRmProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider, ProviderData,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tracing::info;

use api::{ClientSettings, CloudEnvironment};
use provider_data::{ApiManagementFeatures, Features};

/// Provider block attributes and the variables they fall back to
const SETTINGS: &[(&str, &str)] = &[
    ("subscription_id", "ARM_SUBSCRIPTION_ID"),
    ("tenant_id", "ARM_TENANT_ID"),
    ("client_id", "ARM_CLIENT_ID"),
    ("client_secret", "ARM_CLIENT_SECRET"),
    ("environment", "ARM_ENVIRONMENT"),
    ("resource_manager_endpoint", "ARM_RESOURCE_MANAGER_ENDPOINT"),
    ("authority_host", "ARM_AUTHORITY_HOST"),
];

#[derive(Default)]
pub struct AzureRmProvider {
    provider_data: Option<AzureRmProviderData>,
}

impl AzureRmProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

fn env_var(name: &str) -> &'static str {
    SETTINGS
        .iter()
        .find(|(attribute, _)| *attribute == name)
        .map(|(_, var)| *var)
        .unwrap_or_default()
}

/// Configured value, else the environment variable; empty strings count as unset
fn setting(config: &DynamicValue, name: &str) -> Option<String> {
    config
        .get_optional_string(&AttributePath::new(name))
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env_var(name)).ok().filter(|v| !v.is_empty()))
}

fn required_setting(
    config: &DynamicValue,
    name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    setting(config, name).unwrap_or_else(|| {
        diagnostics.push(
            Diagnostic::error(
                format!("Missing {}", name),
                format!(
                    "`{}` must be set in the provider block or through the {} environment variable",
                    name,
                    env_var(name)
                ),
            )
            .with_attribute(AttributePath::new(name)),
        );
        String::new()
    })
}

fn parse_environment(config: &DynamicValue) -> Result<CloudEnvironment, Diagnostic> {
    let name = setting(config, "environment").unwrap_or_else(|| "public".to_string());
    CloudEnvironment::from_name(&name).ok_or_else(|| {
        Diagnostic::error(
            "Invalid environment",
            format!(
                "{:?} is not a supported environment, expected one of {}",
                name,
                CloudEnvironment::NAMES.join(", ")
            ),
        )
        .with_attribute(AttributePath::new("environment"))
    })
}

fn parse_features(config: &DynamicValue) -> Features {
    let defaults = Features::default().api_management;
    let api_management = config
        .get_block(&AttributePath::new("features"))
        .and_then(|f| f.get_block(&AttributePath::new("api_management")));

    let Some(block) = api_management else {
        return Features {
            api_management: defaults,
        };
    };

    Features {
        api_management: ApiManagementFeatures {
            purge_soft_delete_on_destroy: block
                .get_optional_bool(&AttributePath::new("purge_soft_delete_on_destroy"))
                .unwrap_or(defaults.purge_soft_delete_on_destroy),
            recover_soft_deleted: block
                .get_optional_bool(&AttributePath::new("recover_soft_deleted"))
                .unwrap_or(defaults.recover_soft_deleted),
        },
    }
}

fn string_setting(name: &str, description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(&format!("{} (or {})", description, env_var(name)))
        .optional()
        .build()
}

#[async_trait]
impl Provider for AzureRmProvider {
    fn type_name(&self) -> &str {
        "azurerm"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let api_management = NestedBlockBuilder::single_list("api_management")
            .attribute(
                AttributeBuilder::new("purge_soft_delete_on_destroy", AttributeType::Bool)
                    .description("Purge soft-deleted services on destroy (default true)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("recover_soft_deleted", AttributeType::Bool)
                    .description("Recover a soft-deleted service with the same name on create (default true)")
                    .optional()
                    .build(),
            )
            .max_items(1)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages Azure API Management and Service Bus resources")
            .attribute(string_setting("subscription_id", "The subscription to manage"))
            .attribute(string_setting("tenant_id", "The Azure AD tenant of the service principal"))
            .attribute(string_setting("client_id", "The service principal's client ID"))
            .attribute(
                AttributeBuilder::new("client_secret", AttributeType::String)
                    .description("The service principal's client secret (or ARM_CLIENT_SECRET)")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(string_setting(
                "environment",
                "One of public, usgovernment or china",
            ))
            .attribute(string_setting(
                "resource_manager_endpoint",
                "Overrides the environment's Resource Manager endpoint",
            ))
            .attribute(string_setting(
                "authority_host",
                "Overrides the environment's Azure AD authority",
            ))
            .block(
                NestedBlockBuilder::single_list("features")
                    .block(api_management)
                    .max_items(1)
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let mut diagnostics = vec![];

        // Unknown values are resolved at configure time
        if !request
            .config
            .get(&AttributePath::new("environment"))
            .is_unknown()
        {
            if let Err(diag) = parse_environment(&request.config) {
                diagnostics.push(diag);
            }
        }

        ValidateProviderConfigResponse { diagnostics }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = &request.config;
        let mut diagnostics = vec![];

        let subscription_id = required_setting(config, "subscription_id", &mut diagnostics);
        let tenant_id = required_setting(config, "tenant_id", &mut diagnostics);
        let client_id = required_setting(config, "client_id", &mut diagnostics);
        let client_secret = required_setting(config, "client_secret", &mut diagnostics);
        let environment = match parse_environment(config) {
            Ok(environment) => Some(environment),
            Err(diag) => {
                diagnostics.push(diag);
                None
            }
        };

        let Some(environment) = environment.filter(|_| diagnostics.is_empty()) else {
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        };

        let settings = ClientSettings {
            subscription_id,
            tenant_id,
            client_id,
            client_secret,
            resource_manager_endpoint: setting(config, "resource_manager_endpoint")
                .unwrap_or_else(|| environment.resource_manager_endpoint().to_string()),
            authority_host: setting(config, "authority_host")
                .unwrap_or_else(|| environment.authority_host().to_string()),
        };

        let client = match api::Client::new(&settings) {
            Ok(client) => client,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };

        info!(
            "Configured provider for subscription {} at {}",
            settings.subscription_id, settings.resource_manager_endpoint
        );

        let provider_data = AzureRmProviderData::new(client, parse_features(config));
        self.provider_data = Some(provider_data.clone());

        ConfigureProviderResponse {
            diagnostics,
            provider_data: Some(Arc::new(provider_data) as ProviderData),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        use resources::*;

        HashMap::from([
            resource::<ServiceBusNamespaceResource>("azurerm_servicebus_namespace"),
            resource::<ServiceBusNamespaceAuthorizationRuleResource>(
                "azurerm_servicebus_namespace_authorization_rule",
            ),
            resource::<ServiceBusNamespaceNetworkRuleSetResource>(
                "azurerm_servicebus_namespace_network_rule_set",
            ),
            resource::<ServiceBusNamespaceDisasterRecoveryConfigResource>(
                "azurerm_servicebus_namespace_disaster_recovery_config",
            ),
            resource::<ServiceBusQueueResource>("azurerm_servicebus_queue"),
            resource::<ServiceBusQueueAuthorizationRuleResource>(
                "azurerm_servicebus_queue_authorization_rule",
            ),
            resource::<ServiceBusTopicResource>("azurerm_servicebus_topic"),
            resource::<ServiceBusTopicAuthorizationRuleResource>(
                "azurerm_servicebus_topic_authorization_rule",
            ),
            resource::<ServiceBusSubscriptionResource>("azurerm_servicebus_subscription"),
            resource::<ServiceBusSubscriptionRuleResource>("azurerm_servicebus_subscription_rule"),
            resource::<ApiManagementResource>("azurerm_api_management"),
            resource::<ApiManagementApiResource>("azurerm_api_management_api"),
            resource::<ApiManagementApiVersionSetResource>(
                "azurerm_api_management_api_version_set",
            ),
            resource::<ApiManagementNamedValueResource>("azurerm_api_management_named_value"),
            resource::<ApiManagementBackendResource>("azurerm_api_management_backend"),
            resource::<ApiManagementProductResource>("azurerm_api_management_product"),
        ])
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        use data_sources::*;

        HashMap::from([
            data_source::<ServiceBusNamespaceDataSource>("azurerm_servicebus_namespace"),
            data_source::<ServiceBusNamespaceAuthorizationRuleDataSource>(
                "azurerm_servicebus_namespace_authorization_rule",
            ),
            data_source::<ApiManagementDataSource>("azurerm_api_management"),
        ])
    }
}

fn resource<R>(type_name: &str) -> (String, ResourceFactory)
where
    R: ResourceWithConfigure + Default + 'static,
{
    (
        type_name.to_string(),
        Box::new(|| Box::new(R::default()) as Box<dyn ResourceWithConfigure>),
    )
}

fn data_source<D>(type_name: &str) -> (String, DataSourceFactory)
where
    D: DataSourceWithConfigure + Default + 'static,
{
    (
        type_name.to_string(),
        Box::new(|| Box::new(D::default()) as Box<dyn DataSourceWithConfigure>),
    )
}
